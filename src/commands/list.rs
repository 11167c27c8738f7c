use anyhow::Result;

use crate::options::RunOptions;
use crate::runtime::Runtime;
use crate::stack::discovery::find_stack;

/// Print the path of every module discovered under the working directory.
#[tracing::instrument(skip(runtime, options))]
pub fn list<R: Runtime>(runtime: &R, options: &RunOptions) -> Result<()> {
    let stack = find_stack(runtime, &options.working_dir)?;

    if stack.is_empty() {
        println!("No modules found under {}", options.working_dir.display());
        return Ok(());
    }
    for module in &stack.modules {
        println!("{}", module.path.display());
    }
    Ok(())
}
