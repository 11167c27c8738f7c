//! Per-module remote-state transfer across a stack.
//!
//! Pulls and pushes are independent per module, so they run on a bounded
//! worker pool. Failures are collected across all modules rather than
//! short-circuiting at the first one, so a single run reports every module
//! that needs attention.

use anyhow::{Result, bail};
use futures_util::{StreamExt, stream};
use log::debug;
use std::future::Future;

use super::{Module, Stack};
use crate::terraform::StateBackend;

impl Stack {
    /// Pull remote state for every module into its transient statefile.
    #[tracing::instrument(skip(self, backend))]
    pub async fn pull_state<S: StateBackend>(
        &self,
        backend: &S,
        statefile_name: &str,
        jobs: usize,
    ) -> Result<()> {
        debug!("Pulling state for {} module(s)", self.len());
        run_for_modules(&self.modules, jobs, "pull", |module| {
            backend.state_pull(&module.path, statefile_name)
        })
        .await
    }

    /// Push every module's transient statefile to its remote backend.
    #[tracing::instrument(skip(self, backend))]
    pub async fn push_state<S: StateBackend>(
        &self,
        backend: &S,
        statefile_name: &str,
        jobs: usize,
    ) -> Result<()> {
        debug!("Pushing state for {} module(s)", self.len());
        run_for_modules(&self.modules, jobs, "push", |module| {
            backend.state_push(&module.path, statefile_name)
        })
        .await
    }
}

async fn run_for_modules<'a, F, Fut>(
    modules: &'a [Module],
    jobs: usize,
    action: &str,
    op: F,
) -> Result<()>
where
    F: Fn(&'a Module) -> Fut,
    Fut: Future<Output = Result<()>> + 'a,
{
    let failures: Vec<String> = stream::iter(modules)
        .map(|module| {
            let fut = op(module);
            async move { (module, fut.await) }
        })
        .buffer_unordered(jobs.max(1))
        .filter_map(|(module, result)| async move {
            result
                .err()
                .map(|err| format!("{}: {:#}", module.path.display(), err))
        })
        .collect()
        .await;

    if failures.is_empty() {
        Ok(())
    } else {
        bail!(
            "state {} failed for {} module(s):\n  {}",
            action,
            failures.len(),
            failures.join("\n  ")
        );
    }
}
