//! The relocation pipeline: move a configuration tree and its remote state
//! to a sibling destination.
//!
//! Stages run strictly in order and each failure aborts the rest, but the
//! transient statefiles staged on local disk are removed on every exit
//! path. When both a stage and the final cleanup fail, both errors are
//! reported with the stage error as the primary cause.

use log::{debug, info};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::copy::copy_tree;
use super::discovery::find_stack;
use super::{LOCK_FILENAME, TMP_STATEFILE_NAME};
use crate::cleanup::{CleanupContext, CleanupError};
use crate::options::RunOptions;
use crate::runtime::Runtime;
use crate::terraform::StateBackend;

/// Pipeline stage names, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MvStage {
    Lock,
    Discover,
    StatePull,
    Translate,
    CopyTree,
    RediscoverDestination,
    StatePush,
}

impl fmt::Display for MvStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MvStage::Lock => "relocation lock acquisition",
            MvStage::Discover => "origin stack discovery",
            MvStage::StatePull => "state pull",
            MvStage::Translate => "destination path translation",
            MvStage::CopyTree => "configuration tree copy",
            MvStage::RediscoverDestination => "destination stack discovery",
            MvStage::StatePush => "state push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MvError {
    #[error("no relocation destination was given")]
    MissingDestination,

    #[error("a relocation lock is already held for {0:?}; is another run in progress?")]
    Locked(PathBuf),

    #[error("destination {0:?} already exists; re-run with --force to relocate into it")]
    DestinationExists(PathBuf),

    #[error("{stage} failed: {cause:#}")]
    Stage { stage: MvStage, cause: anyhow::Error },

    #[error("{primary}; transient-file cleanup also failed: {cleanup}")]
    StageAndCleanup {
        primary: Box<MvError>,
        cleanup: CleanupError,
    },

    #[error("relocation succeeded but transient-file cleanup failed: {0}")]
    Cleanup(CleanupError),
}

impl MvError {
    fn stage(stage: MvStage, cause: anyhow::Error) -> Self {
        MvError::Stage { stage, cause }
    }
}

/// Relocate the stack under `options.working_dir` (and each module's remote
/// state) to the sibling directory named by `options.destination`.
///
/// The configuration tree is copied, not moved: removing the origin tree is
/// left to the caller once the new location is verified.
#[tracing::instrument(skip(runtime, backend, options))]
pub async fn mv_all<R: Runtime, S: StateBackend>(
    runtime: &R,
    backend: &S,
    options: &RunOptions,
) -> Result<(), MvError> {
    let destination = options
        .destination
        .as_deref()
        .ok_or(MvError::MissingDestination)?;

    let _lock = MvLock::acquire(runtime, &options.working_dir, destination)?;

    let mut cleanup = CleanupContext::new();
    let result = run_stages(runtime, backend, options, destination, &mut cleanup).await;
    let cleanup_result = cleanup.run(runtime);

    match (result, cleanup_result) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(cleanup)) => Err(MvError::Cleanup(cleanup)),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(cleanup)) => Err(MvError::StageAndCleanup {
            primary: Box::new(primary),
            cleanup,
        }),
    }
}

async fn run_stages<R: Runtime, S: StateBackend>(
    runtime: &R,
    backend: &S,
    options: &RunOptions,
    destination: &str,
    cleanup: &mut CleanupContext,
) -> Result<(), MvError> {
    let origin = find_stack(runtime, &options.working_dir)
        .map_err(|e| MvError::stage(MvStage::Discover, e))?;
    info!(
        "Relocating {} module(s) from {:?} to sibling {:?}",
        origin.len(),
        options.working_dir,
        destination
    );

    // Track origin statefiles before pulling: removal tolerates absent
    // files, so a partial pull failure still gets cleaned up.
    cleanup.track_stack(&origin, TMP_STATEFILE_NAME);
    origin
        .pull_state(backend, TMP_STATEFILE_NAME, options.jobs)
        .await
        .map_err(|e| MvError::stage(MvStage::StatePull, e))?;

    let target_options = options
        .for_destination(destination)
        .map_err(|e| MvError::stage(MvStage::Translate, e))?;

    if runtime.exists(&target_options.working_dir) && !options.force {
        return Err(MvError::DestinationExists(target_options.working_dir));
    }

    copy_tree(runtime, &options.working_dir, &target_options.working_dir)
        .map_err(|e| MvError::stage(MvStage::CopyTree, e))?;

    let destination_stack = find_stack(runtime, &target_options.working_dir)
        .map_err(|e| MvError::stage(MvStage::RediscoverDestination, e))?;

    // Only modules whose pulled state traveled with the tree are pushed;
    // anything else at the destination is left alone.
    let moved = destination_stack.retain_with_statefile(runtime, TMP_STATEFILE_NAME);
    debug!(
        "{} of {} destination module(s) carry pulled state",
        moved.len(),
        destination_stack.len()
    );
    cleanup.track_stack(&moved, TMP_STATEFILE_NAME);

    moved
        .push_state(backend, TMP_STATEFILE_NAME, options.jobs)
        .await
        .map_err(|e| MvError::stage(MvStage::StatePush, e))?;

    Ok(())
}

/// Advisory lease on a working directory, keyed by the lock file inside it.
/// Released on drop; a stale lock left by a crashed run must be removed by
/// hand.
struct MvLock<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> MvLock<'a, R> {
    fn acquire(runtime: &'a R, working_dir: &Path, destination: &str) -> Result<Self, MvError> {
        let path = working_dir.join(LOCK_FILENAME);
        let contents = format!("destination: {destination}\npid: {}\n", std::process::id());

        match runtime.write_new(&path, contents.as_bytes()) {
            Ok(()) => {
                debug!("Acquired relocation lock {:?}", path);
                Ok(Self { runtime, path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(MvError::Locked(path)),
            Err(err) => Err(MvError::stage(
                MvStage::Lock,
                anyhow::Error::new(err).context(format!("Failed to create lock file {:?}", path)),
            )),
        }
    }
}

impl<R: Runtime> Drop for MvLock<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.remove_file(&self.path) {
            debug!("Failed to release relocation lock {:?}: {:#}", self.path, err);
        }
    }
}
