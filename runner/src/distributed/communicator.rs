use std::{
    fmt::Debug,
    process::exit,
    sync::atomic::{AtomicU32, Ordering},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommunicatorError {
    #[error("No MPI communicator is registered for the current task context")]
    MissingContext,
    #[error("Invalid communicator: {0}")]
    Invalid(String),
    #[error("MPI call failed: {0}")]
    Call(String),
}

/// Minimal capability set of an MPI communicator
///
/// Queries return errors instead of panicking so that handles which are null or were
/// already freed can be detected before anything collective touches them. Handles are
/// shared between threads, implementations have to be safe to call concurrently.
pub trait Communicator: Debug + Send + Sync {
    fn rank(&self) -> Result<i32, CommunicatorError>;

    fn size(&self) -> Result<i32, CommunicatorError>;

    /// collective, every rank of the communicator has to call it
    fn barrier(&self) -> Result<(), CommunicatorError>;

    /// derive a private communicator over the same group of processes
    fn duplicate(&self) -> Result<Box<dyn Communicator>, CommunicatorError>;

    /// terminate every process of the job with `code`
    fn abort(&self, code: i32) -> !;

    fn is_root(&self) -> bool {
        matches!(self.rank(), Ok(0))
    }
}

static NEXT_CONTEXT: AtomicU32 = AtomicU32::new(1);

/// Single process communicator for runs without an MPI launcher, e.g. tests
///
/// Behaves like a world of size one. Every duplicate receives a fresh context id.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalCommunicator {
    context: u32,
}

impl LocalCommunicator {
    pub fn new() -> Self {
        Self { context: 0 }
    }
}

impl Default for LocalCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> Result<i32, CommunicatorError> {
        Ok(0)
    }

    fn size(&self) -> Result<i32, CommunicatorError> {
        Ok(1)
    }

    fn barrier(&self) -> Result<(), CommunicatorError> {
        Ok(())
    }

    fn duplicate(&self) -> Result<Box<dyn Communicator>, CommunicatorError> {
        Ok(Box::new(Self {
            context: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
        }))
    }

    fn abort(&self, code: i32) -> ! {
        error!(code = code, "Aborting single process job");

        exit(code)
    }
}
