//! Adapter from the `mpi` crate to [`Communicator`]
//!
//! Requires the `mpi` feature and a system MPI installation. MPI has to be initialized
//! by the caller with full thread support, e.g.
//! `mpi::initialize_with_threading(Threading::Multiple)`, before a communicator is wrapped.

use super::{Communicator, CommunicatorError};
use mpi::{
    environment::threading_support,
    topology::SimpleCommunicator,
    traits::{Communicator as _, CommunicatorCollectives as _},
    Threading,
};
use std::fmt;

pub struct MpiCommunicator {
    inner: SimpleCommunicator,
}

// SAFETY: an `MpiCommunicator` only exists after `new` checked that MPI runs with
// `MPI_THREAD_MULTIPLE`, which allows calls on the same handle from any thread
unsafe impl Send for MpiCommunicator {}
unsafe impl Sync for MpiCommunicator {}

impl MpiCommunicator {
    /// Wrap `inner`, fails unless MPI was initialized with `Threading::Multiple`
    pub fn new(inner: SimpleCommunicator) -> Result<Self, CommunicatorError> {
        match threading_support() {
            Threading::Multiple => Ok(Self { inner }),
            level => Err(CommunicatorError::Invalid(format!(
                "MPI threading support is {level:?}, handles can't be shared between threads"
            ))),
        }
    }

    /// wrap the world communicator of an initialized MPI environment
    pub fn world() -> Result<Self, CommunicatorError> {
        Self::new(SimpleCommunicator::world())
    }
}

impl fmt::Debug for MpiCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpiCommunicator")
            .field("rank", &self.inner.rank())
            .field("size", &self.inner.size())
            .finish()
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> Result<i32, CommunicatorError> {
        Ok(self.inner.rank())
    }

    fn size(&self) -> Result<i32, CommunicatorError> {
        Ok(self.inner.size())
    }

    fn barrier(&self) -> Result<(), CommunicatorError> {
        self.inner.barrier();

        Ok(())
    }

    fn duplicate(&self) -> Result<Box<dyn Communicator>, CommunicatorError> {
        Ok(Box::new(Self::new(self.inner.duplicate())?))
    }

    fn abort(&self, code: i32) -> ! {
        self.inner.abort(code)
    }
}
