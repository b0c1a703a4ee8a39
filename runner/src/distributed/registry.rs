use super::{AbortScope, Communicator, CommunicatorError, Fatal, DEFAULT_ERROR_CODE};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// process scoped registry for the one MPI job per process deployment
static PROCESS_REGISTRY: Lazy<Mutex<CommunicatorRegistry>> =
    Lazy::new(|| Mutex::new(CommunicatorRegistry::new()));

/// Lock the process scoped registry
///
/// The lock only guards memory, a process is expected to run a single MPI task
/// context at a time. Don't hold the guard across a call that may lock it again, take a
/// [`CommunicatorRegistry::shared_communicator`] instead.
pub fn process_registry() -> MutexGuard<'static, CommunicatorRegistry> {
    PROCESS_REGISTRY.lock()
}

/// Check that `candidate` is a usable communicator
///
/// Rank and size have to be queryable and consistent, collectives are guaranteed by the
/// `Communicator` trait. A broken communicator can't be recovered from since other
/// ranks may already block on it, so failure is always `Fatal` with exit code 1.
pub fn verify_communicator(
    candidate: &dyn Communicator,
    abort_on_failure: bool,
) -> Result<(), Fatal> {
    let scope = if abort_on_failure {
        AbortScope::Coordinated
    } else {
        AbortScope::Local
    };

    let checked = candidate.size().and_then(|size| {
        let rank = candidate.rank()?;

        if size < 1 {
            Err(CommunicatorError::Invalid(format!("size {size} is not positive")))
        } else if !(0..size).contains(&rank) {
            Err(CommunicatorError::Invalid(format!(
                "rank {rank} is outside of size {size}"
            )))
        } else {
            Ok((rank, size))
        }
    });

    match checked {
        Ok((rank, size)) => {
            debug!(rank = rank, size = size, "Verified communicator");

            Ok(())
        }
        Err(error) => {
            error!(error = ?error, candidate = ?candidate, scope = %scope, "Communicator failed verification");

            Err(Fatal::new(DEFAULT_ERROR_CODE, scope, error.to_string()))
        }
    }
}

/// Holder of the communicator the current task context runs on
///
/// The stored communicator is always derived from the parent handed to
/// [`CommunicatorRegistry::set_communicator`], never the parent itself.
#[derive(Debug, Default)]
pub struct CommunicatorRegistry {
    active: Option<Arc<dyn Communicator>>,
}

impl CommunicatorRegistry {
    /// empty registry, MPI aware execution fails until a communicator is set
    pub fn new() -> Self {
        Self { active: None }
    }

    /// registry bound to a communicator derived from `parent`
    pub fn open(parent: &dyn Communicator) -> Result<Self, Fatal> {
        let mut registry = Self::new();
        registry.set_communicator(parent)?;

        Ok(registry)
    }

    /// Verify `parent` and store a private duplicate of it, replacing any previous one
    pub fn set_communicator(&mut self, parent: &dyn Communicator) -> Result<(), Fatal> {
        verify_communicator(parent, true)?;

        let derived = parent.duplicate().map_err(|error| {
            error!(error = ?error, "Failed to derive task communicator");

            Fatal::new(
                DEFAULT_ERROR_CODE,
                AbortScope::Coordinated,
                error.to_string(),
            )
        })?;

        if let Some(previous) = self.active.replace(Arc::from(derived)) {
            warn!(previous = ?previous, "Replaced an already registered communicator");
        } else {
            info!("Registered task communicator");
        }

        Ok(())
    }

    pub fn get_communicator(&self) -> Result<&dyn Communicator, CommunicatorError> {
        self.active
            .as_deref()
            .ok_or(CommunicatorError::MissingContext)
    }

    /// handle to the registered communicator that outlives a borrow of the registry
    pub fn shared_communicator(&self) -> Result<Arc<dyn Communicator>, CommunicatorError> {
        self.active
            .clone()
            .ok_or(CommunicatorError::MissingContext)
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// release the registered communicator, returning it if there was one
    pub fn close(&mut self) -> Option<Arc<dyn Communicator>> {
        let closed = self.active.take();

        if closed.is_some() {
            debug!("Closed task communicator");
        }

        closed
    }
}
