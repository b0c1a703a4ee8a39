use super::{
    flush_and_abort, verify_communicator, AbortScope, Communicator, CommunicatorError,
    CommunicatorRegistry, LocalCommunicator,
};

/// stands in for a null or already freed communicator handle
#[derive(Debug)]
struct NullCommunicator;

impl Communicator for NullCommunicator {
    fn rank(&self) -> Result<i32, CommunicatorError> {
        Err(CommunicatorError::Invalid("null communicator".to_string()))
    }

    fn size(&self) -> Result<i32, CommunicatorError> {
        Err(CommunicatorError::Invalid("null communicator".to_string()))
    }

    fn barrier(&self) -> Result<(), CommunicatorError> {
        Err(CommunicatorError::Invalid("null communicator".to_string()))
    }

    fn duplicate(&self) -> Result<Box<dyn Communicator>, CommunicatorError> {
        Err(CommunicatorError::Invalid("null communicator".to_string()))
    }

    fn abort(&self, code: i32) -> ! {
        panic!("null communicator can't abort with {code}")
    }
}

/// reports a rank outside of its own size
#[derive(Debug)]
struct InconsistentCommunicator;

impl Communicator for InconsistentCommunicator {
    fn rank(&self) -> Result<i32, CommunicatorError> {
        Ok(4)
    }

    fn size(&self) -> Result<i32, CommunicatorError> {
        Ok(2)
    }

    fn barrier(&self) -> Result<(), CommunicatorError> {
        Ok(())
    }

    fn duplicate(&self) -> Result<Box<dyn Communicator>, CommunicatorError> {
        Ok(Box::new(InconsistentCommunicator))
    }

    fn abort(&self, code: i32) -> ! {
        panic!("inconsistent communicator can't abort with {code}")
    }
}

#[test]
fn local_communicator_is_valid() {
    assert!(verify_communicator(&LocalCommunicator::new(), false).is_ok());
}

#[test]
fn null_communicator_is_a_local_fatal() {
    let fatal = verify_communicator(&NullCommunicator, false).unwrap_err();

    assert_eq!(fatal.code(), 1);
    assert_eq!(fatal.scope(), AbortScope::Local);
}

#[test]
fn null_communicator_with_abort_is_coordinated() {
    let fatal = verify_communicator(&NullCommunicator, true).unwrap_err();

    assert_eq!(fatal.code(), 1);
    assert_eq!(fatal.scope(), AbortScope::Coordinated);
}

#[test]
fn inconsistent_rank_fails_verification() {
    let fatal = verify_communicator(&InconsistentCommunicator, false).unwrap_err();

    assert!(fatal.reason().contains("rank 4"));
}

#[test]
fn flush_and_abort_carries_code_and_scope() {
    let fatal = flush_and_abort(2, false);
    assert_eq!(fatal.code(), 2);
    assert_eq!(fatal.scope(), AbortScope::Local);

    let fatal = flush_and_abort(1, true);
    assert_eq!(fatal.code(), 1);
    assert_eq!(fatal.scope(), AbortScope::Coordinated);
}

#[test]
fn empty_registry_is_missing_context() {
    let registry = CommunicatorRegistry::new();

    assert!(!registry.is_open());
    assert_eq!(
        registry.get_communicator().unwrap_err(),
        CommunicatorError::MissingContext
    );
}

#[test]
fn registry_stores_a_derived_communicator() {
    let parent = LocalCommunicator::new();
    let registry = CommunicatorRegistry::open(&parent).unwrap();

    let active = registry.get_communicator().unwrap();
    assert_eq!(active.size().unwrap(), 1);
    assert!(active.is_root());
    // the derived communicator has its own context, the parent keeps context 0
    assert_ne!(format!("{active:?}"), format!("{parent:?}"));
}

#[test]
fn second_registration_overwrites_the_first() {
    let parent = LocalCommunicator::new();
    let mut registry = CommunicatorRegistry::open(&parent).unwrap();
    let first = format!("{:?}", registry.get_communicator().unwrap());

    registry.set_communicator(&parent).unwrap();
    let second = format!("{:?}", registry.get_communicator().unwrap());

    assert_ne!(first, second);
}

#[test]
fn invalid_parent_is_never_registered() {
    let mut registry = CommunicatorRegistry::new();
    let fatal = registry.set_communicator(&NullCommunicator).unwrap_err();

    assert_eq!(fatal.scope(), AbortScope::Coordinated);
    assert!(!registry.is_open());
}

#[test]
fn close_resets_the_registry() {
    let mut registry = CommunicatorRegistry::open(&LocalCommunicator::new()).unwrap();

    assert!(registry.close().is_some());
    assert!(registry.close().is_none());
    assert_eq!(
        registry.get_communicator().unwrap_err(),
        CommunicatorError::MissingContext
    );
}

#[test]
fn shared_communicator_outlives_close() {
    let mut registry = CommunicatorRegistry::new();
    assert_eq!(
        registry.shared_communicator().unwrap_err(),
        CommunicatorError::MissingContext
    );

    registry.set_communicator(&LocalCommunicator::new()).unwrap();
    let shared = registry.shared_communicator().unwrap();
    registry.close();

    assert!(!registry.is_open());
    assert_eq!(shared.size().unwrap(), 1);
}
