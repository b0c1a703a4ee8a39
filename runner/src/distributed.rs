pub mod abort;
pub mod communicator;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod registry;

#[cfg(test)]
mod registry_test;

/*
 * Lifecycle of a communicator inside a worker process:
 * 1. The launcher starts the ranks, each rank initializes MPI on its own
 * 2. The rank registers a communicator derived from its parent (usually the world)
 *    -> the parent itself stays free for collectives the caller still runs on it
 * 3. Envelopes are executed against the derived communicator, every rank runs the same one
 * 4. Any inconsistency ends in a `Fatal`, the supervisor decides between a local exit
 *    and a job wide abort
 */

pub use abort::{flush_and_abort, AbortScope, Fatal, DEFAULT_ERROR_CODE};
pub use communicator::{Communicator, CommunicatorError, LocalCommunicator};
pub use registry::{process_registry, verify_communicator, CommunicatorRegistry};
