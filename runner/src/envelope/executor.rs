use super::{CallContext, CallableRegistry, EnvelopeError, TaskEnvelope};
use crate::distributed::{process_registry, Communicator, CommunicatorRegistry};
use serde_json::Value;
use tracing::{debug, instrument};

fn execute(
    callables: &CallableRegistry,
    envelope: TaskEnvelope,
    context: &CallContext<'_>,
) -> Result<Value, EnvelopeError> {
    let frame = envelope.callable_frame()?;
    let arguments = envelope.arguments()?;

    debug!(
        positional = arguments.positional().len(),
        keyword = arguments.keyword().len(),
        "Decoded envelope"
    );

    callables.invoke(envelope.header(), frame, context, &arguments)
}

/// Decode `envelope` and call the callable it carries, without any MPI context
#[instrument(level = "debug", skip_all, fields(callable = %envelope.callable_name()))]
pub fn decode_and_execute(
    callables: &CallableRegistry,
    envelope: TaskEnvelope,
) -> Result<Value, EnvelopeError> {
    execute(callables, envelope, &CallContext::detached())
}

fn execute_on(
    callables: &CallableRegistry,
    communicator: &dyn Communicator,
    envelope: TaskEnvelope,
) -> Result<Value, EnvelopeError> {
    debug!(
        rank = ?communicator.rank(),
        size = ?communicator.size(),
        root = communicator.is_root(),
        "Executing on task communicator"
    );

    execute(
        callables,
        envelope,
        &CallContext::with_communicator(communicator),
    )
}

/// Decode `envelope` and call it on the communicator registered in `communicators`
///
/// Every rank of the job is expected to receive the same envelope, broadcasting it is
/// up to the caller. Only the result on the root rank is meaningful.
#[instrument(level = "debug", skip_all, fields(callable = %envelope.callable_name()))]
pub fn mpi_decode_and_execute(
    callables: &CallableRegistry,
    communicators: &CommunicatorRegistry,
    envelope: TaskEnvelope,
) -> Result<Value, EnvelopeError> {
    let communicator = communicators.get_communicator()?;

    execute_on(callables, communicator, envelope)
}

/// Like [`mpi_decode_and_execute`], using the process scoped registry
///
/// The registry is only locked to fetch the communicator, the callable itself may use
/// [`process_registry`] again.
#[instrument(level = "debug", skip_all, fields(callable = %envelope.callable_name()))]
pub fn mpi_decode_and_execute_in_process(
    callables: &CallableRegistry,
    envelope: TaskEnvelope,
) -> Result<Value, EnvelopeError> {
    let communicator = process_registry().shared_communicator()?;

    execute_on(callables, communicator.as_ref(), envelope)
}
