use super::{
    decode_and_execute, encode, encode_with, mpi_decode_and_execute, Arguments, CallContext,
    CallError, Callable, CallableRegistry, EnvelopeError, Keyword, ObjectCodec, TaskEnvelope,
};
use crate::distributed::{CommunicatorError, CommunicatorRegistry, LocalCommunicator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// joins a positional string and an optional keyword string
#[derive(Serialize, Deserialize)]
struct StringTask;

impl Callable for StringTask {
    const NAME: &'static str = "tests.string_task";
    type Output = String;

    fn call(&self, _context: &CallContext<'_>, arguments: &Arguments) -> Result<String, CallError> {
        let string: String = arguments.arg(0)?;
        let kwarg_string: Option<String> = arguments.kwarg("kwarg_string")?;

        Ok([Some(string), kwarg_string]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// reports the size of the communicator it runs on
#[derive(Serialize, Deserialize)]
struct SizeTask;

impl Callable for SizeTask {
    const NAME: &'static str = "tests.size_task";
    type Output = String;

    fn call(&self, context: &CallContext<'_>, arguments: &Arguments) -> Result<String, CallError> {
        let size = context.communicator()?.size()?;
        let task_name: String = arguments.arg(0)?;

        Ok(format!("Running {size} tasks of type {task_name}."))
    }
}

/// carries state across the process boundary
#[derive(Serialize, Deserialize)]
struct Scale {
    factor: i64,
}

impl Callable for Scale {
    const NAME: &'static str = "tests.scale";
    type Output = Vec<i64>;

    fn call(&self, _context: &CallContext<'_>, arguments: &Arguments) -> Result<Vec<i64>, CallError> {
        let offset: i64 = arguments.kwarg("offset")?.unwrap_or(0);

        (0..arguments.positional().len())
            .map(|index| {
                arguments
                    .arg::<i64>(index)
                    .map(|value| value * self.factor + offset)
            })
            .collect()
    }
}

fn callables() -> CallableRegistry {
    let mut registry = CallableRegistry::new();
    registry
        .register::<StringTask>()
        .unwrap()
        .register::<SizeTask>()
        .unwrap()
        .register::<Scale>()
        .unwrap();
    registry
}

fn kwargs(pairs: &[(&str, Value)]) -> Keyword {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn callable_only_has_header_and_frames() {
    let envelope = encode(&StringTask, &[], &Keyword::new()).unwrap();

    assert_eq!(envelope.keys(), vec!["header", "frames"]);
}

#[test]
fn positional_arguments_add_args_group() {
    let envelope = encode(&StringTask, &[json!("chicken")], &Keyword::new()).unwrap();

    assert_eq!(
        envelope.keys(),
        vec!["header", "frames", "args_header", "args_frames"]
    );
}

#[test]
fn keyword_arguments_add_kwargs_group() {
    let envelope = encode(&StringTask, &[], &kwargs(&[("kwarg_string", json!("dog"))])).unwrap();

    assert_eq!(
        envelope.keys(),
        vec!["header", "frames", "kwargs_header", "kwargs_frames"]
    );
}

#[test]
fn both_argument_kinds_give_all_six_keys() {
    let envelope = encode(
        &StringTask,
        &[json!("chicken")],
        &kwargs(&[("kwarg_string", json!("dog"))]),
    )
    .unwrap();

    assert_eq!(
        envelope.keys(),
        vec![
            "header",
            "frames",
            "args_header",
            "args_frames",
            "kwargs_header",
            "kwargs_frames"
        ]
    );
}

#[test]
fn wire_shape_skips_absent_groups() {
    let envelope = encode(&StringTask, &[json!("chicken")], &Keyword::new()).unwrap();
    let wire = serde_json::to_value(&envelope).unwrap();

    let mut keys = wire.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
    keys.sort();

    assert_eq!(keys, vec!["args_frames", "args_header", "frames", "header"]);
}

#[test]
fn decode_and_execute_calls_the_callable() {
    let envelope = encode(
        &StringTask,
        &[json!("chicken")],
        &kwargs(&[("kwarg_string", json!("dog"))]),
    )
    .unwrap();

    assert_eq!(
        decode_and_execute(&callables(), envelope).unwrap(),
        json!("chicken dog")
    );
}

#[test]
fn round_trip_matches_direct_call() {
    let scale = Scale { factor: 3 };
    let positional = [json!(1), json!(2), json!(5)];
    let keyword = kwargs(&[("offset", json!(-1))]);

    let direct = scale
        .call(
            &CallContext::detached(),
            &Arguments::new(positional.to_vec(), keyword.clone()),
        )
        .unwrap();

    for codec in [ObjectCodec::Json, ObjectCodec::Yaml] {
        let envelope = encode_with(codec, &scale, &positional, &keyword).unwrap();

        // ship the envelope as a whole, like a scheduler would
        let shipped: TaskEnvelope =
            serde_yaml::from_str(&serde_yaml::to_string(&envelope).unwrap()).unwrap();

        assert_eq!(
            decode_and_execute(&callables(), shipped).unwrap(),
            serde_json::to_value(&direct).unwrap()
        );
    }
}

#[test]
fn unknown_callable_is_rejected() {
    let envelope = encode(&StringTask, &[json!("chicken")], &Keyword::new()).unwrap();

    assert!(matches!(
        decode_and_execute(&CallableRegistry::new(), envelope),
        Err(EnvelopeError::UnknownCallable(name)) if name == StringTask::NAME
    ));
}

#[test]
fn registry_lists_callables_by_name() {
    let registry = callables();

    assert!(registry.contains(StringTask::NAME));
    assert!(!registry.contains("tests.unregistered"));
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec![Scale::NAME, SizeTask::NAME, StringTask::NAME]
    );
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = callables();

    assert!(matches!(
        registry.register::<StringTask>(),
        Err(EnvelopeError::AlreadyRegistered(name)) if name == StringTask::NAME
    ));
}

#[test]
fn missing_argument_surfaces_as_call_error() {
    let envelope = encode(&StringTask, &[], &Keyword::new()).unwrap();

    assert!(matches!(
        decode_and_execute(&callables(), envelope),
        Err(EnvelopeError::Call(CallError::MissingPositional(0)))
    ));
}

#[test]
fn half_present_group_is_malformed() {
    let envelope = encode(&StringTask, &[json!("chicken")], &Keyword::new()).unwrap();
    let mut wire = serde_json::to_value(&envelope).unwrap();
    wire.as_object_mut().unwrap().remove("args_frames");

    let broken: TaskEnvelope = serde_json::from_value(wire).unwrap();

    assert!(matches!(
        decode_and_execute(&callables(), broken),
        Err(EnvelopeError::Malformed { group: "args", .. })
    ));
}

#[test]
fn unexpected_wire_keys_are_rejected() {
    let envelope = encode(&StringTask, &[], &Keyword::new()).unwrap();
    let mut wire = serde_json::to_value(&envelope).unwrap();
    wire.as_object_mut()
        .unwrap()
        .insert("payload".to_string(), json!([]));

    assert!(serde_json::from_value::<TaskEnvelope>(wire).is_err());
}

#[test]
fn mpi_execution_without_communicator_fails() {
    let envelope = encode(&SizeTask, &[json!("trivial")], &Keyword::new()).unwrap();

    assert!(matches!(
        mpi_decode_and_execute(&callables(), &CommunicatorRegistry::new(), envelope),
        Err(EnvelopeError::Context(CommunicatorError::MissingContext))
    ));
}

#[test]
fn mpi_execution_sees_the_registered_communicator() {
    let communicators = CommunicatorRegistry::open(&LocalCommunicator::new()).unwrap();
    let envelope = encode(&SizeTask, &[json!("trivial")], &Keyword::new()).unwrap();

    assert_eq!(
        mpi_decode_and_execute(&callables(), &communicators, envelope).unwrap(),
        json!("Running 1 tasks of type trivial.")
    );
}

#[test]
fn detached_execution_has_no_communicator() {
    let envelope = encode(&SizeTask, &[json!("trivial")], &Keyword::new()).unwrap();

    assert!(matches!(
        decode_and_execute(&callables(), envelope),
        Err(EnvelopeError::Call(CallError::Communicator(
            CommunicatorError::MissingContext
        )))
    ));
}
