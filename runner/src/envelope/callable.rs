use super::{EnvelopeError, Header};
use crate::distributed::{Communicator, CommunicatorError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
};
use thiserror::Error;
use tracing::debug;

/// keyword arguments, sorted by name
pub type Keyword = BTreeMap<String, Value>;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Missing positional argument {0}")]
    MissingPositional(usize),
    #[error("Argument {name} has an unexpected type")]
    InvalidArgument {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Communicator(#[from] CommunicatorError),
    #[error("{0}")]
    Failed(String),
}

/// Positional and keyword arguments as rebuilt from an envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: Keyword,
}

impl Arguments {
    pub fn new(positional: Vec<Value>, keyword: Keyword) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    /// required positional argument at `index`
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, CallError> {
        let value = self
            .positional
            .get(index)
            .ok_or(CallError::MissingPositional(index))?;

        T::deserialize(value).map_err(|source| CallError::InvalidArgument {
            name: index.to_string(),
            source,
        })
    }

    /// optional keyword argument `name`
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CallError> {
        self.keyword
            .get(name)
            .map(|value| {
                T::deserialize(value).map_err(|source| CallError::InvalidArgument {
                    name: name.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

/// What a callable gets to see of the process it runs in
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext<'a> {
    communicator: Option<&'a dyn Communicator>,
}

impl<'a> CallContext<'a> {
    /// context outside of any MPI job
    pub fn detached() -> Self {
        Self { communicator: None }
    }

    pub fn with_communicator(communicator: &'a dyn Communicator) -> Self {
        Self {
            communicator: Some(communicator),
        }
    }

    pub fn communicator(&self) -> Result<&'a dyn Communicator, CommunicatorError> {
        self.communicator.ok_or(CommunicatorError::MissingContext)
    }
}

/// A function object that can be shipped inside a [`super::TaskEnvelope`]
///
/// The value itself is serialized, so captured state travels with it. The receiving
/// side finds the implementation through `NAME` in a [`CallableRegistry`].
pub trait Callable: Serialize + DeserializeOwned + 'static {
    /// stable name, has to be unique within a registry
    const NAME: &'static str;

    type Output: Serialize;

    fn call(&self, context: &CallContext<'_>, arguments: &Arguments)
        -> Result<Self::Output, CallError>;
}

type Invoke = fn(&Header, &[u8], &CallContext<'_>, &Arguments) -> Result<Value, EnvelopeError>;

fn invoke<C: Callable>(
    header: &Header,
    frame: &[u8],
    context: &CallContext<'_>,
    arguments: &Arguments,
) -> Result<Value, EnvelopeError> {
    let callable: C = header.codec.load(frame)?;
    let output = callable.call(context, arguments)?;

    Ok(serde_json::to_value(output)?)
}

/// Callables a process is able to reconstruct from an envelope
#[derive(Clone, Default)]
pub struct CallableRegistry {
    callables: BTreeMap<&'static str, Invoke>,
}

impl fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.callables.keys()).finish()
    }
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Callable>(&mut self) -> Result<&mut Self, EnvelopeError> {
        match self.callables.entry(C::NAME) {
            Entry::Occupied(_) => Err(EnvelopeError::AlreadyRegistered(C::NAME)),
            Entry::Vacant(entry) => {
                entry.insert(invoke::<C>);

                Ok(self)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.callables.keys().copied()
    }

    /// decode the callable described by `header` from `frame` and call it
    pub(crate) fn invoke(
        &self,
        header: &Header,
        frame: &[u8],
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<Value, EnvelopeError> {
        let invoke = self
            .callables
            .get(header.type_name.as_str())
            .ok_or_else(|| EnvelopeError::UnknownCallable(header.type_name.clone()))?;

        debug!(callable = %header.type_name, codec = ?header.codec, "Invoking callable");

        invoke(header, frame, context, arguments)
    }
}
