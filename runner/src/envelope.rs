//! Structural envelope that carries a callable and its arguments across processes
//!
//! The envelope only decides which key groups exist, the bytes inside each frame come
//! from a general purpose serde format (see [`ObjectCodec`]). Key groups:
//!
//! | keys                           | present when                   |
//! |--------------------------------|--------------------------------|
//! | `header`, `frames`             | always, encode the callable    |
//! | `args_header`, `args_frames`   | at least one positional arg    |
//! | `kwargs_header`, `kwargs_frames` | at least one keyword arg     |

pub mod callable;
pub mod executor;

#[cfg(test)]
mod envelope_test;

use crate::distributed::CommunicatorError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

pub use callable::{Arguments, CallContext, CallError, Callable, CallableRegistry, Keyword};
pub use executor::{decode_and_execute, mpi_decode_and_execute, mpi_decode_and_execute_in_process};

/// opaque bytes produced by an [`ObjectCodec`]
pub type Frame = Vec<u8>;

const ARGS_TYPE: &str = "args";
const KWARGS_TYPE: &str = "kwargs";

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("JSON codec failed")]
    Json(#[from] serde_json::Error),
    #[error("YAML codec failed")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Malformed {group} group: {reason}")]
    Malformed { group: &'static str, reason: String },
    #[error("Callable '{0}' is not registered")]
    UnknownCallable(String),
    #[error("Callable '{0}' is already registered")]
    AlreadyRegistered(&'static str),
    #[error("Callable failed")]
    Call(#[from] CallError),
    #[error("No communicator for MPI aware execution")]
    Context(#[from] CommunicatorError),
}

/// Byte level format used for the frames of an envelope
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCodec {
    #[default]
    Json,
    Yaml,
}

impl ObjectCodec {
    pub fn dump<T: Serialize + ?Sized>(&self, value: &T) -> Result<Frame, EnvelopeError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::Yaml => Ok(serde_yaml::to_string(value)?.into_bytes()),
        }
    }

    pub fn load<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T, EnvelopeError> {
        match self {
            Self::Json => Ok(serde_json::from_slice(frame)?),
            Self::Yaml => Ok(serde_yaml::from_slice(frame)?),
        }
    }
}

/// Describes the frames of one key group
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub codec: ObjectCodec,
    /// callable name, or the argument group kind
    #[serde(rename = "type")]
    pub type_name: String,
    pub frame_count: usize,
    /// keyword names, in frame order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl Header {
    fn new(codec: ObjectCodec, type_name: impl Into<String>, frame_count: usize) -> Self {
        Self {
            codec,
            type_name: type_name.into(),
            frame_count,
            keys: Vec::new(),
        }
    }
}

/// A callable plus its arguments, ready to be shipped to another process
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TaskEnvelope {
    header: Header,
    frames: Vec<Frame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args_header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args_frames: Option<Vec<Frame>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kwargs_header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kwargs_frames: Option<Vec<Frame>>,
}

/// Encode `callable` and its arguments with the default codec
pub fn encode<C: Callable>(
    callable: &C,
    positional: &[Value],
    keyword: &Keyword,
) -> Result<TaskEnvelope, EnvelopeError> {
    encode_with(ObjectCodec::default(), callable, positional, keyword)
}

/// Encode `callable` and its arguments, argument groups only exist if they are non empty
pub fn encode_with<C: Callable>(
    codec: ObjectCodec,
    callable: &C,
    positional: &[Value],
    keyword: &Keyword,
) -> Result<TaskEnvelope, EnvelopeError> {
    let mut envelope = TaskEnvelope {
        header: Header::new(codec, C::NAME, 1),
        frames: vec![codec.dump(callable)?],
        args_header: None,
        args_frames: None,
        kwargs_header: None,
        kwargs_frames: None,
    };

    if !positional.is_empty() {
        let frames = positional
            .iter()
            .map(|value| codec.dump(value))
            .collect::<Result<Vec<_>, _>>()?;

        envelope.args_header = Some(Header::new(codec, ARGS_TYPE, frames.len()));
        envelope.args_frames = Some(frames);
    }

    if !keyword.is_empty() {
        let frames = keyword
            .values()
            .map(|value| codec.dump(value))
            .collect::<Result<Vec<_>, _>>()?;

        let mut header = Header::new(codec, KWARGS_TYPE, frames.len());
        header.keys = keyword.keys().cloned().collect();

        envelope.kwargs_header = Some(header);
        envelope.kwargs_frames = Some(frames);
    }

    trace!(callable = C::NAME, keys = ?envelope.keys(), "Encoded envelope");

    Ok(envelope)
}

/// check that a group is either fully present or fully absent, and consistent
fn group<'a>(
    name: &'static str,
    header: Option<&'a Header>,
    frames: Option<&'a Vec<Frame>>,
) -> Result<Option<(&'a Header, &'a [Frame])>, EnvelopeError> {
    match (header, frames) {
        (None, None) => Ok(None),
        (Some(header), Some(frames)) => {
            if header.frame_count != frames.len() {
                Err(EnvelopeError::Malformed {
                    group: name,
                    reason: format!(
                        "header announces {} frames but {} are present",
                        header.frame_count,
                        frames.len()
                    ),
                })
            } else if frames.is_empty() {
                Err(EnvelopeError::Malformed {
                    group: name,
                    reason: "group is present but empty".to_string(),
                })
            } else {
                Ok(Some((header, frames.as_slice())))
            }
        }
        _ => Err(EnvelopeError::Malformed {
            group: name,
            reason: "header and frames have to be present together".to_string(),
        }),
    }
}

impl TaskEnvelope {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// name of the encoded callable
    pub fn callable_name(&self) -> &str {
        &self.header.type_name
    }

    /// keys of the wire representation, in wire order
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["header", "frames"];

        if self.args_header.is_some() {
            keys.extend(["args_header", "args_frames"]);
        }

        if self.kwargs_header.is_some() {
            keys.extend(["kwargs_header", "kwargs_frames"]);
        }

        keys
    }

    /// the single frame holding the callable itself
    pub fn callable_frame(&self) -> Result<&[u8], EnvelopeError> {
        match group("callable", Some(&self.header), Some(&self.frames))? {
            Some((_, [frame])) => Ok(frame.as_slice()),
            _ => Err(EnvelopeError::Malformed {
                group: "callable",
                reason: format!("expected exactly one frame, found {}", self.frames.len()),
            }),
        }
    }

    /// rebuild positional and keyword arguments, absent groups are empty
    pub fn arguments(&self) -> Result<Arguments, EnvelopeError> {
        let positional = match group(
            "args",
            self.args_header.as_ref(),
            self.args_frames.as_ref(),
        )? {
            Some((header, frames)) => frames
                .iter()
                .map(|frame| header.codec.load::<Value>(frame))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let keyword = match group(
            "kwargs",
            self.kwargs_header.as_ref(),
            self.kwargs_frames.as_ref(),
        )? {
            Some((header, frames)) => {
                if header.keys.len() != frames.len() {
                    return Err(EnvelopeError::Malformed {
                        group: "kwargs",
                        reason: format!(
                            "{} keys for {} frames",
                            header.keys.len(),
                            frames.len()
                        ),
                    });
                }

                header
                    .keys
                    .iter()
                    .zip(frames)
                    .map(|(key, frame)| {
                        header
                            .codec
                            .load::<Value>(frame)
                            .map(|value| (key.clone(), value))
                    })
                    .collect::<Result<Keyword, EnvelopeError>>()?
            }
            None => Keyword::new(),
        };

        Ok(Arguments::new(positional, keyword))
    }
}
