use super::Communicator;
use std::{
    fmt,
    io::{self, Write},
    process::exit,
};
use thiserror::Error;
use tracing::{error, warn};

/// exit code used for invalid communicators and generic aborts
pub const DEFAULT_ERROR_CODE: i32 = 1;

/// How far a fatal condition reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortScope {
    /// only the calling process goes down, used without a real MPI job
    Local,
    /// every rank of the job goes down, otherwise the others block in pending collectives
    Coordinated,
}

impl fmt::Display for AbortScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Coordinated => f.write_str("coordinated"),
        }
    }
}

/// An MPI level inconsistency that can't be recovered from locally
///
/// Nothing is terminated when this value is created. It is handed up to a supervisor
/// that either calls [`Fatal::terminate`] or decides otherwise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Fatal {scope} abort with exit code {code}: {reason}")]
pub struct Fatal {
    code: i32,
    scope: AbortScope,
    reason: String,
}

impl Fatal {
    pub fn new(code: i32, scope: AbortScope, reason: impl Into<String>) -> Self {
        Self {
            code,
            scope,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn scope(&self) -> AbortScope {
        self.scope
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Flush output and end the process, or the whole job through `world`
    ///
    /// A coordinated abort without a communicator falls back to a local exit.
    pub fn terminate(self, world: Option<&dyn Communicator>) -> ! {
        flush_output();

        match (self.scope, world) {
            (AbortScope::Coordinated, Some(world)) => {
                error!(code = self.code, reason = %self.reason, "Aborting all ranks");
                flush_output();

                world.abort(self.code)
            }
            (AbortScope::Coordinated, None) => {
                warn!(
                    code = self.code,
                    reason = %self.reason,
                    "No communicator available for a coordinated abort, exiting locally"
                );
                flush_output();

                exit(self.code)
            }
            (AbortScope::Local, _) => {
                error!(code = self.code, reason = %self.reason, "Exiting process");
                flush_output();

                exit(self.code)
            }
        }
    }
}

fn flush_output() {
    // nothing sensible is left to do if the streams are already gone
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// Flush buffered output and produce the fatal outcome for `error_code`
///
/// `coordinated` selects a job wide abort, which is what a real MPI job needs.
pub fn flush_and_abort(error_code: i32, coordinated: bool) -> Fatal {
    flush_output();

    let scope = if coordinated {
        AbortScope::Coordinated
    } else {
        AbortScope::Local
    };

    Fatal::new(error_code, scope, "abort requested")
}
