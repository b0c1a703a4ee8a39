use super::{JobGeometry, LauncherSpec};
use itertools::Itertools;
use std::{
    fmt, io,
    os::unix::process::ExitStatusExt,
    process::{Command, ExitStatus, Stdio},
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("OS error caused by constructed command: {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to split constructed command into arguments: {command}")]
    Malformed {
        command: String,
        #[source]
        source: shell_words::ParseError,
    },
    #[error("Constructed command is empty")]
    Empty,
}

/// Output of a finished launcher process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutput {
    pub out: Vec<u8>,
    pub err: Vec<u8>,
    /// exit status, or the negated signal number if the child was killed
    pub returncode: i32,
}

impl LaunchOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }
}

fn returncode(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => -signal,
        (None, None) => -1,
    }
}

/// Either the inspected command (dry run) or the result of running it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchResult {
    Command(String),
    Completed(LaunchOutput),
}

/// A launcher command line, kept as segments until it is rendered
///
/// Segments are `launcher binary`, `launcher flags`, `extra launcher args`,
/// `executable` and `exec args`. Empty ones are skipped when joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    segments: [String; 5],
}

impl CommandInvocation {
    pub fn new(
        launcher: &LauncherSpec,
        executable: &str,
        exec_args: &str,
        geometry: &JobGeometry,
        extra_args: Option<&str>,
    ) -> Self {
        let flags = launcher.kind().flags(geometry).join(" ");

        Self {
            segments: [
                launcher.binary_name().trim().to_string(),
                flags,
                extra_args.unwrap_or_default().trim().to_string(),
                executable.trim().to_string(),
                exec_args.trim().to_string(),
            ],
        }
    }

    /// all non empty segments in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .map(String::as_str)
            .filter(|segment| !segment.is_empty())
    }

    /// split the rendered command line like a POSIX shell would
    pub fn argv(&self) -> Result<Vec<String>, LaunchError> {
        let command = self.to_string();

        shell_words::split(&command).map_err(|source| LaunchError::Malformed { command, source })
    }

    /// Run the command and block until it finishes
    ///
    /// Spawn failures are configuration errors and are never retried.
    #[instrument(level = "info", skip(self), fields(command = %self))]
    pub fn execute(&self) -> Result<LaunchOutput, LaunchError> {
        let argv = self.argv()?;
        let (program, args) = argv.split_first().ok_or(LaunchError::Empty)?;

        debug!(program = program, args = ?args, "Spawning launcher");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| {
                error!(error = ?source, "Failed to start launcher");

                LaunchError::Spawn {
                    command: self.to_string(),
                    source,
                }
            })?;

        let output = LaunchOutput {
            returncode: returncode(output.status),
            out: output.stdout,
            err: output.stderr,
        };

        if output.success() {
            info!("Launcher finished");
        } else {
            warn!(returncode = output.returncode, "Launcher exited with failure");
        }

        Ok(output)
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join(" "))
    }
}

/// Compose the launcher invocation for `executable` and either return it or run it
pub fn build(
    launcher: &LauncherSpec,
    executable: &str,
    exec_args: &str,
    geometry: &JobGeometry,
    extra_args: Option<&str>,
    dry_run: bool,
) -> Result<LaunchResult, LaunchError> {
    let invocation = CommandInvocation::new(launcher, executable, exec_args, geometry, extra_args);

    if dry_run {
        debug!(command = %invocation, "Dry run, returning command");

        Ok(LaunchResult::Command(invocation.to_string()))
    } else {
        invocation.execute().map(LaunchResult::Completed)
    }
}
