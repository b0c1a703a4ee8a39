pub mod command;
pub mod geometry;
pub mod which;


use crate::config::ConfigErrors;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};

pub use command::{build, CommandInvocation, LaunchError, LaunchOutput, LaunchResult};
pub use geometry::{GeometryError, JobGeometry};
pub use which::{resolve, resolve_in};

/// All supported launcher kinds, in catalog order
pub const SUPPORTED_LAUNCHERS: [LauncherKind; 5] = [
    LauncherKind::Generic,
    LauncherKind::Slurm,
    LauncherKind::OpenMpi,
    LauncherKind::Intel,
    LauncherKind::Mpich,
];

/// MPI launcher flavours, each with its own syntax for process count and placement
///
/// Names are parsed case insensitively through [`FromStr`], in configs as well as on the
/// command line.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LauncherKind {
    /// plain `mpiexec`, infers the layout from the job environment
    Generic,
    Slurm,
    OpenMpi,
    Intel,
    Mpich,
}

impl LauncherKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Slurm => "slurm",
            Self::OpenMpi => "openmpi",
            Self::Intel => "intel",
            Self::Mpich => "mpich",
        }
    }

    /// binary used when the configuration doesn't override it
    pub fn default_binary(&self) -> &'static str {
        match self {
            Self::Generic | Self::Mpich => "mpiexec",
            Self::Slurm => "srun",
            Self::OpenMpi | Self::Intel => "mpirun",
        }
    }

    /// flags for a pure MPI layout, one core per rank
    pub fn total_tasks_flags(&self, geometry: &JobGeometry) -> Vec<String> {
        let total = geometry.total_tasks();
        let per_node = geometry.ntasks_per_node();

        match self {
            Self::Generic => Vec::new(),
            Self::Slurm => vec!["-n".into(), total.to_string()],
            Self::OpenMpi => vec![
                "-np".into(),
                total.to_string(),
                "--map-by".into(),
                format!("ppr:{per_node}:node"),
            ],
            Self::Intel => vec![
                "-n".into(),
                total.to_string(),
                "-perhost".into(),
                per_node.to_string(),
            ],
            Self::Mpich => vec![
                "-n".into(),
                total.to_string(),
                "-ppn".into(),
                per_node.to_string(),
            ],
        }
    }

    /// flags for a hybrid layout that reserves `cpus_per_task` cores for each rank
    pub fn hybrid_flags(&self, geometry: &JobGeometry) -> Vec<String> {
        let total = geometry.total_tasks();
        let per_node = geometry.ntasks_per_node();
        let cpus = geometry.cpus_per_task();

        match self {
            // NOTE: neither of these carries a threading hint, the layout stays as is
            Self::Generic | Self::Slurm => self.total_tasks_flags(geometry),
            Self::OpenMpi => vec![
                "-np".into(),
                total.to_string(),
                "--map-by".into(),
                format!("ppr:{per_node}:node:pe={cpus}"),
            ],
            Self::Intel => {
                let mut flags = self.total_tasks_flags(geometry);
                flags.extend(["-env".into(), "I_MPI_PIN_DOMAIN".into(), cpus.to_string()]);
                flags
            }
            Self::Mpich => {
                let mut flags = self.total_tasks_flags(geometry);
                flags.extend([
                    "-genv".into(),
                    "OMP_NUM_THREADS".into(),
                    cpus.to_string(),
                    "-bind-to".into(),
                    format!("core:{cpus}"),
                ]);
                flags
            }
        }
    }

    /// select base or hybrid flags depending on the geometry
    pub fn flags(&self, geometry: &JobGeometry) -> Vec<String> {
        if geometry.is_hybrid() {
            self.hybrid_flags(geometry)
        } else {
            self.total_tasks_flags(geometry)
        }
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for LauncherKind {
    type Err = ConfigErrors;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "generic" | "mpiexec" => Ok(Self::Generic),
            "slurm" | "srun" => Ok(Self::Slurm),
            "openmpi" => Ok(Self::OpenMpi),
            "intel" | "intelmpi" => Ok(Self::Intel),
            "mpich" | "hydra" => Ok(Self::Mpich),
            _ => Err(ConfigErrors::UnsupportedLauncher(name.to_string())),
        }
    }
}

impl TryFrom<String> for LauncherKind {
    type Error = ConfigErrors;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// A launcher kind bound to the binary that is actually invoked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LauncherSpec {
    kind: LauncherKind,
    binary: Cow<'static, str>,
}

impl LauncherSpec {
    pub fn new(kind: LauncherKind) -> Self {
        Self {
            binary: Cow::Borrowed(kind.default_binary()),
            kind,
        }
    }

    /// replace the default binary, e.g. with a site specific absolute path
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Cow::Owned(binary.into());
        self
    }

    pub fn kind(&self) -> LauncherKind {
        self.kind
    }

    pub fn binary_name(&self) -> &str {
        &self.binary
    }
}

impl From<LauncherKind> for LauncherSpec {
    fn from(kind: LauncherKind) -> Self {
        Self::new(kind)
    }
}
