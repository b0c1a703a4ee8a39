use crate::launcher::{resolve, GeometryError, JobGeometry, LauncherKind, LauncherSpec};
use serde::{Deserialize, Serialize};
use std::{fs, io::Error, path::Path};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file")]
    Read(#[from] Error),
    #[error("Config is not valid YAML for a launch config")]
    Parse(#[from] serde_yaml::Error),
    #[error("Launcher '{0}' is not supported")]
    UnsupportedLauncher(String),
    #[error("Invalid job geometry")]
    Geometry(#[from] GeometryError),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfig {
    pub launcher: LauncherConfig,
    // falls back to a single rank on a single node
    #[serde(default)]
    pub geometry: JobGeometry,
    // passed verbatim between the launcher flags and the executable
    #[serde(default)]
    pub launcher_args: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    pub kind: LauncherKind,
    // overrides the default binary of `kind`, flags still follow `kind`
    #[serde(default)]
    pub binary: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherConfig {
                kind: LauncherKind::Generic,
                binary: None,
            },
            geometry: JobGeometry::default(),
            launcher_args: None,
        }
    }
}

impl LaunchConfig {
    /// load a config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(|error| {
            error!(path = ?path, error = ?error, "Failed to read config");
            error
        })?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigErrors> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn launcher(&self) -> LauncherSpec {
        let launcher = LauncherSpec::new(self.launcher.kind);

        match &self.launcher.binary {
            Some(binary) => launcher.with_binary(binary.as_str()),
            None => launcher,
        }
    }

    /// Check everything that can be checked before launching, see [`preflight_checks`]
    pub fn preflight_checks(&self, executable: Option<&str>) -> bool {
        preflight_checks(&self.launcher(), &self.geometry, executable)
    }
}

/// Check a launch before it happens
///
/// All problems are logged instead of failing on the first one, returns whether any of
/// them is an error.
pub fn preflight_checks(
    launcher: &LauncherSpec,
    geometry: &JobGeometry,
    executable: Option<&str>,
) -> bool {
    let mut contains_error = false;

    if resolve(launcher.binary_name()).is_none() {
        error!(
            "launcher.binary '{}' for {} is either not found or not executable",
            launcher.binary_name(),
            launcher.kind()
        );
        contains_error = true;
    }

    if let Some(executable) = executable {
        if resolve(executable).is_none() {
            // the executable may only exist on the compute nodes
            warn!("Executable '{executable}' is not resolvable on this host");
        }
    }

    if geometry.is_hybrid() && matches!(launcher.kind(), LauncherKind::Generic | LauncherKind::Slurm)
    {
        warn!(
            "geometry.cpus_per_task is {} but the {} launcher has no flag for threads per rank",
            geometry.cpus_per_task(),
            launcher.kind()
        );
    }

    contains_error
}
