use nix::unistd::{access, AccessFlags};
use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};
use tracing::{debug, trace};

/// check if a path is a regular file the current user may execute
pub fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

/// Locate `name` on the `PATH` of the current process
///
/// Returns `None` instead of an error if nothing qualifies, callers use this to skip
/// launchers that aren't installed.
pub fn resolve(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    let search_path = env::var_os("PATH").unwrap_or_default();

    resolve_in(name, &search_path)
}

/// Locate `name` on an explicit, `PATH` formatted search list
///
/// Names containing a path separator are checked as is and returned unchanged.
pub fn resolve_in(name: impl AsRef<OsStr>, search_path: &OsStr) -> Option<PathBuf> {
    let name = Path::new(name.as_ref());

    if name.as_os_str().is_empty() {
        return None;
    }

    if name.to_string_lossy().contains(MAIN_SEPARATOR) {
        return if is_executable(name) {
            Some(name.to_path_buf())
        } else {
            debug!(path = ?name, "Path is either missing or not executable");
            None
        };
    }

    let found = env::split_paths(search_path)
        .map(|directory| directory.join(name))
        .inspect(|candidate| trace!(candidate = ?candidate, "Checking candidate"))
        .find(|candidate| is_executable(candidate));

    if found.is_none() {
        debug!(name = ?name, "Executable not found on search path");
    }

    found
}
