use crate::builtin::Builtin;
use crate::env::Environment;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// What a command name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Implemented inside the interpreter.
    Builtin(Builtin),
    /// An executable file, found on PATH or named directly.
    External(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{0}: command not found")]
    NotFound(String),
}

/// Resolve a command name to a built-in or an executable.
///
/// Built-in names always win over executables of the same name. Nothing is
/// cached: every call probes the filesystem again, so changes to PATH or to
/// its directories are seen by the next command.
pub fn resolve(name: &str, env: &Environment) -> Result<ResolvedTarget, ResolutionError> {
    if let Some(builtin) = Builtin::from_name(name) {
        return Ok(ResolvedTarget::Builtin(builtin));
    }

    let search_paths = env.search_paths().unwrap_or_default();
    let found = find_command_path(OsStr::new(&search_paths), &env.current_dir, Path::new(name));
    debug!(name, ?found, "resolved command");
    found
        .map(ResolvedTarget::External)
        .ok_or_else(|| ResolutionError::NotFound(name.to_string()))
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first executable match.
/// - Absolute path: returns it if it is executable.
/// - Relative path with separators (`./foo`, `bin/sh`): resolved against `current_dir`
///   and returned if executable.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, current_dir: &Path, path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        // Empty path -> not found
        (None, _) => None,
        // Single plain component -> search in PATH
        (Some(std::path::Component::Normal(x)), None) => find_in_path(search_paths, x),
        // Anything else is a path of its own
        _ => {
            let candidate = current_dir.join(path);
            is_executable(&candidate).then_some(candidate)
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

/// True for regular files the current user may execute.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

/// Names of every executable file found in the `search_paths` directories.
///
/// Unreadable or missing directories are skipped.
pub fn executables_in_path(search_paths: &OsStr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in std::env::split_paths(search_paths) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            if !is_executable(&entry.path()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
    }
    names
}
