use std::collections::HashMap;
use std::env as stdenv;
use std::io;
use std::path::{Path, PathBuf};

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: a flag the read-eval loop checks to know when to terminate.
///
/// A *detached* environment is a copy handed to built-ins that run inside a
/// multi-stage pipeline: changing directory there never touches the process.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
    detached: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_vars(vars, current_dir)
    }

    /// Build an environment from explicit parts.
    pub fn with_vars(vars: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self {
            vars,
            current_dir,
            should_exit: false,
            detached: false,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The PATH-equivalent search list, if set.
    pub fn search_paths(&self) -> Option<String> {
        self.get_var("PATH")
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME").map(PathBuf::from)
    }

    /// A copy whose directory changes and exit requests stay local.
    pub fn detached(&self) -> Self {
        Self {
            detached: true,
            ..self.clone()
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Switch the working directory.
    ///
    /// `dir` is resolved against `current_dir` and must name an existing
    /// directory. The process working directory follows unless this
    /// environment is detached.
    pub fn change_dir(&mut self, dir: &Path) -> io::Result<()> {
        let canonical = self.current_dir.join(dir).canonicalize()?;
        if !canonical.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", canonical.display()),
            ));
        }
        if !self.detached {
            stdenv::set_current_dir(&canonical)?;
        }
        self.current_dir = canonical;
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
