use crate::command::{ExitCode, Stdin, Stdout};
use crate::env::Environment;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, ExitStatus};
use tracing::debug;

/// Command that is not a builtin: an executable launched as a child process.
#[derive(Debug)]
pub struct ExternalCommand {
    /// Name as typed by the user; becomes the child's `argv[0]`.
    name: OsString,
    /// Resolved executable.
    path: PathBuf,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(name: impl Into<OsString>, path: PathBuf, args: Vec<OsString>) -> Self {
        Self {
            name: name.into(),
            path,
            args,
        }
    }

    /// Starts the process with the given stream endpoints without waiting for it.
    ///
    /// The endpoints are moved into the child; the parent keeps no copy, so a
    /// pipe reaches end-of-file as soon as every child holding it has exited.
    pub fn spawn(
        self,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        stderr: Box<dyn Stdout>,
        env: &Environment,
    ) -> io::Result<Child> {
        let mut cmd = std::process::Command::new(&self.path);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&self.name);
        }
        let child = cmd
            .args(&self.args)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .stderr(stderr.stdio())
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir)
            .spawn()?;
        debug!(pid = child.id(), path = %self.path.display(), "spawned");
        Ok(child)
    }
}

/// Shell-style exit code of a finished child.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
