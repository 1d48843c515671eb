use std::fs::File;
use std::io::{self, Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status of a pipeline whose command could not be resolved.
pub const EXIT_NOT_FOUND: ExitCode = 127;
/// Status of a stage whose executable could not be started.
pub const EXIT_CANNOT_EXECUTE: ExitCode = 126;
/// Status of a line rejected by the parser.
pub const EXIT_USAGE: ExitCode = 2;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Implementors typically wrap standard input or the read end of a pipe. A blanket
/// implementation exists for any type that implements `Read` and `Into<Stdio>`.
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Outputs are `Send` so that buffered built-in output can be pushed into a pipe
/// from a helper thread. A blanket implementation exists for any type that
/// implements `Write`, `Send` and `Into<Stdio>` (files, pipe writers).
pub trait Stdout: Write + Send {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Send + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// The interpreter's own standard input, inherited by children.
pub struct InheritedStdin(io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl From<InheritedStdin> for Stdio {
    fn from(_: InheritedStdin) -> Stdio {
        Stdio::inherit()
    }
}

/// The interpreter's own standard output, inherited by children.
pub struct InheritedStdout(io::Stdout);

impl Write for InheritedStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl From<InheritedStdout> for Stdio {
    fn from(_: InheritedStdout) -> Stdio {
        Stdio::inherit()
    }
}

/// The interpreter's own standard error, inherited by children.
pub struct InheritedStderr(io::Stderr);

impl Write for InheritedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl From<InheritedStderr> for Stdio {
    fn from(_: InheritedStderr) -> Stdio {
        Stdio::inherit()
    }
}

/// Where output goes when a stage has no redirection of its own.
///
/// The interactive shell inherits the process streams. Tests capture both
/// streams into files instead; children then write to those files directly.
#[derive(Debug, Default)]
pub struct Terminal {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl Terminal {
    /// Use the interpreter's own standard streams.
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Send terminal output to the given files.
    pub fn capture(stdout: File, stderr: File) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }

    pub fn stdin(&self) -> Box<dyn Stdin> {
        Box::new(InheritedStdin(io::stdin()))
    }

    pub fn stdout(&self) -> io::Result<Box<dyn Stdout>> {
        match &self.stdout {
            Some(file) => Ok(Box::new(file.try_clone()?)),
            None => Ok(Box::new(InheritedStdout(io::stdout()))),
        }
    }

    pub fn stderr(&self) -> io::Result<Box<dyn Stdout>> {
        match &self.stderr {
            Some(file) => Ok(Box::new(file.try_clone()?)),
            None => Ok(Box::new(InheritedStderr(io::stderr()))),
        }
    }
}
