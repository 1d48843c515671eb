//! Pipeline execution: redirections, stream wiring, dispatch and reaping.
//!
//! A pipeline moves through `resolve → spawn → run built-ins → reap`. Any
//! redirection or resolution failure is reported once and stops the whole
//! pipeline before a single stage starts.

use crate::builtin::ExecutableCommand;
use crate::command::{EXIT_CANNOT_EXECUTE, EXIT_NOT_FOUND, ExitCode, Stdin, Stdout, Terminal};
use crate::env::Environment;
use crate::external::{self, ExternalCommand};
use crate::parser::{Pipeline, RedirectMode, RedirectionSpec, StageCommand};
use crate::resolver::{self, ResolvedTarget};
use anyhow::Result;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::process::Child;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Redirection files of one stage, opened before anything runs.
struct OpenedRedirections {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl OpenedRedirections {
    fn open(stage: &StageCommand, env: &Environment) -> io::Result<Self> {
        let open = |spec: &Option<RedirectionSpec>| spec.as_ref().map(|s| open_target(s, env)).transpose();
        Ok(Self {
            stdout: open(&stage.redirections.stdout)?,
            stderr: open(&stage.redirections.stderr)?,
        })
    }

    /// Sink for messages about this stage: its stderr file if redirected,
    /// the terminal's stdout otherwise.
    fn diagnostics(&self, terminal: &Terminal) -> io::Result<Box<dyn Stdout>> {
        match &self.stderr {
            Some(file) => Ok(Box::new(file.try_clone()?)),
            None => terminal.stdout(),
        }
    }
}

fn open_target(spec: &RedirectionSpec, env: &Environment) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match spec.mode {
        RedirectMode::Truncate => {
            options.write(true).truncate(true);
        }
        RedirectMode::Append => {
            options.append(true);
        }
    }
    options
        .create(true)
        .open(env.current_dir.join(&spec.target))
        .map_err(|err| io::Error::new(err.kind(), format!("{}: {err}", spec.target.display())))
}

enum Runner {
    Builtin(Box<dyn ExecutableCommand>),
    External(ExternalCommand),
}

struct PreparedStage {
    name: String,
    runner: Runner,
    files: OpenedRedirections,
}

/// A built-in waiting for every external stage to be started.
struct BuiltinStage {
    cmd: Box<dyn ExecutableCommand>,
    stdin: Box<dyn Stdin>,
    stdout: Box<dyn Stdout>,
    diagnostics: Box<dyn Stdout>,
    /// Output feeds the next stage rather than a file or the terminal.
    piped: bool,
}

/// Executes a parsed pipeline and returns the exit status of its last stage.
///
/// Redirection targets of every stage are opened (and truncated) first, then
/// every stage is resolved. External stages are started left to right, each
/// connected to its neighbours with an OS pipe; built-ins then run in-process.
/// All children are reaped before returning.
pub fn execute(pipeline: Pipeline, env: &mut Environment, terminal: &Terminal) -> Result<ExitCode> {
    let stages = pipeline.into_stages();
    debug!(stages = stages.len(), "executing pipeline");

    let mut opened = Vec::with_capacity(stages.len());
    for stage in &stages {
        match OpenedRedirections::open(stage, env) {
            Ok(files) => opened.push(files),
            Err(err) => {
                let mut sink = terminal.stderr()?;
                writeln!(sink, "tinysh: {err}")?;
                sink.flush()?;
                return Ok(1);
            }
        }
    }

    let mut prepared = Vec::with_capacity(stages.len());
    for (stage, files) in stages.into_iter().zip(opened) {
        let runner = match resolver::resolve(&stage.program, env) {
            Ok(ResolvedTarget::Builtin(builtin)) => {
                let args: Vec<&str> = stage.args.iter().map(String::as_str).collect();
                Runner::Builtin(builtin.instantiate(&args))
            }
            Ok(ResolvedTarget::External(path)) => Runner::External(ExternalCommand::new(
                &stage.program,
                path,
                stage.args.iter().map(OsString::from).collect(),
            )),
            Err(err) => {
                debug!(%err, "pipeline aborted before start");
                let mut sink = files.diagnostics(terminal)?;
                writeln!(sink, "{err}")?;
                sink.flush()?;
                return Ok(EXIT_NOT_FOUND);
            }
        };
        prepared.push(PreparedStage {
            name: stage.program,
            runner,
            files,
        });
    }

    run_stages(prepared, env, terminal)
}

fn run_stages(
    stages: Vec<PreparedStage>,
    env: &mut Environment,
    terminal: &Terminal,
) -> Result<ExitCode> {
    let count = stages.len();
    let mut children: Vec<(usize, Child)> = Vec::with_capacity(count);
    let mut builtins: Vec<(usize, BuiltinStage)> = Vec::new();
    let mut next_stdin: Option<Box<dyn Stdin>> = None;

    for (index, stage) in stages.into_iter().enumerate() {
        let is_last = index + 1 == count;
        let PreparedStage {
            name,
            runner,
            mut files,
        } = stage;

        let stdin = next_stdin.take().unwrap_or_else(|| terminal.stdin());
        let stdout: Box<dyn Stdout> = if is_last {
            match files.stdout.take() {
                Some(file) => Box::new(file),
                None => terminal.stdout()?,
            }
        } else {
            let (reader, writer) = io::pipe()?;
            next_stdin = Some(Box::new(reader));
            Box::new(writer)
        };
        let diagnostics = files.diagnostics(terminal)?;

        match runner {
            Runner::External(cmd) => {
                let stderr: Box<dyn Stdout> = match files.stderr.take() {
                    Some(file) => Box::new(file),
                    None => terminal.stderr()?,
                };
                match cmd.spawn(stdin, stdout, stderr, env) {
                    Ok(child) => children.push((index, child)),
                    Err(err) => {
                        let mut sink = diagnostics;
                        writeln!(sink, "{name}: {err}")?;
                        sink.flush()?;
                        abandon(children);
                        return Ok(EXIT_CANNOT_EXECUTE);
                    }
                }
            }
            Runner::Builtin(cmd) => builtins.push((
                index,
                BuiltinStage {
                    cmd,
                    stdin,
                    stdout,
                    diagnostics,
                    piped: !is_last,
                },
            )),
        }
    }

    let mut last_status = 0;
    let mut feeders = Vec::new();
    for (index, stage) in builtins {
        // Inside a multi-stage pipeline a built-in behaves as if run in a
        // subshell: `cd` and `exit` do not reach the session.
        let (code, feeder) = if count > 1 {
            run_builtin(stage, &mut env.detached())?
        } else {
            run_builtin(stage, env)?
        };
        feeders.extend(feeder);
        if index + 1 == count {
            last_status = code;
        }
    }

    for (index, mut child) in children {
        match child.wait() {
            Ok(status) => {
                let code = external::exit_code(status);
                debug!(stage = index, pid = child.id(), code, "stage finished");
                if index + 1 == count {
                    last_status = code;
                }
            }
            Err(err) => warn!(stage = index, %err, "failed to wait for child"),
        }
    }

    for feeder in feeders {
        if feeder.join().is_err() {
            warn!("pipe feeder thread panicked");
        }
    }

    Ok(last_status)
}

/// Runs a built-in in-process.
///
/// Output bound for a pipe is collected first and handed to a helper thread,
/// so the interpreter never blocks on a pipe nobody is reading yet.
fn run_builtin(
    stage: BuiltinStage,
    env: &mut Environment,
) -> Result<(ExitCode, Option<JoinHandle<()>>)> {
    let BuiltinStage {
        cmd,
        mut stdin,
        mut stdout,
        mut diagnostics,
        piped,
    } = stage;

    if !piped {
        let result = cmd.run(&mut stdin, &mut stdout, env);
        stdout.flush()?;
        return Ok((report(result, &mut diagnostics)?, None));
    }

    let mut buffer = Vec::new();
    let result = cmd.run(&mut stdin, &mut buffer, env);
    drop(stdin);
    let code = report(result, &mut diagnostics)?;
    let feeder = thread::spawn(move || {
        if let Err(err) = stdout.write_all(&buffer) {
            if err.kind() != io::ErrorKind::BrokenPipe {
                warn!(%err, "failed to feed built-in output into pipe");
            }
        }
    });
    Ok((code, Some(feeder)))
}

/// Prints a built-in's error on its diagnostic sink.
fn report(result: Result<ExitCode>, sink: &mut dyn Write) -> Result<ExitCode> {
    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            writeln!(sink, "{err}")?;
            sink.flush()?;
            Ok(1)
        }
    }
}

/// Stops the already-started part of a pipeline that cannot run as a whole.
fn abandon(children: Vec<(usize, Child)>) {
    for (index, mut child) in children {
        if let Err(err) = child.kill() {
            debug!(stage = index, %err, "kill failed");
        }
        if let Err(err) = child.wait() {
            warn!(stage = index, %err, "failed to wait for child");
        }
    }
}
