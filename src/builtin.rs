use crate::command::ExitCode;
use crate::env::Environment;
use crate::resolver::{self, ResolvedTarget};
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::io::{Read, Write};
use std::path::PathBuf;

/// The fixed set of commands implemented inside the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Echo,
    Exit,
    Type,
    Pwd,
    Cd,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Echo,
        Builtin::Exit,
        Builtin::Type,
        Builtin::Pwd,
        Builtin::Cd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Echo => Echo::name(),
            Builtin::Exit => Exit::name(),
            Builtin::Type => Type::name(),
            Builtin::Pwd => Pwd::name(),
            Builtin::Cd => Cd::name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Parse `args` into a ready-to-run command.
    ///
    /// Bad arguments do not fail here: they produce a command that reports
    /// the problem when run.
    pub fn instantiate(self, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match self {
            Builtin::Echo => create::<Echo>(args),
            Builtin::Exit => create::<Exit>(args),
            Builtin::Type => create::<Type>(args),
            Builtin::Pwd => create::<Pwd>(args),
            Builtin::Cd => create::<Cd>(args),
        }
    }
}

/// Object-safe view of a parsed built-in, as dispatched by the executor.
pub trait ExecutableCommand {
    /// Runs the command in-process.
    ///
    /// An `Err` is a diagnostic for the user; the caller prints it and
    /// treats the command as failed.
    fn run(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn run(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, stdin, stdout, env)
    }
}

/// Stands in for a built-in whose arguments did not parse (or asked for help).
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn run(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            return Err(anyhow!("{}", self.output.trim_end()));
        }
        stdout.write_all(self.output.as_bytes())?;
        Ok(0)
    }
}

fn create<T: BuiltinCommand + 'static>(args: &[&str]) -> Box<dyn ExecutableCommand> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or starting with `~`.
    pub target: Option<String>,
}

impl Cd {
    /// Expands a leading `~` (alone or followed by `/`) to HOME.
    fn expand_target(&self, env: &Environment) -> Result<PathBuf> {
        let home = || env.home_dir().ok_or_else(|| anyhow!("cd: HOME not set"));
        match self.target.as_deref() {
            None | Some("") | Some("~") => home(),
            Some(t) => match t.strip_prefix("~/") {
                Some(rest) => Ok(home()?.join(rest)),
                None => Ok(PathBuf::from(t)),
            },
        }
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = self.expand_target(env)?;
        let shown = self
            .target
            .unwrap_or_else(|| target.to_string_lossy().into_owned());
        env.change_dir(&target)
            .map_err(|_| anyhow!("cd: no such file or directory: {shown}"))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; a status code argument is not supported.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces.
///
/// Arguments are printed as-is, including ones that start with `-`; only a
/// leading `-n` is interpreted, suppressing the trailing newline.
pub struct Echo {
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let (no_newline, rest) = match args.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            args: rest.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut code = 0;
        for name in &self.names {
            match resolver::resolve(name, env) {
                Ok(ResolvedTarget::Builtin(_)) => writeln!(stdout, "{name} is a shell builtin")?,
                Ok(ResolvedTarget::External(path)) => {
                    writeln!(stdout, "{name} is {}", path.display())?
                }
                Err(_) => {
                    writeln!(stdout, "{name}: not found")?;
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}
