use crate::command::{EXIT_USAGE, ExitCode, Terminal};
use crate::completion::{self, ShellHelper};
use crate::env::Environment;
use crate::{executor, lexer, parser};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::ffi::OsString;
use std::io::Write;
use tracing::{debug, error};

const PROMPT: &str = "$ ";

/// An interactive shell session.
///
/// The interpreter owns the session [`Environment`] and the [`Terminal`] that
/// receives every output no stage redirects. Lines are run one at a time with
/// [`Interpreter::execute_line`]; [`Interpreter::repl`] reads them from the
/// user until `exit` or end of input.
///
/// Example
/// ```
/// use tinysh::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.execute_line("echo hello world").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    terminal: Terminal,
}

impl Interpreter {
    pub fn new(env: Environment, terminal: Terminal) -> Self {
        Self { env, terminal }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// True once `exit` ran in the session itself.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Tokenize, parse and execute one line.
    ///
    /// Returns the status of the pipeline's last stage. A line that does not
    /// parse runs nothing, is reported on the terminal's stderr and yields 2.
    /// `Err` is left for I/O failures of the interpreter itself.
    pub fn execute_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let tokens = lexer::split_into_tokens(line);
        debug!(?tokens, "tokenized");
        if tokens.is_empty() {
            return Ok(0);
        }

        let pipeline = match parser::construct_pipeline(tokens) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                debug!(%err, "rejected line");
                let mut sink = self.terminal.stderr()?;
                writeln!(sink, "tinysh: {err}")?;
                sink.flush()?;
                return Ok(EXIT_USAGE);
            }
        };
        debug!(?pipeline, "parsed");

        executor::execute(pipeline, &mut self.env, &self.terminal)
    }

    /// Read-eval loop over the terminal.
    ///
    /// Ctrl-C drops the line being edited; end of input ends the session.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl: Editor<ShellHelper, DefaultHistory> =
            Editor::with_config(completion::editor_config())?;
        let search_paths = self.env.search_paths().map(OsString::from);
        rl.set_helper(Some(ShellHelper::new(search_paths)));

        while !self.should_exit() {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.execute_line(&line) {
                        Ok(code) => debug!(code, "line finished"),
                        Err(err) => {
                            error!(%err, "failed to execute line");
                            eprintln!("tinysh: {err:#}");
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// A session over the process environment and the inherited terminal.
    fn default() -> Self {
        Self::new(Environment::new(), Terminal::inherit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::scratch_env;
    use std::fs::{self, File};

    fn captured() -> (tempfile::TempDir, Interpreter) {
        let dir = tempfile::tempdir().unwrap();
        let terminal = Terminal::capture(
            File::create(dir.path().join("out")).unwrap(),
            File::create(dir.path().join("err")).unwrap(),
        );
        let mut env = scratch_env();
        env.current_dir = dir.path().to_path_buf();
        (dir, Interpreter::new(env, terminal))
    }

    #[test]
    fn blank_lines_do_nothing() {
        let (dir, mut sh) = captured();
        assert_eq!(sh.execute_line("").unwrap(), 0);
        assert_eq!(sh.execute_line("   \t ").unwrap(), 0);
        assert_eq!(fs::read_to_string(dir.path().join("err")).unwrap(), "");
    }

    #[test]
    fn parse_errors_are_reported_and_run_nothing() {
        let (dir, mut sh) = captured();
        assert_eq!(sh.execute_line("echo hi > never.txt |").unwrap(), EXIT_USAGE);
        assert_eq!(
            fs::read_to_string(dir.path().join("err")).unwrap(),
            "tinysh: syntax error near unexpected token `|'\n"
        );
        assert!(!dir.path().join("never.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("out")).unwrap(), "");
    }

    #[test]
    fn dangling_redirect_is_a_parse_error() {
        let (dir, mut sh) = captured();
        assert_eq!(sh.execute_line("echo hi >").unwrap(), EXIT_USAGE);
        assert_eq!(
            fs::read_to_string(dir.path().join("err")).unwrap(),
            "tinysh: syntax error: missing file name after `>'\n"
        );
    }

    #[test]
    fn exit_ends_the_session() {
        let (_dir, mut sh) = captured();
        assert!(!sh.should_exit());
        assert_eq!(sh.execute_line("exit").unwrap(), 0);
        assert!(sh.should_exit());
    }
}
