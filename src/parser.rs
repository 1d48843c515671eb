use crate::lexer::Token;
use std::path::PathBuf;
use thiserror::Error;

/// Stream diverted by a redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStream {
    Stdout,
    Stderr,
}

/// How a redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>`: the file is created or emptied before anything is written.
    Truncate,
    /// `>>`: the file is created if missing and written after existing content.
    Append,
}

/// A single output redirection, e.g. `2>> errors.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub stream: RedirectStream,
    pub mode: RedirectMode,
    pub target: PathBuf,
}

impl RedirectionSpec {
    /// Recognizes a redirection operator token.
    fn operator(token: &str) -> Option<(RedirectStream, RedirectMode)> {
        match token {
            ">" | "1>" => Some((RedirectStream::Stdout, RedirectMode::Truncate)),
            ">>" | "1>>" => Some((RedirectStream::Stdout, RedirectMode::Append)),
            "2>" => Some((RedirectStream::Stderr, RedirectMode::Truncate)),
            "2>>" => Some((RedirectStream::Stderr, RedirectMode::Append)),
            _ => None,
        }
    }
}

/// Redirections of one stage: at most one per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub stdout: Option<RedirectionSpec>,
    pub stderr: Option<RedirectionSpec>,
}

impl Redirections {
    fn set(&mut self, spec: RedirectionSpec) {
        match spec.stream {
            RedirectStream::Stdout => self.stdout = Some(spec),
            RedirectStream::Stderr => self.stderr = Some(spec),
        }
    }

    /// Iterates over the configured redirections, stdout first.
    pub fn iter(&self) -> impl Iterator<Item = &RedirectionSpec> {
        self.stdout.iter().chain(self.stderr.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
    pub redirections: Redirections,
}

/// A non-empty sequence of stages connected stdout-to-stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<StageCommand>,
}

impl Pipeline {
    pub fn stages(&self) -> &[StageCommand] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<StageCommand> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a pipeline cannot be constructed without a stage.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Errors that can occur while turning tokens into a pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// Nothing to parse.
    #[error("empty command line")]
    EmptyInput,
    /// A pipe with no command on one side (`| cmd`, `cmd |`, `a | | b`).
    #[error("syntax error near unexpected token `|'")]
    EmptySegment,
    /// A redirection operator at the end of a segment.
    #[error("syntax error: missing file name after `{0}'")]
    MissingRedirectTarget(String),
    /// A segment that holds redirections but no program name.
    #[error("syntax error: missing command before redirection")]
    MissingCommand,
}

/// Splits a segment into plain words and redirections.
///
/// Operators are consumed left to right together with the word following
/// them; a later redirection of the same stream replaces an earlier one.
fn extract_redirections(
    segment: Vec<Token>,
) -> Result<(Vec<String>, Redirections), ParsingError> {
    let mut words = Vec::with_capacity(segment.len());
    let mut redirections = Redirections::default();
    let mut tokens = segment.into_iter();

    while let Some(token) = tokens.next() {
        match RedirectionSpec::operator(token.as_str()) {
            Some((stream, mode)) => {
                let target = tokens
                    .next()
                    .ok_or_else(|| ParsingError::MissingRedirectTarget(token.into_string()))?;
                redirections.set(RedirectionSpec {
                    stream,
                    mode,
                    target: PathBuf::from(target.into_string()),
                });
            }
            None => words.push(token.into_string()),
        }
    }

    Ok((words, redirections))
}

fn build_stage(segment: Vec<Token>) -> Result<StageCommand, ParsingError> {
    if segment.is_empty() {
        return Err(ParsingError::EmptySegment);
    }

    let (words, redirections) = extract_redirections(segment)?;
    let mut words = words.into_iter();
    let program = words.next().ok_or(ParsingError::MissingCommand)?;

    Ok(StageCommand {
        program,
        args: words.collect(),
        redirections,
    })
}

/// Builds a [`Pipeline`] from the words of one command line.
///
/// Every word equal to `|` separates two stages. The whole line is rejected
/// if any stage is empty or malformed.
pub fn construct_pipeline(tokens: Vec<Token>) -> Result<Pipeline, ParsingError> {
    if tokens.is_empty() {
        return Err(ParsingError::EmptyInput);
    }

    let mut stages = Vec::new();
    let mut segment = Vec::new();
    for token in tokens {
        if token == "|" {
            stages.push(build_stage(std::mem::take(&mut segment))?);
        } else {
            segment.push(token);
        }
    }
    stages.push(build_stage(segment)?);

    Ok(Pipeline { stages })
}
