//! Lexical analysis (tokenization) of a single command line.
//!
//! Quoting is resolved here: the tokens handed to the parser are plain words
//! with every quote and escaping backslash already removed.

use std::fmt;
use tracing::debug;

/// A single shell word with quoting already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Token(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scanning mode of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteState {
    Unquoted,
    InSingleQuote,
    InDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: QuoteState,
    buffer: String,
    tokens: Vec<Token>,
}

impl LexingFSM {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: QuoteState::Unquoted,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    /// Runs the machine over the whole input and returns the produced words.
    ///
    /// An unterminated quote is not an error: the open quote simply extends to
    /// the end of the line.
    fn make_tokens(mut self) -> Vec<Token> {
        while let Some(ch) = self.read_char() {
            match self.state {
                QuoteState::Unquoted => self.handle_unquoted(ch),
                QuoteState::InSingleQuote => self.handle_single_quote(ch),
                QuoteState::InDoubleQuote => self.handle_double_quote(ch),
            }
        }

        if self.state != QuoteState::Unquoted {
            debug!(state = ?self.state, "line ended inside a quote");
        }

        self.flush();
        self.tokens
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            ' ' | '\t' => self.flush(),
            '\'' => self.state = QuoteState::InSingleQuote,
            '"' => self.state = QuoteState::InDoubleQuote,
            '\\' => {
                // A trailing backslash escapes nothing.
                if let Some(next) = self.read_char() {
                    self.buffer.push(next);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = QuoteState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = QuoteState::Unquoted,
            '\\' => match self.peek_char() {
                Some(next @ ('\\' | '$' | '"' | '\n')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(Token(std::mem::take(&mut self.buffer)));
        }
    }
}

/// Splits a raw input line into shell words.
///
/// Follows POSIX-like rules for single quotes, double quotes and backslash
/// escapes. Whitespace outside quotes separates words and never produces an
/// empty word.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    LexingFSM::new(line).make_tokens()
}
