//! A tiny interactive POSIX-like shell.
//!
//! A line typed at the prompt is split into tokens ([`lexer`]), grouped into a
//! pipeline of stages with their redirections ([`parser`]), each stage is
//! resolved to a built-in or an executable on `PATH` ([`resolver`]) and the
//! whole pipeline is run with its streams wired together ([`executor`]).
//! [`completion`] implements tab completion of command names.
//!
//! The main entry point is [`Interpreter`], which owns the session state and
//! drives the read-eval loop.

mod builtin;
pub mod command;
pub mod completion;
pub mod env;
pub mod executor;
mod external;
mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod resolver;

pub use builtin::Builtin;
pub use interpreter::Interpreter;
