//! Tab completion of command names.
//!
//! The decision logic is pure: [`complete`] takes the prefix, the candidate
//! set and the state left by the previous call, and returns what to do along
//! with the next state. [`ShellHelper`] plugs it into rustyline.

use crate::builtin::Builtin;
use crate::resolver;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Helper};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use tracing::debug;

/// Memory of the previous completion request, used to turn a second tab
/// press on an ambiguous prefix into a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionState {
    pub last_prefix: Option<String>,
    pub repeat_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Ring the bell and leave the input alone.
    Bell,
    /// Replace the whole prefix with this text.
    Replace(String),
    /// Show every candidate and leave the input alone.
    List(Vec<String>),
}

/// Built-in names and `PATH` executables starting with `prefix`, sorted and
/// without duplicates.
pub fn candidates(prefix: &str, search_paths: Option<&OsStr>) -> Vec<String> {
    let mut names: BTreeSet<String> = Builtin::ALL
        .into_iter()
        .map(|b| b.name().to_string())
        .collect();
    if let Some(paths) = search_paths {
        names.extend(resolver::executables_in_path(paths));
    }
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect()
}

/// Longest string every candidate starts with, compared character by character.
pub fn longest_common_prefix(candidates: &[String]) -> String {
    let Some((first, rest)) = candidates.split_first() else {
        return String::new();
    };
    let mut len = first.len();
    for other in rest {
        let shared = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, c), _)| i + c.len_utf8());
        len = len.min(shared);
    }
    first[..len].to_string()
}

/// Decide what a completion request for `prefix` does.
///
/// `candidates` must be sorted and deduplicated, as returned by
/// [`candidates`]. Only an ambiguous prefix that cannot be extended keeps any
/// state, so that the next request for the same prefix lists the candidates.
pub fn complete(
    prefix: &str,
    candidates: &[String],
    state: CompletionState,
) -> (Completion, CompletionState) {
    let state = if state.last_prefix.as_deref() == Some(prefix) {
        state
    } else {
        CompletionState::default()
    };

    match candidates {
        [] => (Completion::Bell, CompletionState::default()),
        [only] => (
            Completion::Replace(format!("{only} ")),
            CompletionState::default(),
        ),
        _ => {
            let common = longest_common_prefix(candidates);
            if common.len() > prefix.len() {
                (Completion::Replace(common), CompletionState::default())
            } else if state.repeat_count == 0 {
                let next = CompletionState {
                    last_prefix: Some(prefix.to_string()),
                    repeat_count: 1,
                };
                (Completion::Bell, next)
            } else {
                (
                    Completion::List(candidates.to_vec()),
                    CompletionState::default(),
                )
            }
        }
    }
}

/// Editor settings the helper relies on.
///
/// In list mode rustyline applies a lone candidate and hands every later Tab
/// back to the helper; circular mode would cycle on its own instead.
pub fn editor_config() -> Config {
    Config::builder()
        .completion_type(CompletionType::List)
        .auto_add_history(false)
        .build()
}

/// rustyline helper completing the text before the cursor as a command name.
pub struct ShellHelper {
    state: RefCell<CompletionState>,
    /// The session's `PATH`, the same list commands are resolved against.
    search_paths: Option<OsString>,
}

impl ShellHelper {
    pub fn new(search_paths: Option<OsString>) -> Self {
        Self {
            state: RefCell::default(),
            search_paths,
        }
    }

    /// State left by the last completion request.
    pub fn state(&self) -> CompletionState {
        self.state.borrow().clone()
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let found = candidates(prefix, self.search_paths.as_deref());
        let (completion, next) = complete(prefix, &found, self.state.take());
        debug!(prefix, candidates = found.len(), ?completion, "completion");
        self.state.replace(next);

        // A single candidate is always returned so rustyline applies it
        // without ringing or listing on its own.
        let replacement = match completion {
            Completion::Replace(text) => text,
            Completion::Bell => {
                ring_bell()?;
                prefix.to_string()
            }
            Completion::List(names) => {
                print_listing(&names)?;
                prefix.to_string()
            }
        };
        Ok((
            0,
            vec![Pair {
                display: replacement.clone(),
                replacement,
            }],
        ))
    }
}

fn ring_bell() -> io::Result<()> {
    let mut out = io::stdout();
    out.write_all(b"\x07")?;
    out.flush()
}

// The terminal is in raw mode while editing, hence the explicit carriage returns.
fn print_listing(names: &[String]) -> io::Result<()> {
    let mut out = io::stdout();
    write!(out, "\r\n{}\r\n", names.join("  "))?;
    out.flush()
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_candidates_rings() {
        let (completion, state) = complete("zzz", &[], CompletionState::default());
        assert_eq!(completion, Completion::Bell);
        assert_eq!(state, CompletionState::default());
    }

    #[test]
    fn single_candidate_gets_trailing_space() {
        let (completion, state) = complete("ec", &names(&["echo"]), CompletionState::default());
        assert_eq!(completion, Completion::Replace("echo ".to_string()));
        assert_eq!(state, CompletionState::default());
    }

    #[test]
    fn common_prefix_extends_input() {
        let found = names(&["xyz_bar", "xyz_baz", "xyz_foo_bar"]);
        let (completion, state) = complete("xyz", &found, CompletionState::default());
        assert_eq!(completion, Completion::Replace("xyz_".to_string()));
        assert_eq!(state, CompletionState::default());

        let found = names(&["xyz_bar", "xyz_baz"]);
        let (completion, _) = complete("xyz_", &found, CompletionState::default());
        assert_eq!(completion, Completion::Replace("xyz_ba".to_string()));
    }

    #[test]
    fn second_request_lists() {
        let found = names(&["cat", "cd", "cut"]);
        let (first, state) = complete("c", &found, CompletionState::default());
        assert_eq!(first, Completion::Bell);
        assert_eq!(
            state,
            CompletionState {
                last_prefix: Some("c".to_string()),
                repeat_count: 1
            }
        );

        let (second, state) = complete("c", &found, state);
        assert_eq!(second, Completion::List(found.clone()));
        assert_eq!(state, CompletionState::default());

        // The cycle starts over after a listing.
        let (third, _) = complete("c", &found, state);
        assert_eq!(third, Completion::Bell);
    }

    #[test]
    fn different_prefix_restarts_count() {
        let found = names(&["cat", "cd"]);
        let (_, state) = complete("c", &found, CompletionState::default());
        let stale = CompletionState {
            last_prefix: Some("x".to_string()),
            ..state
        };
        let (completion, _) = complete("c", &found, stale);
        assert_eq!(completion, Completion::Bell);
    }

    #[test]
    fn common_prefix_is_character_based() {
        assert_eq!(longest_common_prefix(&names(&["añb", "añc"])), "añ");
        assert_eq!(longest_common_prefix(&names(&["ab", "a", "abc"])), "a");
        assert_eq!(longest_common_prefix(&names(&["x", "y"])), "");
        assert_eq!(longest_common_prefix(&[]), "");
        assert_eq!(longest_common_prefix(&names(&["only"])), "only");
    }

    #[test]
    #[cfg(unix)]
    fn candidates_merge_builtins_and_path() {
        use crate::test_util::make_file;
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_file(first.path(), "echo", 0o755);
        make_file(first.path(), "ecstatic", 0o755);
        make_file(second.path(), "ecstatic", 0o755);
        make_file(second.path(), "ecru", 0o644);

        let path = std::env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(candidates("ec", Some(&path)), names(&["echo", "ecstatic"]));
        assert_eq!(candidates("p", None), names(&["pwd"]));
    }

    #[test]
    #[cfg(unix)]
    fn double_request_on_empty_prefix_lists_everything() {
        use crate::test_util::make_file;
        let dir = tempfile::tempdir().unwrap();
        make_file(dir.path(), "zeta", 0o755);
        make_file(dir.path(), "alpha", 0o755);

        let found = candidates("", Some(dir.path().as_os_str()));
        let (first, state) = complete("", &found, CompletionState::default());
        assert_eq!(first, Completion::Bell);
        let (second, _) = complete("", &found, state);
        assert_eq!(
            second,
            Completion::List(names(&["alpha", "cd", "echo", "exit", "pwd", "type", "zeta"]))
        );
    }

    fn ask(helper: &ShellHelper, line: &str) -> (usize, Vec<String>) {
        let history = rustyline::history::DefaultHistory::new();
        let ctx = Context::new(&history);
        let (start, pairs) = Completer::complete(helper, line, line.len(), &ctx).unwrap();
        (start, pairs.into_iter().map(|p| p.replacement).collect())
    }

    #[test]
    fn editor_hands_every_tab_to_the_helper() {
        assert_eq!(editor_config().completion_type(), CompletionType::List);
    }

    #[test]
    #[cfg(unix)]
    fn helper_remembers_ambiguous_prefix_between_calls() {
        use crate::test_util::make_file;
        let dir = tempfile::tempdir().unwrap();
        make_file(dir.path(), "xyza", 0o755);
        make_file(dir.path(), "xyzb", 0o755);
        let helper = ShellHelper::new(Some(dir.path().as_os_str().to_owned()));

        assert_eq!(ask(&helper, "xyz"), (0, names(&["xyz"])));
        assert_eq!(
            helper.state(),
            CompletionState {
                last_prefix: Some("xyz".to_string()),
                repeat_count: 1
            }
        );

        // Second press lists and leaves the line as it was.
        assert_eq!(ask(&helper, "xyz"), (0, names(&["xyz"])));
        assert_eq!(helper.state(), CompletionState::default());
    }

    #[test]
    #[cfg(unix)]
    fn helper_completes_from_its_own_search_path() {
        use crate::test_util::make_file;
        let dir = tempfile::tempdir().unwrap();
        make_file(dir.path(), "only_here_tool", 0o755);

        let helper = ShellHelper::new(Some(dir.path().as_os_str().to_owned()));
        assert_eq!(ask(&helper, "only_h"), (0, names(&["only_here_tool "])));
        assert_eq!(helper.state(), CompletionState::default());

        // A completed word followed by another request keeps the text.
        assert_eq!(ask(&helper, "ec"), (0, names(&["echo "])));
        assert_eq!(ask(&helper, "echo "), (0, names(&["echo "])));

        let without_path = ShellHelper::new(None);
        assert_eq!(ask(&without_path, "only_h"), (0, names(&["only_h"])));
    }
}
