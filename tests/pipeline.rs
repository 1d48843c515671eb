use std::fs::{self, File};
use std::path::PathBuf;
use tempfile::TempDir;
use tinysh::Interpreter;
use tinysh::command::Terminal;
use tinysh::env::Environment;

/// A session rooted in a scratch directory, with terminal output in files.
struct Session {
    dir: TempDir,
    sh: Interpreter,
}

impl Session {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let terminal = Terminal::capture(
            File::create(dir.path().join(".out")).unwrap(),
            File::create(dir.path().join(".err")).unwrap(),
        );
        let env = Environment::with_vars(std::env::vars().collect(), dir.path().to_path_buf());
        let sh = Interpreter::new(env, terminal);
        Session { dir, sh }
    }

    fn run(&mut self, line: &str) -> i32 {
        self.sh.execute_line(line).unwrap()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    fn terminal_out(&self) -> String {
        self.read(".out")
    }

    fn terminal_err(&self) -> String {
        self.read(".err")
    }
}

#[test]
fn append_creates_then_appends() {
    let mut s = Session::new();
    assert_eq!(s.run("echo a >> f.txt"), 0);
    assert_eq!(s.run("echo a >> f.txt"), 0);
    assert_eq!(s.read("f.txt"), "a\na\n");
    assert_eq!(s.terminal_out(), "");
}

#[test]
fn truncate_discards_previous_content() {
    let mut s = Session::new();
    fs::write(s.path("out.txt"), "previous content\nthat should vanish\n").unwrap();
    assert_eq!(s.run("echo 'fresh' 1> out.txt"), 0);
    assert_eq!(s.read("out.txt"), "fresh\n");
}

#[cfg(unix)]
#[test]
fn external_output_redirected() {
    let mut s = Session::new();
    fs::write(s.path("listing.txt"), "stale\n").unwrap();
    fs::write(s.path("a"), "").unwrap();
    assert_eq!(s.run("/bin/sh -c 'echo listed' > listing.txt"), 0);
    assert_eq!(s.read("listing.txt"), "listed\n");
}

#[test]
fn stderr_redirect_leaves_stdout_alone() {
    let mut s = Session::new();
    assert_eq!(s.run("echo foo 2> err.txt"), 0);
    assert_eq!(s.terminal_out(), "foo\n");
    assert_eq!(s.read("err.txt"), "");
}

#[test]
fn quoting_is_preserved_through_execution() {
    let mut s = Session::new();
    s.run(r#"echo "hello   world" 'it''s' a\ b"#);
    assert_eq!(s.terminal_out(), "hello   world its a b\n");
}

#[cfg(unix)]
#[test]
fn pipeline_into_file() {
    let mut s = Session::new();
    let code = s.run("echo hello | /bin/sh -c 'read x; echo \"$x $x\"' > out.txt");
    assert_eq!(code, 0);
    assert_eq!(s.read("out.txt"), "hello hello\n");
    assert_eq!(s.terminal_out(), "");
}

#[cfg(unix)]
#[test]
fn large_builtin_output_through_pipe() {
    let mut s = Session::new();
    let word = "x".repeat(200_000);
    let code = s.run(&format!("echo {word} | /bin/sh -c 'wc -c' > count.txt"));
    assert_eq!(code, 0);
    assert_eq!(s.read("count.txt").trim(), "200001");
}

#[test]
fn missing_command_is_reported() {
    let mut s = Session::new();
    assert_eq!(s.run("nosuch_cmd_tinysh"), 127);
    assert_eq!(s.terminal_out(), "nosuch_cmd_tinysh: command not found\n");

    assert_eq!(s.run("nosuch_cmd_tinysh 2> e.txt"), 127);
    assert_eq!(s.read("e.txt"), "nosuch_cmd_tinysh: command not found\n");
}

#[test]
fn missing_stage_aborts_whole_pipeline() {
    let mut s = Session::new();
    let code = s.run("echo data | nosuch_cmd_tinysh | echo after > after.txt");
    assert_eq!(code, 127);
    assert_eq!(s.read("after.txt"), "");
    assert_eq!(s.terminal_out(), "nosuch_cmd_tinysh: command not found\n");
}

#[test]
fn type_reports_builtins_first() {
    let mut s = Session::new();
    s.run("type echo cd nosuch_cmd_tinysh");
    assert_eq!(
        s.terminal_out(),
        "echo is a shell builtin\ncd is a shell builtin\nnosuch_cmd_tinysh: not found\n"
    );
}

#[test]
fn cd_and_pwd_share_session_state() {
    let mut s = Session::new();
    fs::create_dir(s.path("inner")).unwrap();
    s.run("cd inner");
    s.run("pwd > here.txt");
    let expected = s.path("inner").canonicalize().unwrap();
    assert_eq!(s.sh.env().current_dir, expected);
    assert_eq!(
        fs::read_to_string(expected.join("here.txt")).unwrap(),
        format!("{}\n", expected.display())
    );
    // Restore for other tests in this binary that rely on the process directory.
    std::env::set_current_dir(std::env::temp_dir()).unwrap();
}

#[test]
fn exit_and_parse_errors() {
    let mut s = Session::new();
    assert_eq!(s.run("| echo"), 2);
    assert!(s.terminal_err().starts_with("tinysh: "));
    assert!(!s.sh.should_exit());

    assert_eq!(s.run("exit"), 0);
    assert!(s.sh.should_exit());
}
