use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands against a temporary database
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// A `questr` command isolated from the user's config and database
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("questr").expect("Failed to find questr binary");

        cmd.current_dir(self.temp_dir.path());
        cmd.env("QUESTR_DATABASE_PATH", &self.db_path);
        cmd.env("QUESTR_TIMEZONE", "UTC");
        cmd.env_remove("RUST_LOG");

        cmd
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs a command and returns its stdout with color codes removed
    pub fn stdout_of(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        strip_ansi(&String::from_utf8_lossy(&output))
    }

    /// Adds a quest and returns the short id printed for it
    pub fn add_quest(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let out = self.stdout_of(&full);
        extract_short_id(&out).unwrap_or_else(|| panic!("no short id in output: {out}"))
    }
}

pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The `[abcdef12]` token printed after add/copy
pub fn extract_short_id(output: &str) -> Option<String> {
    let start = output.rfind('[')?;
    let end = output[start..].find(']')? + start;
    let id = &output[start + 1..end];
    (id.len() == 8 && id.chars().all(|c| c.is_ascii_hexdigit())).then(|| id.to_string())
}

pub mod assertions {
    use super::*;

    pub fn has_task_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Quest"))
            .and(predicate::str::contains("Status"))
    }

    pub fn quest_added() -> impl Predicate<str> {
        predicate::str::contains("Added quest").or(predicate::str::contains("Added recurring quest"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
