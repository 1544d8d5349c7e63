use anyhow::{Context, anyhow, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

static TESTS_ROOT: &str = "golden-tests/tests";
static EXPECTED_STDOUT_FILE: &str = "expected-stdout";
static EXPECTED_REPLAY_LOG_FILE: &str = "expected-replay-log";
/// Where the `args` of every test case ask `ccm` to write its replay log
static REPLAY_LOG_PATH: &str = "replay-log.json";

struct TestCase {
    dir: PathBuf,
    name: String,
    args: String,
    expected_stdout: Option<String>,
    expected_replay_log: Option<String>,
}

impl TestCase {
    fn load(dir: PathBuf) -> anyhow::Result<Self> {
        let args_path = dir.join("args");
        let args = std::fs::read_to_string(&args_path)
            .with_context(|| format!("no `args` file found at `{}`", args_path.display()))?;

        Ok(Self {
            name: dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string()),
            args,
            expected_stdout: read_expectation(&dir, EXPECTED_STDOUT_FILE)?,
            expected_replay_log: read_expectation(&dir, EXPECTED_REPLAY_LOG_FILE)?,
            dir,
        })
    }
}

/// Reads an expected output, if it has been recorded yet
fn read_expectation(dir: &Path, file: &str) -> anyhow::Result<Option<String>> {
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(None);
    }

    std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read `{}`", path.display()))
        .map(Some)
}

/// Runs every case under `golden-tests/tests`, or only those whose name contains the first
/// command line argument
fn main() -> anyhow::Result<()> {
    let filter = std::env::args().nth(1);

    let mut test_cases = Vec::new();
    let test_dirs =
        std::fs::read_dir(TESTS_ROOT).context("golden tests root directory not found")?;
    for entry in test_dirs {
        let path = entry?.path();
        if !path.is_dir() {
            println!("skipping `{}`, not a directory", path.display());
            continue;
        }

        let test_case = TestCase::load(path)?;
        if filter.as_ref().is_none_or(|f| test_case.name.contains(f.as_str())) {
            test_cases.push(test_case);
        }
    }

    if test_cases.is_empty() {
        bail!("no golden tests matched");
    }

    test_cases.sort_by(|a, b| a.name.cmp(&b.name));

    let mut failed = Vec::new();
    for test_case in test_cases {
        let name = test_case.name.clone();
        match run_contact_manager(test_case) {
            Ok(()) => println!("{name}: ✅"),
            Err(TestError::Internal(e)) => {
                println!("{name}: ❌\n{e:?}");
                failed.push(name);
            }
            Err(TestError::Compare(e)) => {
                println!("{name}: ❌");
                if let Some(diff) = e.replay_log_diff {
                    println!("Replay log differs from the recorded one:\n{diff}\n");
                }
                if let Some(diff) = e.stdout_diff {
                    println!("Stdout differs from the recorded one:\n{diff}");
                }
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        bail!("failed golden tests: {}", failed.join(", "));
    }

    Ok(())
}

enum TestError {
    Internal(anyhow::Error),
    Compare(CompareError),
}

struct CompareError {
    stdout_diff: Option<String>,
    replay_log_diff: Option<String>,
}

fn run_contact_manager(test_case: TestCase) -> Result<(), TestError> {
    // A log left behind by a previous case must not pass for this one's
    if Path::new(REPLAY_LOG_PATH).exists() {
        std::fs::remove_file(REPLAY_LOG_PATH)
            .context("failed to remove stale replay log")
            .map_err(TestError::Internal)?;
    }

    let ccm_args = test_case.args.split_whitespace();
    let command = Command::new("cargo")
        .arg("run")
        .arg("--release")
        .arg("--quiet")
        .arg("--bin")
        .arg("ccm")
        .arg("--")
        .args(ccm_args)
        .output()
        .context("failed to launch ccm")
        .map_err(TestError::Internal)?;

    if !command.status.success() {
        return Err(TestError::Internal(anyhow!(
            "ccm exited with {}:\n{}",
            command.status,
            String::from_utf8_lossy(&command.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&command.stdout);
    let replay_log = std::fs::read_to_string(REPLAY_LOG_PATH)
        .with_context(|| format!("failed to read {REPLAY_LOG_PATH}"))
        .map_err(TestError::Internal)?;

    let stdout_diff = compare_or_record(
        &test_case.dir,
        EXPECTED_STDOUT_FILE,
        test_case.expected_stdout.as_deref(),
        &stdout,
    )?;
    let replay_log_diff = compare_or_record(
        &test_case.dir,
        EXPECTED_REPLAY_LOG_FILE,
        test_case.expected_replay_log.as_deref(),
        &replay_log,
    )?;

    if stdout_diff.is_some() || replay_log_diff.is_some() {
        Err(TestError::Compare(CompareError {
            stdout_diff,
            replay_log_diff,
        }))
    } else {
        Ok(())
    }
}

/// Diffs `actual` against the recorded expectation, or records it if there is none yet
fn compare_or_record(
    dir: &Path,
    file: &str,
    expected: Option<&str>,
    actual: &str,
) -> Result<Option<String>, TestError> {
    match expected {
        Some(expected) if expected == actual => Ok(None),
        Some(expected) => Ok(Some(diff::diff_to_string(expected, actual))),
        None => {
            println!("recording `{}` in `{}`", file, dir.display());
            std::fs::write(dir.join(file), actual.as_bytes())
                .with_context(|| format!("failed to record `{file}`"))
                .map_err(TestError::Internal)?;
            Ok(None)
        }
    }
}

mod diff {
    use console::{Style, style};
    use similar::{ChangeTag, TextDiff};
    use std::fmt::{self, Write};

    struct Line(Option<usize>);

    impl fmt::Display for Line {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self.0 {
                None => write!(f, "    "),
                Some(idx) => write!(f, "{:<4}", idx + 1),
            }
        }
    }

    pub fn diff_to_string(old: &str, new: &str) -> String {
        let mut output = String::new();
        let diff = TextDiff::from_lines(old, new);

        for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
            if idx > 0 {
                _ = writeln!(output, "{:-^1$}", "-", 80);
            }
            for op in group {
                for change in diff.iter_inline_changes(op) {
                    let (sign, s) = match change.tag() {
                        ChangeTag::Delete => ("-", Style::new().red()),
                        ChangeTag::Insert => ("+", Style::new().green()),
                        ChangeTag::Equal => (" ", Style::new().dim()),
                    };
                    _ = write!(
                        output,
                        "{}{} |{}",
                        style(Line(change.old_index())).dim(),
                        style(Line(change.new_index())).dim(),
                        s.apply_to(sign).bold(),
                    );
                    for (emphasized, value) in change.iter_strings_lossy() {
                        if emphasized {
                            _ = write!(output, "{}", s.apply_to(value).underlined().on_black());
                        } else {
                            _ = write!(output, "{}", s.apply_to(value));
                        }
                    }
                    if change.missing_newline() {
                        _ = writeln!(output);
                    }
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ccm-golden-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_expectation_is_recorded_then_compared() {
        let dir = scratch_dir("record");
        std::fs::write(dir.join("args"), "plan.txt dry-run").unwrap();

        let case = TestCase::load(dir.clone()).unwrap();
        assert_eq!(case.args, "plan.txt dry-run");
        assert!(case.expected_stdout.is_none());

        let recorded = compare_or_record(&dir, EXPECTED_STDOUT_FILE, None, "a\n").ok().unwrap();
        assert!(recorded.is_none());

        let case = TestCase::load(dir.clone()).unwrap();
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));

        let same = compare_or_record(&dir, EXPECTED_STDOUT_FILE, Some("a\n"), "a\n").ok().unwrap();
        assert!(same.is_none());
        let changed = compare_or_record(&dir, EXPECTED_STDOUT_FILE, Some("a\n"), "b\n").ok().unwrap();
        assert!(changed.is_some());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_case_without_args_fails_to_load() {
        let dir = scratch_dir("no-args");
        assert!(TestCase::load(dir.clone()).is_err());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
