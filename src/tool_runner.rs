//! Execution of the external tools used in each SV validation stage
//!
//! Every stage is described by a [ToolInvocation] and run through the [ToolRunner] trait, so that
//! timeout, retry and failure reporting are handled uniformly for all stages.
//!

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Stages of the SV validation pipeline
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Write, compress and index the single-SV VCF
    PrepareVariant,
    ConstructGraph,
    ExportGraph,
    ExtractReads,
    ConvertReads,
    AlignReads,
    PackCoverage,
    CallGenotype,
    /// Parse the genotype call output
    ExtractScore,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label: &'static str = self.into();
        write!(f, "{label}")
    }
}

#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub msg: String,
}

impl StageError {
    pub fn new(stage: Stage, msg: impl Into<String>) -> Self {
        Self {
            stage,
            msg: msg.into(),
        }
    }
}

impl std::error::Error for StageError {}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stage '{}' failed: {}", self.stage, self.msg)
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// External executables and their shared thread count setting
#[derive(Clone, Debug)]
pub struct ExternalTools {
    pub vg: String,
    pub samtools: String,
    pub minigraph: String,

    /// Thread count passed to each multi-threaded tool
    pub thread_count: usize,
}

/// A single external tool run
///
pub struct ToolInvocation {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<String>,

    /// If defined, stdout is redirected to this file, otherwise it is appended to the stage log
    pub stdout_filename: Option<Utf8PathBuf>,
}

impl ToolInvocation {
    pub fn new(stage: Stage, program: &str, args: &[&str]) -> Self {
        Self {
            stage,
            program: program.to_string(),
            args: args.iter().map(|x| x.to_string()).collect(),
            stdout_filename: None,
        }
    }

    pub fn stdout_to(mut self, filename: &Utf8Path) -> Self {
        self.stdout_filename = Some(filename.to_path_buf());
        self
    }

    pub fn cmdline(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(|x| x.as_str()))
            .join(" ")
    }
}

/// Run external tools for the SV validation stages
///
/// Implementations must be usable from multiple worker threads at once.
///
pub trait ToolRunner: Sync {
    /// Run the invocation to completion, appending all stderr output to `log_filename`
    ///
    fn run(&self, invocation: &ToolInvocation, log_filename: &Utf8Path) -> StageResult<()>;
}

const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs each tool invocation as a blocking child process
///
pub struct ProcessRunner {
    /// Kill the stage and report failure if it runs longer than this
    timeout: Option<Duration>,

    /// Number of times a failed stage is rerun before reporting failure
    max_retries: usize,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>, max_retries: usize) -> Self {
        Self {
            timeout,
            max_retries,
        }
    }

    fn run_once(&self, invocation: &ToolInvocation, log_filename: &Utf8Path) -> StageResult<()> {
        let stage = invocation.stage;
        let io_error = |msg: &str, e: std::io::Error| StageError::new(stage, format!("{msg}: {e}"));

        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_filename)
            .map_err(|e| io_error(&format!("Can't open stage log file '{log_filename}'"), e))?;
        writeln!(log_file, "## {stage}: {}", invocation.cmdline())
            .map_err(|e| io_error("Can't write to stage log", e))?;

        let stdout = match &invocation.stdout_filename {
            Some(filename) => {
                let f = File::create(filename)
                    .map_err(|e| io_error(&format!("Can't create output file '{filename}'"), e))?;
                Stdio::from(f)
            }
            None => Stdio::from(
                log_file
                    .try_clone()
                    .map_err(|e| io_error("Can't redirect stdout to stage log", e))?,
            ),
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|e| io_error(&format!("Can't start '{}'", invocation.program), e))?;

        match wait_with_timeout(&mut child, self.timeout)
            .map_err(|e| io_error(&format!("Failed waiting on '{}'", invocation.program), e))?
        {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(StageError::new(
                stage,
                format!("'{}' exited with {status}", invocation.cmdline()),
            )),
            None => Err(StageError::new(
                stage,
                format!(
                    "'{}' exceeded the stage timeout of {} seconds",
                    invocation.cmdline(),
                    self.timeout.unwrap_or_default().as_secs()
                ),
            )),
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation, log_filename: &Utf8Path) -> StageResult<()> {
        debug!("Running {}: {}", invocation.stage, invocation.cmdline());
        let mut attempt = 0;
        loop {
            match self.run_once(invocation, log_filename) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!("{e}. Retrying (attempt {attempt} of {})", self.max_retries);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wait for child to exit, killing it once the timeout is reached
///
/// Returns None if the child was killed
///
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let timeout = match timeout {
        Some(x) => x,
        None => return child.wait().map(Some),
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            // The child may exit between the last poll and the kill, so kill errors are ignored
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(TIMEOUT_POLL_INTERVAL);
    }
}

/// Get the last `max_lines` lines of a stage log file, for error reporting
///
pub fn get_log_tail(log_filename: &Utf8Path, max_lines: usize) -> Vec<String> {
    let file = match File::open(log_filename) {
        Ok(x) => x,
        Err(_) => return Vec::new(),
    };
    let lines = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .collect::<Vec<_>>();
    let skip = lines.len().saturating_sub(max_lines);
    lines.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_log_filename(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8Path::from_path(dir.path()).unwrap().join("stage.log")
    }

    #[test]
    fn test_stage_label() {
        assert_eq!(Stage::ConstructGraph.to_string(), "construct_graph");
        assert_eq!(Stage::CallGenotype.to_string(), "call_genotype");
    }

    #[test]
    fn test_cmdline() {
        let x = ToolInvocation::new(Stage::ExportGraph, "vg", &["convert", "-f", "a.vg"]);
        assert_eq!(x.cmdline(), "vg convert -f a.vg");
    }

    #[test]
    fn test_process_runner_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let log_filename = get_log_filename(&dir);
        let out_filename = log_filename.with_extension("txt");

        let runner = ProcessRunner::new(None, 0);
        let x = ToolInvocation::new(Stage::ExtractReads, "sh", &["-c", "echo hello; echo oops >&2"])
            .stdout_to(&out_filename);
        runner.run(&x, &log_filename).unwrap();

        assert_eq!(std::fs::read_to_string(&out_filename).unwrap(), "hello\n");
        let log_tail = get_log_tail(&log_filename, 1);
        assert_eq!(log_tail, vec!["oops".to_string()]);
    }

    #[test]
    fn test_process_runner_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_filename = get_log_filename(&dir);

        let runner = ProcessRunner::new(None, 1);
        let x = ToolInvocation::new(Stage::PackCoverage, "sh", &["-c", "echo attempt >&2; exit 3"]);
        let err = runner.run(&x, &log_filename).unwrap_err();
        assert_eq!(err.stage, Stage::PackCoverage);

        // One retry means the log holds two attempts, each with a command header
        let log_tail = get_log_tail(&log_filename, 100);
        assert_eq!(log_tail.iter().filter(|x| *x == "attempt").count(), 2);
    }

    #[test]
    fn test_process_runner_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let log_filename = get_log_filename(&dir);

        let runner = ProcessRunner::new(None, 0);
        let x = ToolInvocation::new(Stage::AlignReads, "svvalidate-no-such-program", &[]);
        let err = runner.run(&x, &log_filename).unwrap_err();
        assert_eq!(err.stage, Stage::AlignReads);
    }

    #[test]
    fn test_process_runner_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let log_filename = get_log_filename(&dir);

        let runner = ProcessRunner::new(Some(Duration::from_millis(200)), 0);
        let x = ToolInvocation::new(Stage::CallGenotype, "sleep", &["10"]);
        let start = Instant::now();
        let err = runner.run(&x, &log_filename).unwrap_err();
        assert_eq!(err.stage, Stage::CallGenotype);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
