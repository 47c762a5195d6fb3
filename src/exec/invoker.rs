// src/exec/invoker.rs

//! Runs one analysis binary over one batch of images.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Number of trailing stderr characters kept in a failure.
const STDERR_TAIL: usize = 512;

/// Everything needed to run a binary over one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Command name, for logging.
    pub command: String,
    /// Absolute path of the binary.
    pub program: PathBuf,
    /// Flag arguments placed before the image paths.
    pub flags: Vec<String>,
    pub images: Vec<PathBuf>,
    /// Directory the binary runs in (its install directory).
    pub working_dir: PathBuf,
}

/// Why a batch invocation failed. Every variant triggers the halving retry.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("process output is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("refusing to invoke with an empty batch")]
    EmptyBatch,
}

/// Seam between the batch scheduler and process execution.
///
/// Production code uses [`ProcessInvoker`]; tests provide scripted
/// implementations that never spawn processes.
pub trait BatchInvoker: Send + Sync {
    /// Run the request and return the raw stdout lines.
    fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, InvocationError>> + Send + '_>>;
}

/// Invoker that spawns the binary with `tokio::process::Command`.
///
/// The working directory is passed to the spawn call; the current directory
/// of this process is never changed, so concurrent batches are safe.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

impl BatchInvoker for ProcessInvoker {
    fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, InvocationError>> + Send + '_>> {
        Box::pin(run_process(request))
    }
}

async fn run_process(request: InvocationRequest) -> Result<Vec<String>, InvocationError> {
    if request.images.is_empty() {
        return Err(InvocationError::EmptyBatch);
    }

    debug!(
        command = %request.command,
        program = %request.program.display(),
        images = request.images.len(),
        "spawning analysis binary"
    );

    let output = Command::new(&request.program)
        .args(&request.flags)
        .args(&request.images)
        .current_dir(&request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| InvocationError::Spawn {
            program: request.program.display().to_string(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(command = %request.command, "stderr: {}", line);
    }

    if !output.status.success() {
        info!(
            command = %request.command,
            exit_code = ?output.status.code(),
            images = request.images.len(),
            "analysis binary failed"
        );
        return Err(InvocationError::NonZeroExit {
            code: output.status.code(),
            stderr: tail(&stderr, STDERR_TAIL),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    Ok(split_lines(&stdout))
}

/// Split raw stdout into lines, dropping `\r` and surrounding blank space.
pub fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .trim()
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

fn tail(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_handles_crlf() {
        assert_eq!(
            split_lines("a: x Result: 1\r\nb: y Result: 2\r\n"),
            vec!["a: x Result: 1".to_string(), "b: y Result: 2".to_string()]
        );
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("  hello world ", 5), "world");
        assert_eq!(tail("short", 10), "short");
    }

    #[tokio::test]
    async fn empty_batch_is_refused() {
        let req = InvocationRequest {
            command: "m".to_string(),
            program: PathBuf::from("/bin/true"),
            flags: vec![],
            images: vec![],
            working_dir: PathBuf::from("/"),
        };
        let err = ProcessInvoker::new().invoke(req).await.unwrap_err();
        assert!(matches!(err, InvocationError::EmptyBatch));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let req = InvocationRequest {
            command: "m".to_string(),
            program: PathBuf::from("/definitely/not/here"),
            flags: vec![],
            images: vec![PathBuf::from("a.jpg")],
            working_dir: PathBuf::from("/"),
        };
        let err = ProcessInvoker::new().invoke(req).await.unwrap_err();
        assert!(matches!(err, InvocationError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn sh_request(dir: &std::path::Path, script: &str, flags: &[&str], images: &[&str]) -> InvocationRequest {
        let script_path = dir.join("analysis.sh");
        std::fs::write(&script_path, script).unwrap();
        let mut all_flags = vec![script_path.display().to_string()];
        all_flags.extend(flags.iter().map(|f| f.to_string()));
        InvocationRequest {
            command: "leaf_count".to_string(),
            program: PathBuf::from("/bin/sh"),
            flags: all_flags,
            images: images.iter().map(PathBuf::from).collect(),
            working_dir: dir.to_path_buf(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_the_working_dir_with_flags_before_images() {
        let dir = tempfile::tempdir().unwrap();
        let script = "echo \"cwd: $(pwd -P)\"\nfor arg in \"$@\"; do echo \"arg: $arg\"; done\n";
        let req = sh_request(dir.path(), script, &["--white-background"], &["a.jpg", "b.jpg"]);

        let lines = ProcessInvoker::new().invoke(req).await.unwrap();

        let cwd = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            lines,
            vec![
                format!("cwd: {}", cwd.display()),
                "arg: --white-background".to_string(),
                "arg: a.jpg".to_string(),
                "arg: b.jpg".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let req = sh_request(dir.path(), "echo oops >&2\nexit 3\n", &[], &["a.jpg"]);

        let err = ProcessInvoker::new().invoke(req).await.unwrap_err();
        match err {
            InvocationError::NonZeroExit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_stdout_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let req = sh_request(dir.path(), "printf '\\377\\376\\n'\n", &[], &["a.jpg"]);

        let err = ProcessInvoker::new().invoke(req).await.unwrap_err();
        assert!(matches!(err, InvocationError::Decode(_)));
    }
}
