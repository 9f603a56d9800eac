//! Out-of-process geometry import
//!
//! Some CAD kernels install process-wide state, so each import runs in a
//! short-lived child: `<program> worker <PATH> <BACKEND> --tolerance <T>`.
//! The child prints either an [`ImportResult`] or an [`ErrorPayload`] as JSON
//! on stdout, diagnostics on stderr, and exits non-zero on failure.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::constants::IMPORT_TIMEOUT_SECS;
use crate::error::{Error, ErrorPayload, Result};
use crate::model::{ImportResult, ReductionOptions};
use crate::pipeline::{import_geometry, select_kernel};
use crate::process::wait_with_timeout;

/// Subcommand the child is started with
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Parent side of the worker protocol
#[derive(Debug, Clone)]
pub struct ImportWorker {
    program: PathBuf,
    timeout: Duration,
}

impl ImportWorker {
    /// Worker running `program`, which must understand the `worker` subcommand
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(IMPORT_TIMEOUT_SECS),
        }
    }

    /// Worker re-running the current executable
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Import `data` in a child process
    pub fn run(
        &self,
        data: &[u8],
        backend: Option<&str>,
        options: &ReductionOptions,
    ) -> Result<ImportResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput("empty geometry file".into()));
        }
        // Resolve here so the child never has to guess
        let backend = select_kernel(backend)?.name().to_string();

        // Removed on drop, whichever way we leave
        let mut input = tempfile::Builder::new()
            .prefix("henry-upload-")
            .suffix(".step")
            .tempfile()?;
        input.write_all(data)?;
        input.flush()?;

        tracing::info!(
            "Spawning import worker ({} backend, {} byte(s))",
            backend,
            data.len()
        );

        let child = Command::new(&self.program)
            .arg(WORKER_SUBCOMMAND)
            .arg(input.path())
            .arg(&backend)
            .arg("--tolerance")
            .arg(options.merge_tolerance.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::ImportFailure(format!(
                    "failed to start worker {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let output = wait_with_timeout(child, self.timeout, "geometry import")?;
        decode_reply(output.status.success(), &output.stdout, &output.stderr)
    }
}

/// Convenience wrapper re-running the current executable
pub fn run_import_worker(
    data: &[u8],
    backend: Option<&str>,
    options: &ReductionOptions,
) -> Result<ImportResult> {
    ImportWorker::current_exe()?.run(data, backend, options)
}

/// Child side: import one file
pub fn import_file(path: &Path, backend: &str, options: &ReductionOptions) -> Result<ImportResult> {
    let data = std::fs::read(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    import_geometry(&data, Some(backend), options)
}

/// Turn a finished child's output into a result
fn decode_reply(success: bool, stdout: &str, stderr: &str) -> Result<ImportResult> {
    let body = stdout.trim();
    if success {
        if let Ok(result) = serde_json::from_str::<ImportResult>(body) {
            return Ok(result);
        }
    }
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        return Err(payload.into());
    }

    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("import worker produced no result");
    Err(Error::ImportFailure(last_line.to_string()))
}
