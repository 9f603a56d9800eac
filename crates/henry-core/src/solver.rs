//! External field solver invocation
//!
//! Every run gets its own temporary directory as working directory; the
//! circuit is written there as `input.inp` and the impedance matrix, if the
//! solver produced one, is read back from `Zc.mat` before the directory is
//! removed.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{RESULT_MATRIX_FILE, SOLVER_EXECUTABLE, SOLVER_INPUT_FILE, SOLVER_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::process::wait_with_timeout;

/// Where the solver lives and how long it may run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Path or name of the solver executable
    pub executable: PathBuf,
    /// Maximum wall-clock time in seconds
    pub timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(SOLVER_EXECUTABLE),
            timeout_secs: SOLVER_TIMEOUT_SECS,
        }
    }
}

/// Optional solver switches, one flag each
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// `-s`: solution technique
    pub solver: Option<String>,
    /// `-m`: matrix-vector product method
    pub matvec: Option<String>,
    /// `-p`: preconditioner
    pub precond: Option<String>,
    /// `-o`: multipole expansion order
    pub order: Option<u32>,
    /// `-t`: iterative solver tolerance
    pub tol: Option<f64>,
    /// `-c`: maximum iterations
    pub maxiters: Option<u32>,
}

impl SolverOptions {
    /// Command-line flags; unset, empty and zero values are left out
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |flag: &str, value: Option<String>| {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value);
            }
        };

        let text = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        push("-s", text(&self.solver));
        push("-m", text(&self.matvec));
        push("-p", text(&self.precond));
        push("-o", self.order.filter(|&o| o != 0).map(|o| o.to_string()));
        push("-t", self.tol.filter(|&t| t != 0.0).map(|t| t.to_string()));
        push("-c", self.maxiters.filter(|&c| c != 0).map(|c| c.to_string()));
        args
    }
}

/// Everything the solver left behind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when terminated by a signal
    pub return_code: Option<i32>,
    /// Contents of the result matrix file, empty when absent
    pub zc_mat: String,
}

impl SolverOutput {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// Treat a nonzero exit as an error
    pub fn check(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::SolverFailure {
                code: self.return_code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Run the solver on one circuit description
///
/// A nonzero exit is reported in [`SolverOutput::return_code`], not as an
/// error; only spawn failures and timeouts are errors.
pub fn run_solver(inp: &str, config: &SolverConfig, options: &SolverOptions) -> Result<SolverOutput> {
    let workdir = tempfile::Builder::new().prefix("henry-solve-").tempdir()?;
    let inp_path = workdir.path().join(SOLVER_INPUT_FILE);
    std::fs::write(&inp_path, inp)?;

    let executable = resolve_executable(&config.executable)?;
    let args = options.to_args();
    tracing::info!("Running {} {}", executable.display(), args.join(" "));

    let child = Command::new(&executable)
        .args(&args)
        .arg(&inp_path)
        .current_dir(workdir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::SolverFailure {
            code: None,
            stdout: String::new(),
            stderr: format!("failed to start {}: {}", executable.display(), e),
        })?;

    let output = wait_with_timeout(child, Duration::from_secs(config.timeout_secs), "solver")?;

    let zc_path = workdir.path().join(RESULT_MATRIX_FILE);
    let zc_mat = if zc_path.exists() {
        std::fs::read_to_string(&zc_path)?
    } else {
        String::new()
    };

    let return_code = output.status.code();
    if return_code != Some(0) {
        tracing::warn!("Solver exited with {:?}", return_code);
    }

    Ok(SolverOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        return_code,
        zc_mat,
    })
}

/// Relative paths with a directory part are taken from the caller's working
/// directory, not the solver's; bare names go through `PATH`
fn resolve_executable(executable: &Path) -> Result<PathBuf> {
    if executable.is_relative() && executable.components().count() > 1 {
        Ok(std::env::current_dir()?.join(executable))
    } else {
        Ok(executable.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_skip_unset_and_falsy() {
        let options = SolverOptions {
            solver: Some("iterative".into()),
            matvec: Some(String::new()),
            precond: None,
            order: Some(0),
            tol: Some(0.01),
            maxiters: Some(200),
        };
        assert_eq!(options.to_args(), ["-s", "iterative", "-t", "0.01", "-c", "200"]);
        assert!(SolverOptions::default().to_args().is_empty());
    }

    #[test]
    fn test_check_nonzero() {
        let output = SolverOutput {
            stderr: "bad input".into(),
            return_code: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            output.check(),
            Err(Error::SolverFailure { code: Some(2), .. })
        ));
    }

    #[test]
    fn test_executable_resolution() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            resolve_executable(Path::new("bin/fasthenry")).unwrap(),
            cwd.join("bin/fasthenry")
        );
        assert_eq!(
            resolve_executable(Path::new("fasthenry")).unwrap(),
            PathBuf::from("fasthenry")
        );
        assert_eq!(
            resolve_executable(Path::new("/opt/fasthenry")).unwrap(),
            PathBuf::from("/opt/fasthenry")
        );
    }

    #[test]
    fn test_missing_executable_is_solver_failure() {
        let config = SolverConfig {
            executable: PathBuf::from("/nonexistent/fasthenry"),
            timeout_secs: 5,
        };
        let err = run_solver("* empty\n.end\n", &config, &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SolverFailure { code: None, .. }));
    }

    #[cfg(unix)]
    mod fake {
        use std::os::unix::fs::PermissionsExt;

        use super::*;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-solver");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_reads_result_matrix_from_workdir() {
            let dir = tempfile::tempdir().unwrap();
            let config = SolverConfig {
                executable: script(
                    dir.path(),
                    r#"for last; do :; done
cat "$last"
echo "Row 1: a to b" > Zc.mat
echo "$1 $2" >&2"#,
                ),
                timeout_secs: 10,
            };
            let options = SolverOptions {
                order: Some(2),
                ..Default::default()
            };
            let output = run_solver(".units mm\n.end\n", &config, &options).unwrap();

            assert!(output.success());
            assert_eq!(output.stdout, ".units mm\n.end\n");
            assert_eq!(output.stderr, "-o 2\n");
            assert_eq!(output.zc_mat, "Row 1: a to b\n");
        }

        #[test]
        fn test_nonzero_exit_is_not_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let config = SolverConfig {
                executable: script(dir.path(), "echo oops >&2; exit 4"),
                timeout_secs: 10,
            };
            let output = run_solver("", &config, &SolverOptions::default()).unwrap();
            assert_eq!(output.return_code, Some(4));
            assert_eq!(output.stderr, "oops\n");
            assert!(output.zc_mat.is_empty());
        }

        #[test]
        fn test_relative_executable_outside_workdir() {
            let dir = tempfile::tempdir_in(".").unwrap();
            script(dir.path(), "echo ran");
            let relative = Path::new(".").join(dir.path().file_name().unwrap()).join("fake-solver");
            let config = SolverConfig {
                executable: relative,
                timeout_secs: 10,
            };
            let output = run_solver("", &config, &SolverOptions::default()).unwrap();
            assert_eq!(output.return_code, Some(0));
            assert_eq!(output.stdout, "ran\n");
        }

        #[test]
        fn test_timeout_is_distinct() {
            let dir = tempfile::tempdir().unwrap();
            let config = SolverConfig {
                executable: script(dir.path(), "exec sleep 30"),
                timeout_secs: 1,
            };
            let err = run_solver("", &config, &SolverOptions::default()).unwrap_err();
            assert!(matches!(err, Error::Timeout { secs: 1, .. }));
        }
    }
}
