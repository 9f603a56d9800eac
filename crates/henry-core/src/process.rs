//! Bounded waiting on child processes

use std::io::Read;
use std::process::{Child, ExitStatus};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::constants::PROCESS_POLL_MILLIS;
use crate::error::{Error, Result};

/// Captured output of a finished child
#[derive(Debug)]
pub(crate) struct ChildOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Wait for `child`, killing it once `timeout` has elapsed.
///
/// Both pipes are drained on background threads so a chatty child cannot
/// block on a full pipe while we poll.
pub(crate) fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    what: &str,
) -> Result<ChildOutput> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let poll_interval = Duration::from_millis(PROCESS_POLL_MILLIS);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("{} timed out after {:?}, killed", what, timeout);
                    return Err(Error::Timeout {
                        what: what.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                thread::sleep(poll_interval);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(Error::Io(format!("waiting for {}: {}", what, e)));
            }
        }
    };

    Ok(ChildOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
