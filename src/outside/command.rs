use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, trace};

pub const YT_DLP: &str = "yt-dlp";
pub const YT_DL: &str = "youtube-dl";
pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const FFXXX_DEFAULT_ARGS: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDOUT = 0b01;
        const STDERR = 0b10;
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("`{0}` not found on PATH")]
    Missing(String),

    #[error("`{program}` did not finish within {timeout:?} and was killed")]
    TimedOut { program: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Run a command under a hard deadline, returning its raw output handle.
///
/// IO handles are captured only when the caller asked for them.
/// The child is killed if it does not exit before the deadline.
///
/// The function returns an error only if the command could not be executed
/// or timed out. A non-0 status code does not trigger an error.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
    timeout: Duration,
) -> CommandResult<Output> {
    let get_io = |captured| {
        if captured {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(Stdio::null())
        .stdout(get_io(capture.contains(Capture::STDOUT)))
        .stderr(get_io(capture.contains(Capture::STDERR)));

    debug!("Executing command: {cmd:?}");
    let mut child = cmd.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            CommandError::Missing(program.to_owned())
        } else {
            CommandError::Io(err)
        }
    })?;

    // Drain the pipes from their own threads so a chatty child cannot
    // deadlock against a full pipe while we wait on it.
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, program, timeout)?;

    let stdout = join_reader(stdout);
    let stderr = join_reader(stderr);

    debug!("status: {status}");
    trace!("stdout: {:?}", String::from_utf8_lossy(&stdout));
    trace!("stderr: {:?}", String::from_utf8_lossy(&stderr));

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Check that the binary is reachable by running its `--version`.
pub fn binary_available(program: &str) -> bool {
    const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

    run_command(
        program,
        |cmd| cmd.arg("--version"),
        Capture::empty(),
        VERSION_TIMEOUT,
    )
    .map(|out| out.status.success())
    .unwrap_or(false)
}

fn spawn_reader<R: Read + Send + 'static>(io: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    io.map(|mut io| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            // A broken pipe only truncates the capture
            let _ = io.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.map_or_else(Vec::new, |handle| handle.join().unwrap_or_default())
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> CommandResult<ExitStatus> {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Err(CommandError::TimedOut {
                program: program.to_owned(),
                timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_reported() {
        let err = run_command(
            "sigclip-no-such-binary",
            |cmd| cmd.arg("-h"),
            Capture::empty(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Missing(_)));
        assert!(!binary_available("sigclip-no-such-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_requested_streams() {
        let out = run_command(
            "sh",
            |cmd| cmd.args(["-c", "echo out; echo err >&2"]),
            Capture::STDOUT,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout), "out\n");
        assert!(out.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn hung_child_is_killed_at_the_deadline() {
        let err = run_command(
            "sleep",
            |cmd| cmd.arg("30"),
            Capture::empty(),
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }
}
