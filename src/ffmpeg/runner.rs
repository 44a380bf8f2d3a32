//! FFmpeg/ffprobe process spawning.
//!
//! Spawns the tool as a child process with a discrete argument vector, drains stdout and
//! stderr on background threads, and waits for exit. With a timeout the child is killed
//! once the deadline passes.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use parking_lot::Mutex;

use super::discovery::get_ffmpeg_path;
use crate::error::AppError;

/// Keep only the last N bytes of stderr to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;
/// How often a timed wait checks whether the child has exited.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a successful run.
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

fn drain_stdout<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn drain_stderr<R: Read + Send + 'static>(
    reader: R,
    sink: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stream_reader = BufReader::new(reader);
        let mut line_buf = Vec::with_capacity(256);
        while stream_reader.read_until(b'\n', &mut line_buf).unwrap_or(0) > 0 {
            let mut guard = sink.lock();
            guard.extend_from_slice(&line_buf);
            if guard.len() > MAX_STDERR_BYTES {
                let excess = guard.len() - MAX_STDERR_BYTES;
                guard.drain(..excess);
            }
            drop(guard);
            line_buf.clear();
        }
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, AppError> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            log::warn!(
                target: "vidthumb::ffmpeg::runner",
                "Process exceeded {:?}, killing it",
                limit
            );
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::TimedOut {
                secs: limit.as_secs(),
            });
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

/// Run `program` with `args` and block until it exits (or `timeout` elapses).
/// Non-zero exit maps to [`AppError::FfmpegFailed`] carrying the stderr tail.
pub fn run_tool_blocking(
    program: &Path,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<ToolOutput, AppError> {
    let input_arg = args
        .iter()
        .position(|a| a == "-i")
        .and_then(|i| args.get(i + 1));
    log::debug!(
        target: "vidthumb::ffmpeg::runner",
        "Spawning: path={}, input={:?}, output={:?}",
        program.display(),
        input_arg,
        args.last()
    );

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("Failed to spawn {}: {}", program.display(), e))?;

    let stdout = match child.stdout.take() {
        Some(s) => s,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::from("Failed to capture stdout"));
        }
    };
    let stderr = match child.stderr.take() {
        Some(s) => s,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::from("Failed to capture stderr"));
        }
    };

    let stderr_buffer = Arc::new(Mutex::new(Vec::new()));
    let stdout_handle = drain_stdout(stdout);
    let stderr_handle = drain_stderr(stderr, Arc::clone(&stderr_buffer));

    let status = wait_with_timeout(&mut child, timeout);

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let _ = stderr_handle.join();
    let stderr_str = String::from_utf8_lossy(&stderr_buffer.lock()).to_string();

    let status = status?;
    if status.success() {
        log::trace!(
            target: "vidthumb::ffmpeg::runner",
            "{} completed successfully",
            program.display()
        );
        Ok(ToolOutput {
            stdout: stdout_bytes,
            stderr: stderr_str,
        })
    } else {
        let code = status.code().unwrap_or(-1);
        let err_preview = stderr_str
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .join("; ");
        log::debug!(
            target: "vidthumb::ffmpeg::runner",
            "{} failed (code={}): {}",
            program.display(),
            code,
            err_preview
        );
        Err(AppError::FfmpegFailed {
            code,
            stderr: stderr_str,
        })
    }
}

/// Run FFmpeg and block until completion.
pub fn run_ffmpeg_blocking(args: Vec<String>, timeout: Option<Duration>) -> Result<(), AppError> {
    let ffmpeg_path = get_ffmpeg_path()?;
    run_tool_blocking(ffmpeg_path, &args, timeout).map(|_| ())
}
