use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use vidthumb_core::config::ThumbnailerConfig;
use vidthumb_core::error::AppError;
use vidthumb_core::sidecar_api::MediaService;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcSuccess {
    id: u64,
    result: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcFailure {
    id: u64,
    error: RpcErrorPayload,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcErrorPayload {
    code: &'static str,
    summary: String,
    detail: String,
}

impl RpcErrorPayload {
    fn protocol(summary: &str, detail: impl ToString) -> Self {
        Self {
            code: vidthumb_core::error::CODE_INVALID_ARGUMENT,
            summary: summary.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl From<&AppError> for RpcErrorPayload {
    fn from(err: &AppError) -> Self {
        let (summary, detail) = err.summary_and_detail();
        Self {
            code: err.code(),
            summary,
            detail,
        }
    }
}

type SharedWriter = Arc<Mutex<io::Stdout>>;

fn write_json_line<T: serde::Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::other(format!("serialize response: {}", e)))?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn write_json_line_shared<T: serde::Serialize>(writer: &SharedWriter, value: &T) -> io::Result<()> {
    let mut guard = writer.lock();
    write_json_line(&mut *guard, value)
}

fn write_failure(writer: &SharedWriter, id: u64, error: RpcErrorPayload) {
    if let Err(e) = write_json_line_shared(writer, &RpcFailure { id, error }) {
        log::error!(target: "vidthumb::sidecar", "Failed to write response {}: {}", id, e);
    }
}

/// Methods that decode media run on a worker thread; the rest are answered inline.
fn is_worker_request(method: &str) -> bool {
    matches!(method, "media.inspect" | "media.thumbnails")
}

fn dispatch(service: &MediaService, method: &str, params: Value) -> Result<Value, AppError> {
    match method {
        "app.capabilities" => serde_json::to_value(service.app_capabilities()).map_err(|e| {
            AppError::from(format!("Failed to serialize app capabilities: {}", e))
        }),
        "media.inspect" => service.media_inspect(params),
        "media.thumbnails" => service.media_thumbnails(params),
        _ => Err(AppError::invalid_argument(format!(
            "Unknown method: {}",
            method
        ))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs `serve` and turns a panic inside it into an error reply for `method`.
fn guarded(
    method: &str,
    serve: impl FnOnce() -> Result<Value, AppError>,
) -> Result<Value, AppError> {
    panic::catch_unwind(AssertUnwindSafe(serve)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log::error!(target: "vidthumb::sidecar", "{} panicked: {}", method, message);
        Err(AppError::decode_error(format!(
            "Internal error while handling {}: {}",
            method, message
        )))
    })
}

fn handle_request(request: RpcRequest, service: &MediaService, writer: &SharedWriter) {
    let id = request.id;
    log::debug!(target: "vidthumb::sidecar", "-> {} {}", id, request.method);
    match guarded(&request.method, || dispatch(service, &request.method, request.params)) {
        Ok(result) => {
            if let Err(e) = write_json_line_shared(writer, &RpcSuccess { id, result }) {
                write_failure(writer, id, RpcErrorPayload::protocol("Serialization error", e));
            }
        }
        Err(err) => {
            log::warn!(
                target: "vidthumb::sidecar",
                "{} {} failed: {}",
                id,
                request.method,
                err
            );
            write_failure(writer, id, RpcErrorPayload::from(&err));
        }
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let service = Arc::new(MediaService::with_ffmpeg(ThumbnailerConfig::from_env()));
    service.cleanup_startup_temp();
    log::info!(
        target: "vidthumb::sidecar",
        "Ready (artifacts in {}, max parallel {:?})",
        service.config().temp_dir.display(),
        service.config().max_parallel_extractions
    );

    let stdin = io::stdin();
    let stdout: SharedWriter = Arc::new(Mutex::new(io::stdout()));
    let mut workers: Vec<thread::JoinHandle<()>> = Vec::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                write_failure(&stdout, 0, RpcErrorPayload::protocol("Invalid input stream", err));
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_failure(&stdout, 0, RpcErrorPayload::protocol("Invalid request", err));
                continue;
            }
        };

        if is_worker_request(&request.method) {
            let writer = Arc::clone(&stdout);
            let service = Arc::clone(&service);
            workers.retain(|w| !w.is_finished());
            workers.push(thread::spawn(move || {
                handle_request(request, &service, &writer);
            }));
        } else {
            handle_request(request, &service, &stdout);
        }
    }

    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}
