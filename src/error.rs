//! App error type for metadata and thumbnail requests. Implements Display and Serialize for callers.

use crate::ffmpeg::parse_ffmpeg_error;

/// Wire-level error codes surfaced to the calling layer.
pub const CODE_INVALID_ARGUMENT: &str = "InvalidArgument";
pub const CODE_FILE_ERROR: &str = "FileError";
pub const CODE_DECODE_ERROR: &str = "DecodeError";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    FileError(String),

    #[error("{0}")]
    DecodeError(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg failed (code {code}): {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("FFmpeg timed out after {secs}s")]
    TimedOut { secs: u64 },
}

impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn file_error(msg: impl Into<String>) -> Self {
        Self::FileError(msg.into())
    }

    pub fn decode_error(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    pub fn ffmpeg_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::FfmpegFailed {
            code,
            stderr: stderr.into(),
        }
    }

    /// Collapses every variant onto one of the three wire codes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => CODE_INVALID_ARGUMENT,
            AppError::FileError(_) | AppError::Io(_) => CODE_FILE_ERROR,
            AppError::DecodeError(_)
            | AppError::FfmpegNotFound(_)
            | AppError::FfmpegFailed { .. }
            | AppError::TimedOut { .. } => CODE_DECODE_ERROR,
        }
    }

    /// Short one-line summary plus full detail, for logs and RPC failures.
    pub fn summary_and_detail(&self) -> (String, String) {
        match self {
            AppError::FfmpegFailed { code, stderr } => {
                let payload = parse_ffmpeg_error(stderr, Some(*code));
                (payload.summary, payload.detail)
            }
            _ => {
                let text = self.to_string();
                (text.clone(), text)
            }
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AppError::FfmpegFailed { .. } => {
                let (summary, detail) = self.summary_and_detail();
                let json = serde_json::json!({
                    "code": self.code(),
                    "summary": summary,
                    "detail": detail,
                });
                serializer.serialize_str(&json.to_string())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::FfmpegFailed {
            code: -1,
            stderr: s,
        }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
