use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 上传内容不合法，直接返回 400
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 上传错误
///
/// 这些消息会原样返回给调用方
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file provided")]
    MissingFile,
    #[error("No file selected")]
    EmptyFilename,
    #[error("Only PDF files are supported")]
    UnsupportedExtension { filename: String },
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("Uploaded file exceeds the size limit")]
    TooLarge,
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 创建临时文件失败
    #[error("创建临时文件失败 ({path}): {source}")]
    CreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 删除文件失败
    #[error("删除文件失败 ({path}): {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 监听地址无法解析
    #[error("无法解析监听地址 '{value}'")]
    InvalidBindAddr { value: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建临时文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upload(UploadError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Upload(e) => e.to_string(),
            other => {
                error!("❌ 请求处理失败: {}", other);
                "Internal processing error".to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
