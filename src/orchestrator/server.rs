//! HTTP 服务 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验监听地址、准备上传目录、检查处理器
//! 2. **路由**：上传处理、健康检查、处理器诊断
//! 3. **请求解析**：读取 multipart 表单，校验后交给 [`ManifestFlow`]
//! 4. **生命周期**：Ctrl-C 时优雅退出
//!
//! 本层不做任何业务判断，只负责 HTTP 与流程层之间的转换。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, UploadError};
use crate::models::{CanonicalResult, ProcessMode};
use crate::services::validate_upload;
use crate::workflow::ManifestFlow;

/// 服务名称（健康检查返回）
pub const APP_NAME: &str = "Manifest Exception Processor";

const FILE_FIELD: &str = "file";
const MODE_FIELD: &str = "processType";

/// 请求之间共享的只读状态
#[derive(Debug)]
pub struct AppState {
    pub flow: ManifestFlow,
}

/// 应用主结构
pub struct App {
    config: Config,
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let addr: SocketAddr = config
            .bind_addr
            .parse()
            .map_err(|_| AppError::from(ConfigError::InvalidBindAddr {
                value: config.bind_addr.clone(),
            }))?;

        let upload_dir = config.upload_dir();
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .with_context(|| format!("无法创建上传目录: {}", upload_dir.display()))?;

        let flow = ManifestFlow::new(&config);
        if flow.invoker().executable_available() {
            info!("✓ 处理器可用: {}", flow.invoker().program());
        } else {
            warn!(
                "⚠️ 找不到处理器 {}，上传将返回演示数据",
                flow.invoker().program()
            );
        }

        Ok(Self {
            config,
            addr,
            state: Arc::new(AppState { flow }),
        })
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.max_upload_bytes)
    }

    /// 启动 HTTP 服务，直到收到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("无法监听 {}", self.addr))?;
        info!("✅ 服务已启动: http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

/// 构建路由
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/process", post(process_upload))
        .route("/api/process", post(process_upload))
        .route("/health", get(health))
        .route("/api/processor", get(processor_info))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// 上传 PDF 并返回规范结果
async fn process_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<CanonicalResult>> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut mode = ProcessMode::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(upload_error)?;
                file = Some((filename, data.to_vec()));
            }
            Some(MODE_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(upload_error)?;
                mode = ProcessMode::parse(&value).unwrap_or_else(|| {
                    warn!("⚠️ 未知的 processType '{}'，按同步处理", value);
                    ProcessMode::default()
                });
            }
            _ => {}
        }
    }

    let (filename, data) = file.ok_or(UploadError::MissingFile)?;
    let display_name = validate_upload(filename.as_deref(), &data)?;
    info!("📥 收到上传: {} ({} 字节)", display_name, data.len());

    let result = state.flow.process_upload(display_name, &data, mode).await?;
    Ok(Json(result))
}

/// 超出请求体上限的单独区分，其余都视为格式错误
fn upload_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Malformed(err.body_text())
    }
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "healthy", "app": APP_NAME }))
}

/// 处理器配置与可用性
async fn processor_info(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let invoker = state.flow.invoker();
    Json(json!({
        "program": invoker.program(),
        "args": invoker.args(),
        "workingDir": invoker.working_dir().map(|dir| dir.display().to_string()),
        "timeoutSecs": invoker.timeout().as_secs(),
        "available": invoker.executable_available(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ 无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 收到退出信号，正在关闭服务...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_bind_addr_is_rejected() {
        let config = Config {
            bind_addr: "not an address".to_string(),
            ..Config::default()
        };
        let err = App::initialize(config).await.err().unwrap();
        assert!(err.to_string().contains("not an address"));
    }

    #[tokio::test]
    async fn test_processor_info_reports_configuration() {
        let config = Config {
            processor_program: "/nonexistent/manifest-processor".to_string(),
            processor_args: vec!["--fast".to_string()],
            ..Config::default()
        };
        let state = Arc::new(AppState {
            flow: ManifestFlow::new(&config),
        });

        let Json(info) = processor_info(State(state)).await;
        assert_eq!(info["program"], "/nonexistent/manifest-processor");
        assert_eq!(info["args"][0], "--fast");
        assert_eq!(info["timeoutSecs"], 120);
        assert_eq!(info["available"], false);
        assert!(info["workingDir"].is_null());
    }
}
