//! # Manifest Exception Web
//!
//! 运单异常 PDF 上传服务：接收上传的运单 PDF，调用外部处理器，
//! 把处理器的输出整理成统一的结果结构返回。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（子进程、临时文件），只暴露能力
//! - `ProcessorInvoker` - 带超时地运行外部处理器
//! - `ScopedUpload` - 随 drop 删除的临时上传文件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心 HTTP
//! - `output_parser` - 从处理器输出恢复数据（标记 JSON → 末尾 JSON 行 → 文本扫描）
//! - `normalizer` - 映射为唯一的 `CanonicalResult`
//! - `demo_generator` - 可注入种子的演示数据
//! - `upload_guard` - 上传校验与文件名清洗
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次上传"的完整处理流程
//! - `ManifestFlow` - invoke → recover → normalize，失败时演示数据兜底
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/server` - axum 路由、应用生命周期
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, UploadError};
pub use infrastructure::{InvokeError, ProcessOutcome, ProcessorInvoker, ScopedUpload};
pub use models::{CanonicalResult, ProcessMode, Provenance};
pub use orchestrator::{router, App, AppState};
pub use services::DemoGenerator;
pub use workflow::ManifestFlow;
