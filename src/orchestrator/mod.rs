//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责 HTTP 接入和应用生命周期，是整个系统的"入口"。
//!
//! ## 层次关系
//!
//! ```text
//! server (HTTP：上传 / 健康检查 / 诊断)
//!     ↓
//! workflow::ManifestFlow (处理单个上传)
//!     ↓
//! services (能力层：校验 / 恢复 / 规范化 / 演示数据)
//!     ↓
//! infrastructure (基础设施：处理器调用、临时文件)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有监听端口
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做请求解析和响应转换

pub mod server;

pub use server::{router, App, AppState, APP_NAME};
