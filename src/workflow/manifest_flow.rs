//! 运单处理流程 - 流程层
//!
//! 核心职责：定义"一次上传"的完整处理流程
//!
//! 流程顺序：
//! 1. 写入临时文件
//! 2. 调用处理器（带超时）
//! 3. 删除临时文件
//! 4. 恢复输出 → 规范化
//! 5. 任何一步拿不到数据 → 演示数据兜底
//!
//! 处理器不可用不会变成错误返回给调用方，只体现在结果的 `source` 和 `note` 上。

use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::Rng;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{InvokeError, ProcessOutcome, ProcessorInvoker, ScopedUpload};
use crate::models::{CanonicalResult, ProcessMode, ProcessRequest};
use crate::services::{
    normalize, recover, recover_structured, synthesize, DemoGenerator, FallbackReason,
    ResultContext,
};
use crate::utils::logging::truncate_text;

const OUTPUT_PREVIEW_CHARS: usize = 500;

/// 运单处理流程
///
/// - 编排 invoke → recover → normalize
/// - 决定何时走演示数据
/// - 每次请求独立，不在请求之间共享可变状态
#[derive(Debug, Clone)]
pub struct ManifestFlow {
    invoker: ProcessorInvoker,
    upload_dir: PathBuf,
    demo_seed: Option<u64>,
    verbose_logging: bool,
}

impl ManifestFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            invoker: ProcessorInvoker::from_config(config),
            upload_dir: config.upload_dir(),
            demo_seed: config.demo_seed,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 使用自定义调用器（测试时替换成脚本）
    pub fn with_invoker(invoker: ProcessorInvoker, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            upload_dir: upload_dir.into(),
            demo_seed: None,
            verbose_logging: false,
        }
    }

    /// 固定演示数据的随机种子
    pub fn with_demo_seed(mut self, seed: u64) -> Self {
        self.demo_seed = Some(seed);
        self
    }

    pub fn invoker(&self) -> &ProcessorInvoker {
        &self.invoker
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// 处理一次已校验的上传
    ///
    /// # 参数
    /// - `display_name`: 清洗后的文件名
    /// - `content`: 文件内容
    /// - `mode`: 同步 / 异步
    ///
    /// # 错误
    /// 只有临时文件无法写入时返回错误；处理器相关的失败都会得到演示结果
    pub async fn process_upload(
        &self,
        display_name: String,
        content: &[u8],
        mode: ProcessMode,
    ) -> AppResult<CanonicalResult> {
        let started = Instant::now();
        let upload = ScopedUpload::write(&self.upload_dir, content)?;
        let request = ProcessRequest {
            upload,
            mode,
            display_name,
        };

        let mut result = self.run(request).await;
        result.processing_time = format!("{:.1} seconds", started.elapsed().as_secs_f64());

        info!(
            "✅ {} 处理完成: source={}, 异常 {} 条, 用时 {}",
            result.filename,
            result.source.as_str(),
            result.exceptions.len(),
            result.processing_time
        );
        Ok(result)
    }

    /// 运行处理器并得到规范结果，临时文件在返回前删除
    pub async fn run(&self, request: ProcessRequest) -> CanonicalResult {
        let ProcessRequest {
            upload,
            mode,
            display_name,
        } = request;
        let ctx = ResultContext::new(display_name, mode, upload.size());

        info!(
            "📄 开始处理 {} ({} 字节, {:?})",
            ctx.filename, ctx.file_size, ctx.mode
        );

        let outcome = self.invoker.invoke(upload.path(), mode).await;
        upload.close();

        if let Ok(outcome) = &outcome {
            self.log_output(outcome);
        }

        let mut generator = DemoGenerator::from_seed_option(self.demo_seed);
        resolve(&ctx, outcome, &mut generator)
    }

    fn log_output(&self, outcome: &ProcessOutcome) {
        if !self.verbose_logging {
            return;
        }
        info!(
            "📝 处理器 stdout: {}",
            truncate_text(&outcome.stdout, OUTPUT_PREVIEW_CHARS)
        );
        if !outcome.stderr.trim().is_empty() {
            info!(
                "📝 处理器 stderr: {}",
                truncate_text(&outcome.stderr, OUTPUT_PREVIEW_CHARS)
            );
        }
    }
}

/// 根据调用结果决定走哪条路径
///
/// - 正常退出：三种恢复策略依次尝试
/// - 非零退出：只尝试结构化策略，错误输出不当作运单数据
/// - 调用失败：直接生成演示数据
pub fn resolve<R: Rng>(
    ctx: &ResultContext,
    outcome: Result<ProcessOutcome, InvokeError>,
    generator: &mut DemoGenerator<R>,
) -> CanonicalResult {
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("⚠️ 处理器不可用，使用演示数据: {}", err);
            return synthesize(&FallbackReason::from(&err), ctx, generator);
        }
    };

    if outcome.succeeded() {
        return match recover(&outcome.stdout) {
            Ok(payload) => {
                info!("🔍 输出恢复策略: {}", payload.strategy().as_str());
                normalize(payload, ctx)
            }
            Err(err) => {
                warn!("⚠️ {}，使用演示数据", err);
                synthesize(&FallbackReason::UnparseableOutput, ctx, generator)
            }
        };
    }

    match recover_structured(&outcome.stdout) {
        Some(payload) => {
            warn!(
                "⚠️ 处理器退出码 {:?}，但输出中有结构化数据 ({})",
                outcome.exit_code,
                payload.strategy().as_str()
            );
            normalize(payload, ctx)
        }
        None => {
            warn!(
                "⚠️ 处理器失败 (code={:?}): {}",
                outcome.exit_code,
                truncate_text(outcome.stderr.trim(), OUTPUT_PREVIEW_CHARS)
            );
            synthesize(
                &FallbackReason::ExitFailure {
                    code: outcome.exit_code,
                },
                ctx,
                generator,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, ResultStatus};
    use std::time::Duration;

    fn ctx() -> ResultContext {
        ResultContext::new("trip.pdf", ProcessMode::Synchronous, 10)
    }

    fn outcome(code: i32, stdout: &str) -> Result<ProcessOutcome, InvokeError> {
        Ok(ProcessOutcome {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(5),
        })
    }

    const MARKED: &str = "progress 50%\n--- JSON OUTPUT START ---\n{\"manifest\":{\"tripNumber\":\"9\"},\"exceptions\":[],\"summary\":{}}\n--- JSON OUTPUT END ---\n";

    #[test]
    fn test_success_uses_recovered_payload() {
        let result = resolve(&ctx(), outcome(0, MARKED), &mut DemoGenerator::seeded(1));
        assert_eq!(result.source, Provenance::StructuredJson);
        assert_eq!(result.manifest.trip_number, "9");
    }

    #[test]
    fn test_success_with_plain_text_uses_text_scan() {
        let result = resolve(
            &ctx(),
            outcome(0, "Trip: 1234567\nPRO: 55 short"),
            &mut DemoGenerator::seeded(1),
        );
        assert_eq!(result.source, Provenance::TextFallback);
        assert_eq!(result.exceptions[0].pro_number, "55");
    }

    #[test]
    fn test_non_zero_exit_ignores_plain_text() {
        let result = resolve(
            &ctx(),
            outcome(1, "error: Trip: 1234567 could not be read"),
            &mut DemoGenerator::seeded(1),
        );
        assert_eq!(result.source, Provenance::SyntheticDemo);
        assert!(result.note.contains("exited with code 1"));
    }

    #[test]
    fn test_non_zero_exit_still_accepts_structured_output() {
        let result = resolve(&ctx(), outcome(2, MARKED), &mut DemoGenerator::seeded(1));
        assert_eq!(result.source, Provenance::StructuredJson);
    }

    #[test]
    fn test_empty_output_is_synthetic() {
        let result = resolve(&ctx(), outcome(0, "   \n"), &mut DemoGenerator::seeded(1));
        assert_eq!(result.source, Provenance::SyntheticDemo);
        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.note.contains("could not be parsed"));
    }

    #[test]
    fn test_invoke_error_is_synthetic() {
        let err = InvokeError::Timeout {
            after: Duration::from_secs(1),
        };
        let result = resolve(&ctx(), Err(err), &mut DemoGenerator::seeded(1));
        assert_eq!(result.source, Provenance::SyntheticDemo);
        assert!(result.note.contains("timed out"));
        assert_eq!(result.filename, "trip.pdf");
    }
}
