/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化全局日志（`RUST_LOG` 未设置时默认 info）
///
/// 重复调用不会报错，测试中可以随意调用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录服务启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 Manifest Exception Processor 启动");
    info!("📡 监听地址: http://{}", config.bind_addr);
    info!(
        "🔧 处理器命令: {} {}",
        config.processor_program,
        config.processor_args.join(" ")
    );
    info!("⏱️ 处理超时: {} 秒", config.processor_timeout_secs);
    info!("📦 上传上限: {} MB", config.max_upload_bytes / 1024 / 1024);
    if let Some(seed) = config.demo_seed {
        info!("🎲 演示数据固定种子: {}", seed);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        // 按字符截断，不会切断多字节字符
        assert_eq!(truncate_text("运单异常报告", 2), "运单...");
    }
}
