//! 处理请求

use serde::{Deserialize, Serialize};

use crate::infrastructure::ScopedUpload;

/// 处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    #[default]
    Synchronous,
    Asynchronous,
}

impl ProcessMode {
    /// 解析表单中的 `processType` 字段
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Some(ProcessMode::Synchronous),
            "async" | "asynchronous" => Some(ProcessMode::Asynchronous),
            _ => None,
        }
    }

    /// 追加给处理器的命令行参数
    pub fn flag(self) -> Option<&'static str> {
        match self {
            ProcessMode::Synchronous => None,
            ProcessMode::Asynchronous => Some("--async"),
        }
    }
}

/// 单次上传的处理请求
///
/// 持有临时文件，请求被消费（drop）时临时文件随之删除
#[derive(Debug)]
pub struct ProcessRequest {
    pub upload: ScopedUpload,
    pub mode: ProcessMode,
    /// 展示用文件名（已清洗）
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(ProcessMode::parse("sync"), Some(ProcessMode::Synchronous));
        assert_eq!(ProcessMode::parse("Async"), Some(ProcessMode::Asynchronous));
        assert_eq!(ProcessMode::parse("asynchronous"), Some(ProcessMode::Asynchronous));
        assert_eq!(ProcessMode::parse("batch"), None);
    }

    #[test]
    fn test_only_async_adds_flag() {
        assert_eq!(ProcessMode::Synchronous.flag(), None);
        assert_eq!(ProcessMode::Asynchronous.flag(), Some("--async"));
    }
}
