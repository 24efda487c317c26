//! 规范化结果（CanonicalResult）
//!
//! 所有恢复路径最终都汇聚到这一个结构，调用方只会看到它。

use serde::{Deserialize, Serialize};

use crate::models::request::ProcessMode;
use crate::models::upstream::{lenient_count, lenient_string, null_default};

/// 缺失字段的占位值
pub const UNKNOWN: &str = "Unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// 结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Success,
    Error,
}

/// 结果来源：由哪条恢复路径产生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// 处理器输出的结构化 JSON
    StructuredJson,
    /// 文本 key:value 扫描
    TextFallback,
    /// 处理器不可用，使用演示数据
    SyntheticDemo,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::StructuredJson => "structured-json",
            Provenance::TextFallback => "text-fallback",
            Provenance::SyntheticDemo => "synthetic-demo",
        }
    }
}

/// OS&D 异常类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExceptionType {
    Shortage,
    Overage,
    Damage,
    #[default]
    Unknown,
}

impl From<String> for ExceptionType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl ExceptionType {
    /// 从处理器的字符串解析，大小写不敏感，无法识别的归为 Unknown
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "shortage" => ExceptionType::Shortage,
            "overage" => ExceptionType::Overage,
            "damage" => ExceptionType::Damage,
            _ => ExceptionType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionType::Shortage => "shortage",
            ExceptionType::Overage => "overage",
            ExceptionType::Damage => "damage",
            ExceptionType::Unknown => "unknown",
        }
    }
}

/// 运单（trip 级别）信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub trip_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub manifest_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub trailer_number: String,
    #[serde(deserialize_with = "lenient_count")]
    pub expected_shipments: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub actual_shipments: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub expected_handling_units: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub actual_handling_units: u32,
}

impl Default for ManifestInfo {
    fn default() -> Self {
        Self {
            trip_number: unknown(),
            manifest_number: unknown(),
            trailer_number: unknown(),
            expected_shipments: 0,
            actual_shipments: 0,
            expected_handling_units: 0,
            actual_handling_units: 0,
        }
    }
}

/// 单条异常记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExceptionRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub pro_number: String,
    #[serde(rename = "type", deserialize_with = "null_default")]
    pub kind: ExceptionType,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_count")]
    pub expected_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub actual_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub weight: u32,
    #[serde(deserialize_with = "null_default")]
    pub notes: String,
    #[serde(deserialize_with = "null_default")]
    pub markups: Vec<String>,
}

impl Default for ExceptionRecord {
    fn default() -> Self {
        Self {
            pro_number: unknown(),
            kind: ExceptionType::Unknown,
            description: unknown(),
            expected_pieces: 0,
            actual_pieces: 0,
            weight: 0,
            notes: String::new(),
            markups: Vec::new(),
        }
    }
}

/// 异常汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    #[serde(deserialize_with = "lenient_count")]
    pub total_exceptions: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub shortages: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub overages: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub damages: u32,
    #[serde(rename = "hasOSDNotation", deserialize_with = "null_default")]
    pub has_osd_notation: bool,
}

impl Summary {
    /// 根据异常列表重新统计
    pub fn tally(exceptions: &[ExceptionRecord]) -> Self {
        let count = |kind: ExceptionType| exceptions.iter().filter(|e| e.kind == kind).count() as u32;
        let total = exceptions.len() as u32;
        Self {
            total_exceptions: total,
            shortages: count(ExceptionType::Shortage),
            overages: count(ExceptionType::Overage),
            damages: count(ExceptionType::Damage),
            has_osd_notation: total > 0,
        }
    }

    /// 汇总是否与异常列表一致
    pub fn is_consistent_with(&self, exceptions: &[ExceptionRecord]) -> bool {
        *self == Self::tally(exceptions)
    }
}

/// 返回给调用方的唯一结果结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    pub status: ResultStatus,
    pub filename: String,
    pub process_type: ProcessMode,
    pub message: String,
    pub manifest: ManifestInfo,
    pub exceptions: Vec<ExceptionRecord>,
    pub summary: Summary,
    pub note: String,
    pub timestamp: String,
    pub source: Provenance,
    /// 处理器自己声明的来源（仅规范格式直通时存在）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_source: Option<String>,
    pub file_size: u64,
    pub processing_time: String,
    /// 文本回退路径保留的原始输出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl CanonicalResult {
    /// 当前本地时间（RFC 3339）
    pub fn now_timestamp() -> String {
        chrono::Local::now().to_rfc3339()
    }
}
