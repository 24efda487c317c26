//! 上游处理器可能输出的 JSON 结构
//!
//! 每种已知结构对应一个变体，由 [`UpstreamDocument::classify`] 识别：
//! - `Nested`：`output.general.{manifestInfo, shipments, summary}`
//! - `Canonical`：已经是规范结果的形状（顶层 `manifest` 对象）

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::models::manifest::{ExceptionRecord, ManifestInfo, ResultStatus, Summary};

/// 识别出的上游文档
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamDocument {
    Nested(NestedDocument),
    Canonical(CanonicalDocument),
}

impl UpstreamDocument {
    /// 按结构识别 JSON 值，无法识别或字段类型不符时返回 None
    pub fn classify(value: JsonValue) -> Option<Self> {
        let is_nested = value
            .pointer("/output/general")
            .map_or(false, JsonValue::is_object);
        let is_canonical = value.get("manifest").map_or(false, JsonValue::is_object);

        if is_nested {
            serde_json::from_value(value).ok().map(UpstreamDocument::Nested)
        } else if is_canonical {
            serde_json::from_value(value).ok().map(UpstreamDocument::Canonical)
        } else {
            None
        }
    }

    pub fn schema_name(&self) -> &'static str {
        match self {
            UpstreamDocument::Nested(_) => "nested",
            UpstreamDocument::Canonical(_) => "canonical",
        }
    }
}

// ========== 嵌套结构 ==========

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct NestedDocument {
    pub output: NestedOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct NestedOutput {
    pub general: GeneralOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralOutput {
    #[serde(deserialize_with = "null_default")]
    pub manifest_info: ManifestInfo,
    #[serde(deserialize_with = "null_default")]
    pub shipments: Vec<Shipment>,
    #[serde(deserialize_with = "null_default")]
    pub summary: UpstreamSummary,
}

/// "无异常"的货件类型标记
pub const SHIPMENT_OK: &str = "ok";

/// 嵌套结构中的单个货件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shipment {
    #[serde(deserialize_with = "lenient_string")]
    pub pro_number: String,
    #[serde(deserialize_with = "lenient_count")]
    pub expected_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub actual_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub weight: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub exception_type: String,
    #[serde(deserialize_with = "null_default")]
    pub markup_notations: Vec<String>,
    pub handwritten_notes: Option<String>,
}

impl Default for Shipment {
    fn default() -> Self {
        Self {
            pro_number: crate::models::manifest::UNKNOWN.to_string(),
            expected_pieces: 0,
            actual_pieces: 0,
            weight: 0,
            description: crate::models::manifest::UNKNOWN.to_string(),
            exception_type: "unknown".to_string(),
            markup_notations: Vec::new(),
            handwritten_notes: None,
        }
    }
}

impl Shipment {
    pub fn is_ok(&self) -> bool {
        self.exception_type.trim().eq_ignore_ascii_case(SHIPMENT_OK)
    }
}

/// 嵌套结构自带的汇总计数
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSummary {
    #[serde(deserialize_with = "lenient_count")]
    pub total_overages: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_shortages: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_damages: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_overage_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_shortage_pieces: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_damaged_pieces: u32,
    #[serde(rename = "hasOSDNotation", deserialize_with = "null_default")]
    pub has_osd_notation: bool,
}

// ========== 规范结构 ==========

/// 已经符合规范形状的处理器输出
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalDocument {
    #[serde(deserialize_with = "null_default")]
    pub status: ResultStatus,
    pub filename: Option<String>,
    pub message: Option<String>,
    pub manifest: ManifestInfo,
    #[serde(deserialize_with = "null_default")]
    pub exceptions: Vec<ExceptionRecord>,
    #[serde(deserialize_with = "null_default")]
    pub summary: Summary,
    pub note: Option<String>,
    pub timestamp: Option<String>,
    pub source: Option<String>,
    pub processing_time: Option<String>,
}

// ========== 宽松反序列化 ==========

/// 计数字段：接受整数、浮点数、数字字符串和 null
pub fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a non-negative count as number or string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(u32::try_from(value).unwrap_or(u32::MAX))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(u32::try_from(value.max(0)).unwrap_or(u32::MAX))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value.is_finite() && value > 0.0 {
                Ok(value.round().min(u32::MAX as f64) as u32)
            } else {
                Ok(0)
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            match trimmed.parse::<f64>() {
                Ok(n) => self.visit_f64(n),
                Err(_) => Err(E::invalid_value(de::Unexpected::Str(value), &self)),
            }
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(0)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

/// 可为 null 的字段：null 与缺失一样取默认值
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 编号字段：接受字符串或数字（部分处理器把 trip number 输出为整数）
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdentifierVisitor;

    impl<'de> Visitor<'de> for IdentifierVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number identifier")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(crate::models::manifest::UNKNOWN.to_string())
        }
    }

    deserializer.deserialize_any(IdentifierVisitor)
}
