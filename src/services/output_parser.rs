//! 处理器输出恢复 - 业务能力层
//!
//! 按固定优先级从处理器的 stdout 中恢复结构化数据，命中即停止：
//!
//! 1. **标记 JSON**：独占一行的起止标记之间的所有行
//! 2. **末尾 JSON 行**：倒序找到的第一个以 `{` 开头、以 `}` 结尾的整行
//! 3. **文本扫描**：`key: value` 形式的行，识别 trip / manifest / pro
//!
//! 每一步的 JSON 解析失败都静默进入下一步，不会向调用方抛错。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::models::UpstreamDocument;

/// 处理器约定的 JSON 起始标记
pub const JSON_START_MARKER: &str = "--- JSON OUTPUT START ---";
/// 处理器约定的 JSON 结束标记
pub const JSON_END_MARKER: &str = "--- JSON OUTPUT END ---";

/// 值开头的编号（字母、数字、连字符）
static LEADING_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?\s*([A-Za-z0-9][A-Za-z0-9-]*)").expect("valid regex"));

/// 不含冒号、以 PRO 加数字编号开头的行，例如 `PRO123456 - SHORTAGE`
static BARE_PRO_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^pro\s*#?\s*([0-9][A-Za-z0-9-]*)").expect("valid regex"));

/// 恢复策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    MarkerJson,
    TrailingJson,
    TextScan,
}

impl RecoveryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStrategy::MarkerJson => "marker-json",
            RecoveryStrategy::TrailingJson => "trailing-json",
            RecoveryStrategy::TextScan => "text-scan",
        }
    }
}

/// 文本扫描得到的 PRO 行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextProEntry {
    pub pro_number: String,
    /// 原始整行，用于追溯
    pub source_line: String,
}

/// 文本扫描结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextScan {
    pub trip_number: Option<String>,
    pub manifest_number: Option<String>,
    pub pro_entries: Vec<TextProEntry>,
    /// 原始输出（原样保留）
    pub raw_output: String,
}

impl TextScan {
    fn is_empty(&self) -> bool {
        self.trip_number.is_none() && self.manifest_number.is_none() && self.pro_entries.is_empty()
    }
}

/// 恢复出的数据，带上产生它的策略
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveredPayload {
    Structured {
        strategy: RecoveryStrategy,
        document: UpstreamDocument,
    },
    Text(TextScan),
}

impl RecoveredPayload {
    pub fn strategy(&self) -> RecoveryStrategy {
        match self {
            RecoveredPayload::Structured { strategy, .. } => *strategy,
            RecoveredPayload::Text(_) => RecoveryStrategy::TextScan,
        }
    }
}

/// 解析器错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no recoverable payload in processor output")]
    NoRecoverablePayload,
}

/// 按全部三种策略恢复
pub fn recover(stdout: &str) -> Result<RecoveredPayload, ParseError> {
    if let Some(payload) = recover_structured(stdout) {
        return Ok(payload);
    }

    let scan = scan_text(stdout);
    if scan.is_empty() {
        debug!("三种策略均未恢复到数据");
        return Err(ParseError::NoRecoverablePayload);
    }
    debug!(
        "文本扫描: trip={:?}, manifest={:?}, PRO 行 {} 条",
        scan.trip_number,
        scan.manifest_number,
        scan.pro_entries.len()
    );
    Ok(RecoveredPayload::Text(scan))
}

/// 只尝试两种结构化策略（处理器非零退出时使用）
pub fn recover_structured(stdout: &str) -> Option<RecoveredPayload> {
    let lines: Vec<&str> = stdout.lines().collect();

    if let Some(document) = marker_block(&lines).and_then(|block| parse_document(&block)) {
        return Some(RecoveredPayload::Structured {
            strategy: RecoveryStrategy::MarkerJson,
            document,
        });
    }

    if let Some(document) = trailing_json_line(&lines).and_then(parse_document) {
        return Some(RecoveredPayload::Structured {
            strategy: RecoveryStrategy::TrailingJson,
            document,
        });
    }

    None
}

/// 策略 1：起止标记之间的内容
///
/// 标记必须独占一行（允许首尾空白），起始标记严格在结束标记之前
fn marker_block(lines: &[&str]) -> Option<String> {
    let start = lines.iter().position(|line| line.trim() == JSON_START_MARKER)?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.trim() == JSON_END_MARKER)?
        + start
        + 1;
    Some(lines[start + 1..end].join("\n"))
}

/// 策略 2：倒序第一个完整的 `{...}` 行，只看这一行
fn trailing_json_line<'a>(lines: &[&'a str]) -> Option<&'a str> {
    lines
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| line.starts_with('{') && line.ends_with('}'))
}

fn parse_document(text: &str) -> Option<UpstreamDocument> {
    let value: JsonValue = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            debug!("JSON 解析失败，尝试下一策略: {}", e);
            return None;
        }
    };
    match UpstreamDocument::classify(value) {
        Some(document) => {
            debug!("识别到 {} 结构", document.schema_name());
            Some(document)
        }
        None => {
            debug!("JSON 结构无法识别，尝试下一策略");
            None
        }
    }
}

/// 策略 3：扫描 `key: value` 行
///
/// - 含冒号的行按逗号拆成若干段，每段在第一个冒号处拆成 key / value
/// - key 小写去空白后依次匹配 `trip`、`manifest`、`pro`
/// - trip / manifest 取第一次出现的值
/// - 每个 PRO 段取值开头的编号，生成一条记录
/// - 不含冒号但以 `PRO` 加数字开头的行，取 `PRO` 之后的编号
/// - 以 `{`、`[` 等开头的 JSON 片段行跳过
pub fn scan_text(output: &str) -> TextScan {
    let mut scan = TextScan {
        raw_output: output.to_string(),
        ..Default::default()
    };

    for line in output.lines().map(str::trim) {
        // JSON 片段不是 key:value 文本
        if line.is_empty() || line.starts_with(['{', '}', '[', '"']) {
            continue;
        }

        if !line.contains(':') {
            if let Some(id) = BARE_PRO_LINE.captures(line).and_then(|caps| caps.get(1)) {
                scan.pro_entries.push(TextProEntry {
                    pro_number: id.as_str().trim_end_matches('-').to_string(),
                    source_line: line.to_string(),
                });
            }
            continue;
        }

        for segment in line.split(',') {
            let Some((key, value)) = segment.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            if key.contains("trip") {
                scan.trip_number.get_or_insert_with(|| value.to_string());
            } else if key.contains("manifest") {
                scan.manifest_number.get_or_insert_with(|| value.to_string());
            } else if key.contains("pro") {
                if let Some(pro_number) = leading_identifier(value) {
                    scan.pro_entries.push(TextProEntry {
                        pro_number,
                        source_line: line.to_string(),
                    });
                }
            }
        }
    }

    scan
}

fn leading_identifier(value: &str) -> Option<String> {
    LEADING_IDENTIFIER
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('-').to_string())
        .filter(|id| !id.is_empty())
}
