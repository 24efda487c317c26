//! 结果规范化 - 业务能力层
//!
//! 把任意恢复路径得到的数据映射为唯一的 [`CanonicalResult`]：
//! - 嵌套结构：过滤掉 `ok` 货件，汇总由异常列表重新统计
//! - 规范结构：字段直通，仅在缺失时补时间戳
//! - 文本扫描：trip / manifest / PRO 行组装成未分类异常
//! - 无可用数据：由 [`DemoGenerator`] 生成演示结果，并在 `note` 中说明原因
//!
//! 除时间戳外，本模块的所有函数都是纯函数。

use rand::Rng;
use tracing::{debug, warn};

use crate::infrastructure::InvokeError;
use crate::models::upstream::{CanonicalDocument, NestedDocument, Shipment, UpstreamSummary};
use crate::models::{
    CanonicalResult, ExceptionRecord, ExceptionType, ManifestInfo, ProcessMode, Provenance,
    ResultStatus, Summary, UpstreamDocument, UNKNOWN,
};
use crate::services::demo_generator::DemoGenerator;
use crate::services::output_parser::{RecoveredPayload, TextScan};

const STRUCTURED_MESSAGE: &str = "Manifest processed successfully";
const TEXT_MESSAGE: &str = "Manifest processed; details recovered from plain-text output";
const SYNTHETIC_MESSAGE: &str = "Processor unavailable; showing demo data";
const TEXT_EXCEPTION_DESCRIPTION: &str = "Extracted from processor output";
const TEXT_NOTE: &str = "Structured output not found; fields were scanned from plain text";

/// 与上传相关、但不来自处理器输出的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultContext {
    pub filename: String,
    pub mode: ProcessMode,
    pub file_size: u64,
}

impl ResultContext {
    pub fn new(filename: impl Into<String>, mode: ProcessMode, file_size: u64) -> Self {
        Self {
            filename: filename.into(),
            mode,
            file_size,
        }
    }
}

/// 走演示数据路径的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Timeout { after_secs: u64 },
    ExecutableMissing { program: String },
    ExitFailure { code: Option<i32> },
    LaunchFailed { detail: String },
    UnparseableOutput,
}

impl FallbackReason {
    /// 写入结果 `note` 的说明
    pub fn note(&self) -> String {
        let cause = match self {
            FallbackReason::Timeout { after_secs } => {
                format!("the processor timed out after {} seconds", after_secs)
            }
            FallbackReason::ExecutableMissing { program } => {
                format!("the processor executable was not found ({})", program)
            }
            FallbackReason::ExitFailure { code: Some(code) } => {
                format!("the processor exited with code {}", code)
            }
            FallbackReason::ExitFailure { code: None } => {
                "the processor was terminated by a signal".to_string()
            }
            FallbackReason::LaunchFailed { detail } => {
                format!("the processor could not be run ({})", detail)
            }
            FallbackReason::UnparseableOutput => {
                "the processor output could not be parsed".to_string()
            }
        };
        format!("Real processing was unavailable: {}. Showing demo data.", cause)
    }
}

impl From<&InvokeError> for FallbackReason {
    fn from(err: &InvokeError) -> Self {
        match err {
            InvokeError::ExecutableMissing { program } => FallbackReason::ExecutableMissing {
                program: program.clone(),
            },
            InvokeError::Timeout { after } => FallbackReason::Timeout {
                after_secs: after.as_secs(),
            },
            InvokeError::LaunchFailed { source } | InvokeError::Io { source } => {
                FallbackReason::LaunchFailed {
                    detail: source.to_string(),
                }
            }
        }
    }
}

/// 把恢复出的数据映射为规范结果
pub fn normalize(payload: RecoveredPayload, ctx: &ResultContext) -> CanonicalResult {
    let strategy = payload.strategy();
    let result = match payload {
        RecoveredPayload::Structured {
            document: UpstreamDocument::Nested(doc),
            ..
        } => from_nested(doc, ctx),
        RecoveredPayload::Structured {
            document: UpstreamDocument::Canonical(doc),
            ..
        } => from_canonical(doc, ctx),
        RecoveredPayload::Text(scan) => from_text(scan, ctx),
    };
    debug!(
        "规范化完成: strategy={}, exceptions={}",
        strategy.as_str(),
        result.exceptions.len()
    );
    result
}

/// 生成演示结果
pub fn synthesize<R: Rng>(
    reason: &FallbackReason,
    ctx: &ResultContext,
    generator: &mut DemoGenerator<R>,
) -> CanonicalResult {
    let demo = generator.generate();
    let summary = Summary::tally(&demo.exceptions);
    CanonicalResult {
        status: ResultStatus::Success,
        filename: ctx.filename.clone(),
        process_type: ctx.mode,
        message: SYNTHETIC_MESSAGE.to_string(),
        manifest: demo.manifest,
        exceptions: demo.exceptions,
        summary,
        note: reason.note(),
        timestamp: CanonicalResult::now_timestamp(),
        source: Provenance::SyntheticDemo,
        processor_source: None,
        file_size: ctx.file_size,
        processing_time: String::new(),
        raw_output: None,
    }
}

fn from_nested(doc: NestedDocument, ctx: &ResultContext) -> CanonicalResult {
    let general = doc.output.general;
    let exceptions: Vec<ExceptionRecord> = general
        .shipments
        .into_iter()
        .filter(|shipment| !shipment.is_ok())
        .map(shipment_to_exception)
        .collect();

    let summary = Summary::tally(&exceptions);
    if !upstream_counts_match(&general.summary, &summary) {
        warn!(
            "⚠️ 上游汇总与异常列表不一致: 上游 短缺{}/多货{}/破损{}, 重算 短缺{}/多货{}/破损{}",
            general.summary.total_shortages,
            general.summary.total_overages,
            general.summary.total_damages,
            summary.shortages,
            summary.overages,
            summary.damages
        );
    }

    CanonicalResult {
        status: ResultStatus::Success,
        filename: ctx.filename.clone(),
        process_type: ctx.mode,
        message: STRUCTURED_MESSAGE.to_string(),
        manifest: general.manifest_info,
        exceptions,
        summary,
        note: String::new(),
        timestamp: CanonicalResult::now_timestamp(),
        source: Provenance::StructuredJson,
        processor_source: None,
        file_size: ctx.file_size,
        processing_time: String::new(),
        raw_output: None,
    }
}

fn shipment_to_exception(shipment: Shipment) -> ExceptionRecord {
    ExceptionRecord {
        kind: ExceptionType::from_label(&shipment.exception_type),
        pro_number: shipment.pro_number,
        description: shipment.description,
        expected_pieces: shipment.expected_pieces,
        actual_pieces: shipment.actual_pieces,
        weight: shipment.weight,
        notes: shipment.handwritten_notes.unwrap_or_default(),
        markups: shipment.markup_notations,
    }
}

fn upstream_counts_match(upstream: &UpstreamSummary, recomputed: &Summary) -> bool {
    upstream.total_shortages == recomputed.shortages
        && upstream.total_overages == recomputed.overages
        && upstream.total_damages == recomputed.damages
}

fn from_canonical(doc: CanonicalDocument, ctx: &ResultContext) -> CanonicalResult {
    if !doc.summary.is_consistent_with(&doc.exceptions) {
        warn!(
            "⚠️ 处理器给出的汇总与异常列表不一致 (totalExceptions={}, 实际 {} 条)，按原样保留",
            doc.summary.total_exceptions,
            doc.exceptions.len()
        );
    }

    CanonicalResult {
        status: doc.status,
        filename: doc.filename.unwrap_or_else(|| ctx.filename.clone()),
        process_type: ctx.mode,
        message: doc.message.unwrap_or_else(|| STRUCTURED_MESSAGE.to_string()),
        manifest: doc.manifest,
        exceptions: doc.exceptions,
        summary: doc.summary,
        note: doc.note.unwrap_or_default(),
        timestamp: doc
            .timestamp
            .filter(|ts| !ts.trim().is_empty())
            .unwrap_or_else(CanonicalResult::now_timestamp),
        source: Provenance::StructuredJson,
        processor_source: doc.source,
        file_size: ctx.file_size,
        processing_time: doc.processing_time.unwrap_or_default(),
        raw_output: None,
    }
}

fn from_text(scan: TextScan, ctx: &ResultContext) -> CanonicalResult {
    let exceptions: Vec<ExceptionRecord> = scan
        .pro_entries
        .into_iter()
        .map(|entry| ExceptionRecord {
            pro_number: entry.pro_number,
            kind: ExceptionType::Unknown,
            description: TEXT_EXCEPTION_DESCRIPTION.to_string(),
            notes: entry.source_line,
            ..Default::default()
        })
        .collect();

    // 没有 PRO 行时按一票货计
    let shipments = if exceptions.is_empty() {
        1
    } else {
        exceptions.len() as u32
    };
    let manifest = ManifestInfo {
        trip_number: scan.trip_number.unwrap_or_else(|| UNKNOWN.to_string()),
        manifest_number: scan.manifest_number.unwrap_or_else(|| UNKNOWN.to_string()),
        trailer_number: UNKNOWN.to_string(),
        expected_shipments: shipments,
        actual_shipments: shipments,
        expected_handling_units: 0,
        actual_handling_units: 0,
    };
    let summary = Summary::tally(&exceptions);

    CanonicalResult {
        status: ResultStatus::Success,
        filename: ctx.filename.clone(),
        process_type: ctx.mode,
        message: TEXT_MESSAGE.to_string(),
        manifest,
        exceptions,
        summary,
        note: TEXT_NOTE.to_string(),
        timestamp: CanonicalResult::now_timestamp(),
        source: Provenance::TextFallback,
        processor_source: None,
        file_size: ctx.file_size,
        processing_time: String::new(),
        raw_output: Some(scan.raw_output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::output_parser::recover;
    use std::time::Duration;

    fn ctx() -> ResultContext {
        ResultContext::new("manifest.pdf", ProcessMode::Synchronous, 2048)
    }

    fn without_timestamp(mut result: CanonicalResult) -> CanonicalResult {
        result.timestamp.clear();
        result
    }

    fn assert_summary_invariants(result: &CanonicalResult) {
        let unknown = result
            .exceptions
            .iter()
            .filter(|e| e.kind == ExceptionType::Unknown)
            .count() as u32;
        let summary = result.summary;
        assert_eq!(summary.total_exceptions as usize, result.exceptions.len());
        assert_eq!(
            summary.shortages + summary.overages + summary.damages + unknown,
            summary.total_exceptions
        );
    }

    const NESTED_PRETTY: &str = r#"{"output":{"general":{
        "manifestInfo":{"tripNumber":"7654321","manifestNumber":"MF-2024-042","trailerNumber":"TRL-88",
                        "expectedShipments":3,"actualShipments":2,"expectedHandlingUnits":5,"actualHandlingUnits":4},
        "shipments":[
            {"proNumber":"PRO100001","expectedPieces":4,"actualPieces":3,"weight":420,"description":"AUTOMOTIVE PARTS",
             "exceptionType":"shortage","markupNotations":["SHORT"],"handwrittenNotes":"1 box missing"},
            {"proNumber":"PRO100002","expectedPieces":1,"actualPieces":1,"weight":50,"description":"OFFICE SUPPLIES",
             "exceptionType":"ok","markupNotations":[]},
            {"proNumber":"BL100003","expectedPieces":2,"actualPieces":2,"weight":300,"description":"GLASS MATERIALS",
             "exceptionType":"Damage","markupNotations":["BROKEN"]}
        ],
        "summary":{"totalOverages":0,"totalShortages":1,"totalDamages":1,"hasOSDNotation":true}
    }}}"#;

    /// 处理器输出的是单行 JSON
    fn nested() -> String {
        NESTED_PRETTY.replace('\n', " ")
    }

    #[test]
    fn test_nested_skips_ok_shipments() {
        let payload = recover(&nested()).unwrap();
        let result = normalize(payload, &ctx());

        assert_eq!(result.source, Provenance::StructuredJson);
        assert_eq!(result.manifest.trip_number, "7654321");
        assert_eq!(result.manifest.trailer_number, "TRL-88");
        assert_eq!(result.exceptions.len(), 2);

        let first = &result.exceptions[0];
        assert_eq!(first.pro_number, "PRO100001");
        assert_eq!(first.kind, ExceptionType::Shortage);
        assert_eq!(first.notes, "1 box missing");
        assert_eq!(first.markups, vec!["SHORT"]);

        let second = &result.exceptions[1];
        assert_eq!(second.kind, ExceptionType::Damage);
        assert_eq!(second.notes, "");

        assert_eq!(result.summary.shortages, 1);
        assert_eq!(result.summary.damages, 1);
        assert!(result.summary.has_osd_notation);
        assert_summary_invariants(&result);
    }

    #[test]
    fn test_nested_summary_is_recomputed() {
        let stdout = nested().replace(r#""totalShortages":1"#, r#""totalShortages":9"#);
        let result = normalize(recover(&stdout).unwrap(), &ctx());
        assert_eq!(result.summary.shortages, 1);
        assert_eq!(result.summary.total_exceptions, 2);
    }

    #[test]
    fn test_canonical_passthrough_keeps_fields() {
        let stdout = r#"{"status":"success","filename":"upstream.pdf","manifest":{"tripNumber":"1111111"},
            "exceptions":[{"proNumber":"AWB1","type":"overage"}],
            "summary":{"totalExceptions":1,"overages":1,"hasOSDNotation":true},
            "timestamp":"2024-05-01T10:00:00Z","source":"local_swift_processor"}"#
            .replace('\n', " ");
        let result = normalize(recover(&stdout).unwrap(), &ctx());

        assert_eq!(result.filename, "upstream.pdf");
        assert_eq!(result.timestamp, "2024-05-01T10:00:00Z");
        assert_eq!(result.processor_source.as_deref(), Some("local_swift_processor"));
        assert_eq!(result.source, Provenance::StructuredJson);
        assert_eq!(result.summary.overages, 1);
        assert_eq!(result.manifest.manifest_number, UNKNOWN);
    }

    #[test]
    fn test_canonical_passthrough_fills_missing_timestamp() {
        let stdout = r#"{"manifest":{"tripNumber":"1"},"exceptions":[],"summary":{}}"#;
        let result = normalize(recover(stdout).unwrap(), &ctx());
        assert!(!result.timestamp.is_empty());
        assert_eq!(result.filename, "manifest.pdf");
        assert_eq!(result.summary, Summary::default());
    }

    #[test]
    fn test_text_scan_result() {
        let stdout = "Trip: 1234567, Manifest: MF-2024-001\nPRO123456 - SHORTAGE - 5 PIECES MISSING";
        let result = normalize(recover(stdout).unwrap(), &ctx());

        assert_eq!(result.source, Provenance::TextFallback);
        assert_eq!(result.manifest.trip_number, "1234567");
        assert_eq!(result.manifest.manifest_number, "MF-2024-001");
        assert_eq!(result.exceptions.len(), 1);
        assert_eq!(result.exceptions[0].pro_number, "123456");
        assert_eq!(result.exceptions[0].kind, ExceptionType::Unknown);
        assert_eq!(
            result.exceptions[0].notes,
            "PRO123456 - SHORTAGE - 5 PIECES MISSING"
        );
        assert_eq!(result.raw_output.as_deref(), Some(stdout));
        assert_summary_invariants(&result);
    }

    #[test]
    fn test_text_scan_without_pro_lines_counts_one_shipment() {
        let result = normalize(recover("Trip: 1234567\nManifest: MF-1").unwrap(), &ctx());

        assert_eq!(result.source, Provenance::TextFallback);
        assert!(result.exceptions.is_empty());
        assert_eq!(result.manifest.expected_shipments, 1);
        assert_eq!(result.manifest.actual_shipments, 1);
        assert_eq!(result.summary, Summary::default());
    }

    #[test]
    fn test_canonical_null_fields_use_defaults() {
        let stdout = r#"{"status":null,"manifest":{"tripNumber":"77"},"exceptions":[{"proNumber":"P1","type":"damage","notes":null,"markups":null},{"proNumber":"P2","type":null}],"summary":{"totalExceptions":"2","damages":1,"shortages":null,"hasOSDNotation":null}}"#;
        let result = normalize(recover(stdout).unwrap(), &ctx());

        assert_eq!(result.source, Provenance::StructuredJson);
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.manifest.trip_number, "77");
        assert_eq!(result.exceptions[0].kind, ExceptionType::Damage);
        assert_eq!(result.exceptions[0].notes, "");
        assert!(result.exceptions[0].markups.is_empty());
        assert_eq!(result.exceptions[1].kind, ExceptionType::Unknown);
        assert_eq!(result.summary.total_exceptions, 2);
        assert_eq!(result.summary.shortages, 0);
        assert!(!result.summary.has_osd_notation);
    }

    #[test]
    fn test_nested_null_markups_use_defaults() {
        let stdout = r#"{"output":{"general":{"manifestInfo":{"tripNumber":"5"},"shipments":[{"proNumber":"BL9","exceptionType":"shortage","markupNotations":null,"handwrittenNotes":null}],"summary":null}}}"#;
        let result = normalize(recover(stdout).unwrap(), &ctx());

        assert_eq!(result.source, Provenance::StructuredJson);
        assert_eq!(result.exceptions.len(), 1);
        assert!(result.exceptions[0].markups.is_empty());
        assert_eq!(result.exceptions[0].notes, "");
        assert_eq!(result.summary.shortages, 1);
    }

    #[test]
    fn test_normalize_is_idempotent_apart_from_timestamp() {
        for stdout in [nested(), "Trip: 42\nPRO: 77 damaged".to_string()] {
            let first = normalize(recover(&stdout).unwrap(), &ctx());
            let second = normalize(recover(&stdout).unwrap(), &ctx());
            assert_eq!(without_timestamp(first), without_timestamp(second));
        }
    }

    #[test]
    fn test_synthesize_is_deterministic_for_seed() {
        let reason = FallbackReason::Timeout { after_secs: 1 };
        let first = synthesize(&reason, &ctx(), &mut DemoGenerator::seeded(11));
        let second = synthesize(&reason, &ctx(), &mut DemoGenerator::seeded(11));

        assert_eq!(first.source, Provenance::SyntheticDemo);
        assert_eq!(first.status, ResultStatus::Success);
        assert!(first.note.contains("timed out after 1 seconds"));
        assert_eq!(first.file_size, 2048);
        assert_summary_invariants(&first);
        assert_eq!(without_timestamp(first), without_timestamp(second));
    }

    #[test]
    fn test_fallback_reason_from_invoke_error() {
        let timeout = InvokeError::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(
            FallbackReason::from(&timeout),
            FallbackReason::Timeout { after_secs: 30 }
        );

        let missing = InvokeError::ExecutableMissing {
            program: "manifest-processor".to_string(),
        };
        let reason = FallbackReason::from(&missing);
        assert!(reason.note().contains("not found (manifest-processor)"));

        let exit = FallbackReason::ExitFailure { code: Some(2) };
        assert!(exit.note().contains("exited with code 2"));
    }
}
