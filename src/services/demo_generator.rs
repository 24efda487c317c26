//! 演示数据生成 - 业务能力层
//!
//! 处理器不可用时生成一份看起来合理的运单异常结果。
//! 随机源由调用方注入，固定种子时输出完全确定，便于测试。

use phf::phf_map;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::{ExceptionRecord, ExceptionType, ManifestInfo};

const EXCEPTION_TYPES: [ExceptionType; 3] = [
    ExceptionType::Shortage,
    ExceptionType::Overage,
    ExceptionType::Damage,
];

const DESCRIPTIONS: &[&str] = &[
    "AUTOMOTIVE PARTS",
    "ELECTRONICS EQUIPMENT",
    "FURNITURE ITEMS",
    "MEDICAL SUPPLIES",
    "CONSTRUCTION TOOLS",
    "OFFICE SUPPLIES",
    "FOOD PRODUCTS",
    "GLASS MATERIALS",
    "TEXTILE GOODS",
    "MACHINERY PARTS",
];

const PRO_PREFIXES: &[&str] = &["PRO", "BL", "AWB"];

const SHORTAGE_NOTES: &[&str] = &[
    "Missing boxes confirmed by driver",
    "Pallet not found at origin",
    "Items not loaded - verified with manifest",
    "Short count verified by receiving dock",
    "Partial shipment - balance to follow",
    "1 skid short from manifest count",
];

const OVERAGE_NOTES: &[&str] = &[
    "Extra pallets found in trailer",
    "Additional items discovered during unload",
    "Surplus shipment from previous load",
    "Extra boxes not on manifest",
    "Overage items segregated for investigation",
];

const DAMAGE_NOTES: &[&str] = &[
    "Water damage from roof leak",
    "Torn packaging - contents intact",
    "Broken items due to shifting load",
    "Crushed boxes on bottom of stack",
    "Punctured packaging - partial loss",
    "Forklift damage during unloading",
];

const SHORTAGE_MARKUPS: &[&[&str]] = &[
    &["MISSING", "SHORT"],
    &["NOT FOUND", "-1"],
    &["SHORTAGE CONFIRMED"],
    &["X", "MISSING"],
    &["SHORT COUNT", "VERIFIED"],
];

const OVERAGE_MARKUPS: &[&[&str]] = &[
    &["EXTRA", "SURPLUS"],
    &["+1", "OVERAGE"],
    &["ADDITIONAL ITEMS"],
    &["OVERAGE", "HOLD"],
    &["EXTRA PALLETS"],
];

const DAMAGE_MARKUPS: &[&[&str]] = &[
    &["DAMAGED", "INSPECT"],
    &["BROKEN", "SALVAGE"],
    &["WET", "DAMAGED"],
    &["TORN PKG", "DAMAGED"],
    &["UNUSABLE", "DAMAGED"],
];

/// 异常类型 -> 备注
static EXCEPTION_NOTES: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "shortage" => SHORTAGE_NOTES,
    "overage" => OVERAGE_NOTES,
    "damage" => DAMAGE_NOTES,
};

/// 异常类型 -> 手写标注组合
static MARKUP_NOTATIONS: phf::Map<&'static str, &'static [&'static [&'static str]]> = phf_map! {
    "shortage" => SHORTAGE_MARKUPS,
    "overage" => OVERAGE_MARKUPS,
    "damage" => DAMAGE_MARKUPS,
};

const DEFAULT_NOTE: &str = "Exception noted by receiving team";
const DEFAULT_MARKUP: &str = "NOTED";

/// 生成的演示运单
#[derive(Debug, Clone, PartialEq)]
pub struct DemoManifest {
    pub manifest: ManifestInfo,
    pub exceptions: Vec<ExceptionRecord>,
}

/// 演示数据生成器
pub struct DemoGenerator<R: Rng = StdRng> {
    rng: R,
}

impl DemoGenerator<StdRng> {
    /// 固定种子，输出可复现
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 有种子用种子，没有则取系统熵
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> DemoGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// 生成一份运单及其异常
    ///
    /// 实到货件数在应到数上下浮动；有差异时（或三分之一概率）产生 1~4 条异常
    pub fn generate(&mut self) -> DemoManifest {
        let expected_shipments: u32 = self.rng.gen_range(8..=25);
        let actual_shipments = expected_shipments
            .saturating_add_signed(self.rng.gen_range(-3..=2));

        let variance = expected_shipments.abs_diff(actual_shipments);
        let has_exceptions = variance != 0 || self.rng.gen_ratio(1, 3);

        let exceptions = if has_exceptions {
            let count = self.rng.gen_range(1..=(variance + 1).min(4));
            (0..count).map(|_| self.exception()).collect()
        } else {
            Vec::new()
        };

        let manifest = ManifestInfo {
            trip_number: self.rng.gen_range(2_000_000..=9_999_999u32).to_string(),
            manifest_number: format!("MF-2024-{:03}", self.rng.gen_range(1..=999)),
            trailer_number: format!("TRL-{}", self.rng.gen_range(1000..=9999)),
            expected_shipments,
            actual_shipments,
            expected_handling_units: expected_shipments + self.rng.gen_range(0..=10),
            actual_handling_units: actual_shipments + self.rng.gen_range(0..=10),
        };

        DemoManifest {
            manifest,
            exceptions,
        }
    }

    fn exception(&mut self) -> ExceptionRecord {
        let kind = *EXCEPTION_TYPES.choose(&mut self.rng).unwrap_or(&ExceptionType::Shortage);
        let prefix = PRO_PREFIXES.choose(&mut self.rng).copied().unwrap_or("PRO");
        let pro_number = format!("{}{}", prefix, self.rng.gen_range(100_000..=999_999));
        let description = DESCRIPTIONS.choose(&mut self.rng).copied().unwrap_or("GENERAL FREIGHT");

        ExceptionRecord {
            pro_number,
            kind,
            description: description.to_string(),
            expected_pieces: self.rng.gen_range(1..=10),
            actual_pieces: self.rng.gen_range(0..=12),
            weight: self.rng.gen_range(25..=2500),
            notes: self.note(kind),
            markups: self.markups(kind),
        }
    }

    fn note(&mut self, kind: ExceptionType) -> String {
        EXCEPTION_NOTES
            .get(kind.as_str())
            .and_then(|notes| notes.choose(&mut self.rng))
            .copied()
            .unwrap_or(DEFAULT_NOTE)
            .to_string()
    }

    fn markups(&mut self, kind: ExceptionType) -> Vec<String> {
        MARKUP_NOTATIONS
            .get(kind.as_str())
            .and_then(|sets| sets.choose(&mut self.rng))
            .map(|set| set.iter().map(|m| m.to_string()).collect())
            .unwrap_or_else(|| vec![DEFAULT_MARKUP.to_string()])
    }
}
