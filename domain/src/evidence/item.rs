//! Evidence items and their idempotency key

use crate::core::category::Category;
use crate::core::rater::Rater;
use crate::core::subject::SubjectId;
use serde::{Deserialize, Serialize};

/// Width of each polarity's sequence-number block.
///
/// Cells for the same (subject, category, collector) but different polarity
/// allocate from disjoint ranges, so they can be collected concurrently
/// without contending for the same keys.
pub const SEQUENCE_BLOCK: u32 = 100_000;

/// Polarity bucket a collection cell asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Negative,
    Positive,
    /// Unconstrained: any stance is acceptable.
    Free,
}

impl Polarity {
    pub const ALL: [Polarity; 3] = [Polarity::Negative, Polarity::Positive, Polarity::Free];

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Negative => "negative",
            Polarity::Positive => "positive",
            Polarity::Free => "free",
        }
    }

    fn ordinal(&self) -> u32 {
        match self {
            Polarity::Negative => 1,
            Polarity::Positive => 2,
            Polarity::Free => 3,
        }
    }

    /// Sequence number for the `local`-th item (1-based) of this polarity's block.
    pub fn sequence(&self, local: u32) -> u32 {
        self.ordinal() * SEQUENCE_BLOCK + local
    }

    /// The polarity block a sequence number belongs to.
    pub fn from_sequence(sequence: u32) -> Option<Polarity> {
        match sequence / SEQUENCE_BLOCK {
            1 => Some(Polarity::Negative),
            2 => Some(Polarity::Positive),
            3 => Some(Polarity::Free),
            _ => None,
        }
    }

    /// Whether an item tagged with `stance` may fill a cell of this polarity.
    pub fn accepts(&self, stance: Stance) -> bool {
        match self {
            Polarity::Negative => stance == Stance::Negative,
            Polarity::Positive => stance == Stance::Positive,
            Polarity::Free => true,
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "negative" | "neg" => Ok(Polarity::Negative),
            "positive" | "pos" => Ok(Polarity::Positive),
            "free" | "any" | "unconstrained" => Ok(Polarity::Free),
            other => Err(format!("unknown polarity '{}'", other)),
        }
    }
}

/// The stance a provider tagged an individual item with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Negative,
    Positive,
    Neutral,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Negative => "negative",
            Stance::Positive => "positive",
            Stance::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "negative" | "neg" | "-" => Ok(Stance::Negative),
            "positive" | "pos" | "+" => Ok(Stance::Positive),
            "neutral" | "mixed" | "0" => Ok(Stance::Neutral),
            other => Err(format!("unknown stance '{}'", other)),
        }
    }
}

/// Where a piece of evidence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceClass {
    /// Official records, primary documents, the subject's own statements.
    Official,
    /// News coverage, commentary, secondary reporting.
    Public,
}

impl SourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceClass::Official => "official",
            SourceClass::Public => "public",
        }
    }
}

impl std::fmt::Display for SourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "official" | "primary" | "official/primary" => Ok(SourceClass::Official),
            "public" | "secondary" | "public/secondary" | "news" => Ok(SourceClass::Public),
            other => Err(format!("unknown source class '{}'", other)),
        }
    }
}

/// Natural key of an evidence item: `(subject, category, collector, sequence)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub subject: SubjectId,
    pub category: Category,
    pub collector: Rater,
    pub sequence: u32,
}

impl ItemKey {
    pub fn new(
        subject: SubjectId,
        category: Category,
        collector: Rater,
        sequence: u32,
    ) -> Self {
        Self {
            subject,
            category,
            collector,
            sequence,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.subject, self.category, self.collector, self.sequence
        )
    }
}

/// One unit of evidence about a subject in one category.
///
/// Immutable once created; pooled ratings live in separate
/// [`EvaluationRecord`](super::evaluation::EvaluationRecord)s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub key: ItemKey,
    pub title: String,
    pub body: String,
    /// Free-form source descriptor (URL, document name, outlet)
    pub source: String,
    pub source_class: SourceClass,
    /// The bucket of the cell that collected this item
    pub polarity: Polarity,
    /// The stance the collector tagged the item with
    pub stance: Stance,
    /// Milliseconds since epoch
    pub collected_at: u64,
    /// Rating the collector attached at collection time (raw, unnormalized)
    pub self_rating: Option<String>,
}

impl EvidenceItem {
    pub fn collector(&self) -> &Rater {
        &self.key.collector
    }

    pub fn category(&self) -> &Category {
        &self.key.category
    }
}
