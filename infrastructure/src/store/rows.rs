//! Row <-> domain conversions
//!
//! Rows are read as raw column values first and converted afterwards, so a
//! bad enum string surfaces as `StoreError::Corrupt` instead of a panic
//! inside the row callback.

use assay_application::ports::evidence_store::{StoreError, UnavailablePair};
use assay_domain::{
    CanonicalRating, Category, EvaluationRecord, EvidenceItem, ItemKey, Polarity, Rater,
    RatingScale, SourceClass, Stance, SubjectId,
};
use rusqlite::Row;

pub(crate) const ITEM_COLUMNS: &str = "subject, category, collector, sequence, title, body, \
     source, source_class, polarity, stance, collected_at, self_rating";

pub(crate) const EVALUATION_COLUMNS: &str = "subject, category, collector, sequence, evaluator, \
     raw_rating, scale, rating, rationale, evaluated_at";

pub(crate) const UNAVAILABLE_COLUMNS: &str =
    "subject, category, collector, sequence, evaluator, reason, recorded_at";

fn corrupt(what: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{}: {}", what, e))
}

fn key(subject: String, category: String, collector: String, sequence: u32) -> ItemKey {
    ItemKey::new(
        SubjectId::new(subject),
        Category::new(category),
        Rater::from(collector.as_str()),
        sequence,
    )
}

pub(crate) struct ItemRow {
    subject: String,
    category: String,
    collector: String,
    sequence: u32,
    title: String,
    body: String,
    source: String,
    source_class: String,
    polarity: String,
    stance: String,
    collected_at: i64,
    self_rating: Option<String>,
}

impl ItemRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject: row.get(0)?,
            category: row.get(1)?,
            collector: row.get(2)?,
            sequence: row.get(3)?,
            title: row.get(4)?,
            body: row.get(5)?,
            source: row.get(6)?,
            source_class: row.get(7)?,
            polarity: row.get(8)?,
            stance: row.get(9)?,
            collected_at: row.get(10)?,
            self_rating: row.get(11)?,
        })
    }

    pub(crate) fn into_item(self) -> Result<EvidenceItem, StoreError> {
        Ok(EvidenceItem {
            source_class: self
                .source_class
                .parse::<SourceClass>()
                .map_err(|e| corrupt("source_class", e))?,
            polarity: self
                .polarity
                .parse::<Polarity>()
                .map_err(|e| corrupt("polarity", e))?,
            stance: self
                .stance
                .parse::<Stance>()
                .map_err(|e| corrupt("stance", e))?,
            key: key(self.subject, self.category, self.collector, self.sequence),
            title: self.title,
            body: self.body,
            source: self.source,
            collected_at: self.collected_at.max(0) as u64,
            self_rating: self.self_rating,
        })
    }
}

pub(crate) struct EvaluationRow {
    subject: String,
    category: String,
    collector: String,
    sequence: u32,
    evaluator: String,
    raw_rating: String,
    scale: String,
    rating: i8,
    rationale: String,
    evaluated_at: i64,
}

impl EvaluationRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject: row.get(0)?,
            category: row.get(1)?,
            collector: row.get(2)?,
            sequence: row.get(3)?,
            evaluator: row.get(4)?,
            raw_rating: row.get(5)?,
            scale: row.get(6)?,
            rating: row.get(7)?,
            rationale: row.get(8)?,
            evaluated_at: row.get(9)?,
        })
    }

    pub(crate) fn into_record(self) -> Result<EvaluationRecord, StoreError> {
        Ok(EvaluationRecord {
            scale: self
                .scale
                .parse::<RatingScale>()
                .map_err(|e| corrupt("scale", e))?,
            rating: CanonicalRating::try_from(self.rating).map_err(|e| corrupt("rating", e))?,
            evaluator: Rater::from(self.evaluator.as_str()),
            item: key(self.subject, self.category, self.collector, self.sequence),
            raw_rating: self.raw_rating,
            rationale: self.rationale,
            evaluated_at: self.evaluated_at.max(0) as u64,
        })
    }
}

pub(crate) fn read_unavailable(row: &Row<'_>) -> rusqlite::Result<UnavailablePair> {
    let subject: String = row.get(0)?;
    let category: String = row.get(1)?;
    let collector: String = row.get(2)?;
    let sequence: u32 = row.get(3)?;
    let evaluator: String = row.get(4)?;
    let recorded_at: i64 = row.get(6)?;
    Ok(UnavailablePair {
        item: key(subject, category, collector, sequence),
        evaluator: Rater::from(evaluator.as_str()),
        reason: row.get(5)?,
        recorded_at: recorded_at.max(0) as u64,
    })
}
