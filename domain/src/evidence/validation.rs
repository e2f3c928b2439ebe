//! Candidate validation for one collection cell.

use super::item::{Polarity, SourceClass, Stance};
use super::parsing::EvidenceCandidate;
use crate::core::error::ValidationError;
use crate::core::string::normalize_title;
use std::collections::HashSet;

/// A candidate that passed every check, ready to be keyed and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCandidate {
    /// Position in the provider payload
    pub index: usize,
    pub title: String,
    pub body: String,
    pub source: String,
    pub source_class: SourceClass,
    pub stance: Stance,
    pub self_rating: Option<String>,
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// In payload order, at most `count` entries
    pub accepted: Vec<ValidCandidate>,
    pub rejected: Vec<ValidationError>,
}

/// Validate the candidates returned for a cell.
///
/// Checks, in order: non-empty title and body, a stance tag the cell's
/// polarity accepts, a recognised source class (missing means public), no
/// repeated provider sequence number, no title already present in
/// `existing_titles` (normalised) or earlier in the payload. Valid
/// candidates beyond `count` are rejected as over quota.
pub fn validate_candidates(
    candidates: &[EvidenceCandidate],
    polarity: Polarity,
    count: usize,
    existing_titles: &HashSet<String>,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let mut seen_sequences = HashSet::new();
    let mut seen_titles = HashSet::new();

    for candidate in candidates {
        match check_candidate(
            candidate,
            polarity,
            existing_titles,
            &mut seen_sequences,
            &mut seen_titles,
        ) {
            Ok(valid) if outcome.accepted.len() < count => outcome.accepted.push(valid),
            Ok(_) => outcome.rejected.push(ValidationError::OverQuota {
                index: candidate.index,
                count,
            }),
            Err(e) => outcome.rejected.push(e),
        }
    }

    outcome
}

fn check_candidate(
    candidate: &EvidenceCandidate,
    polarity: Polarity,
    existing_titles: &HashSet<String>,
    seen_sequences: &mut HashSet<u32>,
    seen_titles: &mut HashSet<String>,
) -> Result<ValidCandidate, ValidationError> {
    let index = candidate.index;

    if candidate.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle { index });
    }
    if candidate.body.trim().is_empty() {
        return Err(ValidationError::EmptyBody { index });
    }

    let tag = candidate
        .stance
        .as_deref()
        .ok_or(ValidationError::MissingPolarity { index })?;
    let stance: Stance = tag.parse().map_err(|_| ValidationError::UnknownPolarity {
        index,
        tag: tag.to_string(),
    })?;
    if !polarity.accepts(stance) {
        return Err(ValidationError::PolarityMismatch {
            index,
            expected: polarity.to_string(),
            found: stance.to_string(),
        });
    }

    let source_class = match candidate.source_class.as_deref() {
        None => SourceClass::Public,
        Some(tag) => tag
            .parse()
            .map_err(|_| ValidationError::UnknownSourceClass {
                index,
                tag: tag.to_string(),
            })?,
    };

    if let Some(sequence) = candidate.sequence
        && !seen_sequences.insert(sequence)
    {
        return Err(ValidationError::DuplicateSequence { index, sequence });
    }

    let normalized = normalize_title(&candidate.title);
    if existing_titles.contains(&normalized) || !seen_titles.insert(normalized) {
        return Err(ValidationError::DuplicateContent {
            index,
            title: candidate.title.trim().to_string(),
        });
    }

    Ok(ValidCandidate {
        index,
        title: candidate.title.trim().to_string(),
        body: candidate.body.trim().to_string(),
        source: candidate.source.trim().to_string(),
        source_class,
        stance,
        self_rating: candidate.rating.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, title: &str, stance: Option<&str>) -> EvidenceCandidate {
        EvidenceCandidate {
            index,
            title: title.to_string(),
            body: format!("body of {}", title),
            source: "example.org".to_string(),
            stance: stance.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_matching_polarity() {
        let items = vec![
            candidate(1, "a", Some("negative")),
            candidate(2, "b", Some("negative")),
        ];
        let out = validate_candidates(&items, Polarity::Negative, 5, &HashSet::new());
        assert_eq!(out.accepted.len(), 2);
        assert!(out.rejected.is_empty());
        assert_eq!(out.accepted[0].source_class, SourceClass::Public);
    }

    #[test]
    fn test_rejects_missing_and_mismatched_polarity() {
        let items = vec![
            candidate(1, "a", None),
            candidate(2, "b", Some("positive")),
            candidate(3, "c", Some("sideways")),
        ];
        let out = validate_candidates(&items, Polarity::Negative, 5, &HashSet::new());
        assert!(out.accepted.is_empty());
        assert_eq!(out.rejected[0], ValidationError::MissingPolarity { index: 1 });
        assert!(matches!(out.rejected[1], ValidationError::PolarityMismatch { index: 2, .. }));
        assert!(matches!(out.rejected[2], ValidationError::UnknownPolarity { index: 3, .. }));
    }

    #[test]
    fn test_free_cell_accepts_any_stance() {
        let items = vec![
            candidate(1, "a", Some("neutral")),
            candidate(2, "b", Some("positive")),
            candidate(3, "c", Some("negative")),
        ];
        let out = validate_candidates(&items, Polarity::Free, 5, &HashSet::new());
        assert_eq!(out.accepted.len(), 3);
    }

    #[test]
    fn test_rejects_empty_fields() {
        let mut no_body = candidate(2, "b", Some("neutral"));
        no_body.body = "  ".to_string();
        let items = vec![candidate(1, " ", Some("neutral")), no_body];
        let out = validate_candidates(&items, Polarity::Free, 5, &HashSet::new());
        assert_eq!(
            out.rejected,
            vec![
                ValidationError::EmptyTitle { index: 1 },
                ValidationError::EmptyBody { index: 2 }
            ]
        );
    }

    #[test]
    fn test_rejects_duplicate_sequence_in_cell() {
        let mut a = candidate(1, "a", Some("neutral"));
        a.sequence = Some(7);
        let mut b = candidate(2, "b", Some("neutral"));
        b.sequence = Some(7);
        let out = validate_candidates(&[a, b], Polarity::Free, 5, &HashSet::new());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(
            out.rejected,
            vec![ValidationError::DuplicateSequence { index: 2, sequence: 7 }]
        );
    }

    #[test]
    fn test_rejects_duplicate_content() {
        let existing: HashSet<String> = [normalize_title("Old Story")].into_iter().collect();
        let items = vec![
            candidate(1, "old story!", Some("neutral")),
            candidate(2, "New story", Some("neutral")),
            candidate(3, "new  STORY", Some("neutral")),
        ];
        let out = validate_candidates(&items, Polarity::Free, 5, &existing);
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].title, "New story");
        assert_eq!(out.rejected.len(), 2);
    }

    #[test]
    fn test_over_quota_trimmed() {
        let items = vec![
            candidate(1, "a", Some("neutral")),
            candidate(2, "b", Some("neutral")),
            candidate(3, "c", Some("neutral")),
        ];
        let out = validate_candidates(&items, Polarity::Free, 2, &HashSet::new());
        assert_eq!(out.accepted.len(), 2);
        assert_eq!(out.rejected, vec![ValidationError::OverQuota { index: 3, count: 2 }]);
    }

    #[test]
    fn test_unknown_source_class_rejected() {
        let mut a = candidate(1, "a", Some("neutral"));
        a.source_class = Some("rumour".to_string());
        let out = validate_candidates(&[a], Polarity::Free, 1, &HashSet::new());
        assert!(matches!(
            out.rejected[0],
            ValidationError::UnknownSourceClass { index: 1, .. }
        ));
    }
}
