//! Prompt templates for collection and evaluation requests

use crate::core::category::Category;
use crate::core::subject::Subject;
use crate::evidence::{EvidenceItem, Polarity};
use crate::rating::RatingScale;

/// Everything a collector needs to be told about one cell.
#[derive(Debug, Clone)]
pub struct CollectionRequest<'a> {
    pub subject: &'a Subject,
    pub category: &'a Category,
    pub polarity: Polarity,
    pub count: usize,
    /// Scale the collector uses for its optional self-rating
    pub scale: RatingScale,
    /// Titles already in the pool, so the collector can avoid repeats
    pub known_titles: &'a [String],
}

/// Everything an evaluator needs to be told about one item.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub subject: &'a Subject,
    pub item: &'a EvidenceItem,
    pub scale: RatingScale,
}

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for evidence collection
    pub fn collection_system() -> &'static str {
        r#"You are a careful researcher compiling verifiable evidence about a public figure.
Report only facts that can be traced to a source. Do not speculate.
Respond with JSON only."#
    }

    /// User prompt for one collection cell
    pub fn collection_prompt(request: &CollectionRequest<'_>) -> String {
        let polarity = match request.polarity {
            Polarity::Negative => "Every item must reflect negatively on the subject (polarity \"negative\").",
            Polarity::Positive => "Every item must reflect positively on the subject (polarity \"positive\").",
            Polarity::Free => "Items may be negative, positive or neutral; tag each accordingly.",
        };
        let mut prompt = format!(
            r#"Subject: {}
Category: {}

Find exactly {} distinct pieces of evidence about the subject in this category.
{}

Return a JSON array. Each element must have:
- "seq": 1-based position
- "title": short headline
- "body": factual summary
- "source": where it can be verified (URL or document)
- "source_class": "official" or "public"
- "polarity": "negative", "positive" or "neutral"
- "rating": your own rating, given as {}
"#,
            request.subject.describe(),
            request.category.label(),
            request.count,
            polarity,
            request.scale.describe(),
        );

        if !request.known_titles.is_empty() {
            prompt.push_str("\nAlready collected (do not repeat):\n");
            for title in request.known_titles {
                prompt.push_str(&format!("- {}\n", title));
            }
        }

        prompt
    }

    /// System prompt for pooled evaluation
    pub fn evaluation_system() -> &'static str {
        r#"You are an impartial evaluator rating a single piece of evidence.
Judge only the evidence as written, not who collected it.
Respond with JSON only."#
    }

    /// User prompt for one (item, evaluator) pair
    pub fn evaluation_prompt(request: &EvaluationRequest<'_>) -> String {
        format!(
            r#"Subject: {}
Category: {}

Evidence:
Title: {}
Source: {} ({})
{}

Rate how this evidence reflects on the subject in the "{}" category. Give the rating as {}.

Return a JSON object: {{"rating": <rating>, "rationale": "<one or two sentences>"}}"#,
            request.subject.describe(),
            request.item.category().label(),
            request.item.title,
            request.item.source,
            request.item.source_class,
            request.item.body,
            request.item.category().label(),
            request.scale.describe(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rater::Rater;
    use crate::evidence::{ItemKey, SourceClass, Stance};

    #[test]
    fn test_collection_prompt_mentions_cell() {
        let subject = Subject::new("s1", "Jane Doe").with_metadata("role", "Mayor");
        let category = Category::new("public_interest");
        let known = vec!["Old headline".to_string()];
        let prompt = PromptTemplate::collection_prompt(&CollectionRequest {
            subject: &subject,
            category: &category,
            polarity: Polarity::Negative,
            count: 3,
            scale: RatingScale::LetterGrade,
            known_titles: &known,
        });
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("Public Interest"));
        assert!(prompt.contains("exactly 3"));
        assert!(prompt.contains("\"negative\""));
        assert!(prompt.contains("Old headline"));
    }

    #[test]
    fn test_evaluation_prompt_mentions_item() {
        let subject = Subject::new("s1", "Jane Doe");
        let item = EvidenceItem {
            key: ItemKey::new("s1".into(), Category::new("ethics"), Rater::Gpt, 300_001),
            title: "Voted against disclosure".to_string(),
            body: "Details".to_string(),
            source: "records.gov".to_string(),
            source_class: SourceClass::Official,
            polarity: Polarity::Free,
            stance: Stance::Negative,
            collected_at: 0,
            self_rating: None,
        };
        let prompt = PromptTemplate::evaluation_prompt(&EvaluationRequest {
            subject: &subject,
            item: &item,
            scale: RatingScale::SignedInteger,
        });
        assert!(prompt.contains("Voted against disclosure"));
        assert!(prompt.contains("records.gov (official)"));
        assert!(prompt.contains("\"rating\""));
    }
}
