//! Rater value object representing one LLM acting as collector or evaluator

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An independent LLM rater (Value Object)
///
/// The same rater can act as a collector (finds evidence) and as an
/// evaluator (rates pooled evidence). Identity is the string id, so a
/// `Custom("claude")` parses back to `Rater::Claude`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rater {
    Claude,
    Gpt,
    Gemini,
    Grok,
    Perplexity,
    Custom(String),
}

impl Rater {
    /// Get the string identifier for this rater
    pub fn as_str(&self) -> &str {
        match self {
            Rater::Claude => "claude",
            Rater::Gpt => "gpt",
            Rater::Gemini => "gemini",
            Rater::Grok => "grok",
            Rater::Perplexity => "perplexity",
            Rater::Custom(s) => s,
        }
    }

    /// The default roster: four raters weighted equally for collection and
    /// all four evaluating the pooled evidence.
    pub fn default_roster() -> Vec<Rater> {
        vec![Rater::Claude, Rater::Gpt, Rater::Gemini, Rater::Grok]
    }

    /// Check if this rater is served by Anthropic's API
    pub fn is_claude(&self) -> bool {
        matches!(self, Rater::Claude)
    }

    /// Check if this rater is served by an OpenAI-compatible API
    pub fn is_openai_compatible(&self) -> bool {
        matches!(
            self,
            Rater::Gpt | Rater::Gemini | Rater::Grok | Rater::Perplexity
        )
    }
}

impl std::fmt::Display for Rater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rater {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "claude" => Rater::Claude,
            "gpt" | "chatgpt" => Rater::Gpt,
            "gemini" => Rater::Gemini,
            "grok" => Rater::Grok,
            "perplexity" => Rater::Perplexity,
            other => Rater::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Rater {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(rater) => rater,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Rater {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Rater {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Rater::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rater_roundtrip() {
        for rater in Rater::default_roster() {
            assert_eq!(Rater::from(rater.as_str()), rater);
        }
    }

    #[test]
    fn test_rater_aliases_and_case() {
        assert_eq!(Rater::from("ChatGPT"), Rater::Gpt);
        assert_eq!(Rater::from(" Claude "), Rater::Claude);
        assert_eq!(
            Rater::from("mistral"),
            Rater::Custom("mistral".to_string())
        );
    }

    #[test]
    fn test_rater_serde_as_string() {
        let json = serde_json::to_string(&Rater::Gemini).unwrap();
        assert_eq!(json, "\"gemini\"");
        let back: Rater = serde_json::from_str("\"grok\"").unwrap();
        assert_eq!(back, Rater::Grok);
    }

    #[test]
    fn test_provider_family() {
        assert!(Rater::Claude.is_claude());
        assert!(!Rater::Claude.is_openai_compatible());
        assert!(Rater::Grok.is_openai_compatible());
        assert!(!Rater::Custom("x".into()).is_openai_compatible());
    }
}
