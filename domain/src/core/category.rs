//! Evaluation categories
//!
//! Categories are static configuration: an ordered list whose order drives
//! quota remainder distribution and report layout.

use serde::{Deserialize, Serialize};

/// One evaluation dimension (e.g. "integrity").
///
/// Keys are normalised to lowercase snake_case so that config files,
/// CLI filters and provider payloads agree on identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(key: impl AsRef<str>) -> Self {
        let key = key
            .as_ref()
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable label ("public_interest" -> "Public Interest")
    pub fn label(&self) -> String {
        self.0
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The ten default competency/character axes, in report order.
    pub fn default_set() -> Vec<Category> {
        [
            "expertise",
            "leadership",
            "vision",
            "integrity",
            "ethics",
            "accountability",
            "transparency",
            "communication",
            "responsiveness",
            "public_interest",
        ]
        .iter()
        .map(Category::new)
        .collect()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::new(s)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::new(s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0
    }
}
