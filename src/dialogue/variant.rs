//! Dialogue Variants
//!
//! A dialogue entry carries several phrasings of the same line. Which one is
//! shown depends on the resolver mode.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::Value;

/// Mode that picks randomly from the `alt` list
pub const ALT_MODE: &str = "alt";
/// Returned when an entry has no usable phrasing at all
pub const NO_TEXT: &str = "[no text]";

/// All phrasings of one dialogue line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogueEntry {
    pub key: String,
    /// Named single-string variants (`base`, `expanded`, `concise`, ...)
    pub variants: BTreeMap<String, String>,
    /// Alternative phrasings
    pub alt: Vec<String>,
}

impl DialogueEntry {
    pub fn from_json(key: &str, value: &Value) -> Result<Self, String> {
        let fields = value
            .as_object()
            .ok_or_else(|| format!("entry must be an object, got {}", value))?;

        let mut entry = Self {
            key: key.to_string(),
            ..Self::default()
        };

        for (name, field) in fields {
            if name == ALT_MODE {
                entry.alt = field
                    .as_array()
                    .ok_or_else(|| "'alt' must be an array of strings".to_string())?
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| format!("'alt' items must be strings, got {}", v))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
            } else {
                let text = field
                    .as_str()
                    .ok_or_else(|| format!("variant '{}' must be a string, got {}", name, field))?;
                entry.variants.insert(name.clone(), text.to_string());
            }
        }

        Ok(entry)
    }

    pub fn with_variant(mut self, mode: &str, text: &str) -> Self {
        self.variants.insert(mode.to_string(), text.to_string());
        self
    }

    pub fn with_alt(mut self, alt: &[&str]) -> Self {
        self.alt = alt.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Pick the phrasing for `mode`.
    ///
    /// An exact variant wins; `alt` picks uniformly from the alt list.
    /// Otherwise falls back to `expanded`, `base`, the first alt, and
    /// finally [`NO_TEXT`].
    pub fn select<R: Rng + ?Sized>(&self, mode: &str, rng: &mut R) -> &str {
        if mode == ALT_MODE {
            if let Some(choice) = self.alt.choose(rng) {
                return choice;
            }
        } else if let Some(text) = self.variants.get(mode) {
            return text;
        }

        self.variants
            .get("expanded")
            .or_else(|| self.variants.get("base"))
            .or_else(|| self.alt.first())
            .map(String::as_str)
            .unwrap_or(NO_TEXT)
    }
}
