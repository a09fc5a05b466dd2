//! Keyword lexicon: the deterministic tier of the sentiment estimator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Language used when a table has no entry for the requested one.
pub const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageLexicon {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

/// Positive/negative keywords keyed by language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LexiconTable {
    languages: BTreeMap<String, LanguageLexicon>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for LexiconTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LexiconTable {
    pub fn empty() -> Self {
        Self {
            languages: BTreeMap::new(),
        }
    }

    /// Built-in tables for `en`, `hi` and `ta`.
    pub fn builtin() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert(
            "en".to_string(),
            LanguageLexicon {
                positive: words(&[
                    "good",
                    "great",
                    "excellent",
                    "happy",
                    "satisfied",
                    "love",
                    "wonderful",
                    "amazing",
                    "fantastic",
                    "awesome",
                ]),
                negative: words(&["bad", "terrible", "awful", "sad", "frustrated", "hate"]),
            },
        );
        languages.insert(
            "hi".to_string(),
            LanguageLexicon {
                positive: words(&["अच्छा", "खुश", "संतुष्ट", "प्रसन्न"]),
                negative: words(&["बुरा", "भयानक", "दुखी", "परेशान", "गुस्सा"]),
            },
        );
        languages.insert(
            "ta".to_string(),
            LanguageLexicon {
                positive: words(&["நல்ல", "சிறந்த", "மகிழ்ச்சி", "திருப்தி"]),
                negative: words(&["மோசம்", "வருத்தம்", "கோபம்", "கஷ்டம்"]),
            },
        );
        Self { languages }
    }

    pub fn insert(&mut self, language: impl Into<String>, lexicon: LanguageLexicon) {
        self.languages.insert(language.into(), lexicon);
    }

    /// Entries of `overrides` replace whole languages of `self`.
    pub fn merged_with(mut self, overrides: LexiconTable) -> Self {
        self.languages.extend(overrides.languages);
        self
    }

    /// Lexicon for `language`, falling back to English.
    pub fn for_language(&self, language: &str) -> Option<&LanguageLexicon> {
        self.languages
            .get(language)
            .or_else(|| self.languages.get(FALLBACK_LANGUAGE))
    }

    /// Score `text` in `[-1, 1]`.
    ///
    /// Lower-cases, splits on whitespace, and adds +1 for a token containing
    /// a positive keyword or -1 for one containing a negative keyword
    /// (positive is checked first; a token counts once). The sum is divided
    /// by the token count. No tokens scores 0.
    pub fn score(&self, text: &str, language: &str) -> f64 {
        let text = text.to_lowercase();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return 0.0;
        }
        let Some(lexicon) = self.for_language(language) else {
            return 0.0;
        };

        let contains_any =
            |token: &str, list: &[String]| list.iter().any(|kw| !kw.is_empty() && token.contains(kw.as_str()));

        let sum: i64 = tokens
            .iter()
            .map(|token| {
                if contains_any(token, &lexicon.positive) {
                    1
                } else if contains_any(token, &lexicon.negative) {
                    -1
                } else {
                    0
                }
            })
            .sum();

        (sum as f64 / tokens.len() as f64).clamp(-1.0, 1.0)
    }
}
