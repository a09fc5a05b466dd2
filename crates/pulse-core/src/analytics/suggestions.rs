//! Retention suggestions keyed by language.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::churn::ChurnFeatures;
use super::lexicon::FALLBACK_LANGUAGE;

pub const MAX_SUGGESTIONS: usize = 4;

/// Suggestions per risk area for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionGroups {
    #[serde(default)]
    pub sentiment: Vec<String>,
    #[serde(default)]
    pub response: Vec<String>,
    #[serde(default)]
    pub activity: Vec<String>,
    #[serde(default)]
    pub engagement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionTable {
    languages: BTreeMap<String, SuggestionGroups>,
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SuggestionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SuggestionTable {
    pub fn builtin() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert(
            "en".to_string(),
            SuggestionGroups {
                sentiment: list(&["Schedule 1-on-1 meeting", "Discuss career goals", "Address work concerns"]),
                response: list(&["Send personalized survey", "Improve communication", "Regular check-ins"]),
                activity: list(&["Assign engaging projects", "Team collaboration", "Skill development"]),
                engagement: list(&["Recognition program", "Flexible work options", "Mentorship"]),
            },
        );
        languages.insert(
            "hi".to_string(),
            SuggestionGroups {
                sentiment: list(&["व्यक्तिगत बैठक करें", "करियर लक्ष्यों पर चर्चा", "कार्य संबंधी चिंताओं को हल करें"]),
                response: list(&["व्यक्तिगत सर्वे भेजें", "संवाद में सुधार", "नियमित जांच"]),
                activity: list(&["रोचक प्रोजेक्ट दें", "टीम सहयोग", "कौशल विकास"]),
                engagement: list(&["पहचान कार्यक्रम", "लचीले काम के विकल्प", "मार्गदर्शन"]),
            },
        );
        languages.insert(
            "ta".to_string(),
            SuggestionGroups {
                sentiment: list(&["தனிப்பட்ட சந்திப்பு", "தொழில் இலக்குகள் விவாதம்", "வேலை கவலைகள் தீர்க்க"]),
                response: list(&["தனிப்பட்ட கணக்கெடுப்பு", "தொடர்பு மேம்படுத்த", "வழக்கமான சரிபார்ப்பு"]),
                activity: list(&["சுவாரஸ்யமான திட்டங்கள்", "குழு ஒத்துழைப்பு", "திறன் மேம்பாடு"]),
                engagement: list(&["அங்கீகார திட்டம்", "நெகிழ்வான வேலை", "வழிகாட்டுதல்"]),
            },
        );
        Self { languages }
    }

    pub fn merged_with(mut self, overrides: SuggestionTable) -> Self {
        self.languages.extend(overrides.languages);
        self
    }

    fn groups(&self, language: &str) -> Option<&SuggestionGroups> {
        self.languages
            .get(language)
            .or_else(|| self.languages.get(FALLBACK_LANGUAGE))
    }

    /// Up to four suggestions, grouped in factor order.
    pub fn suggestions(&self, features: &ChurnFeatures, language: &str) -> Vec<String> {
        let Some(groups) = self.groups(language) else {
            return Vec::new();
        };

        let triggered = [
            (features.avg_sentiment < -0.2, &groups.sentiment),
            (features.response_rate < 0.5, &groups.response),
            (features.days_inactive > 7, &groups.activity),
            (
                features.total_responses > 0 && features.negative_ratio() > 0.6,
                &groups.engagement,
            ),
        ];

        triggered
            .into_iter()
            .filter(|(hit, _)| *hit)
            .flat_map(|(_, items)| items.iter().cloned())
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}
