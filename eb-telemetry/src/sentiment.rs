//! Sentiment labels attached to death screens.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

use crate::constants::UNLABELED_SENTIMENT;

/// Label set small enough to stay inline; classifiers emit a handful of labels.
pub type SentimentSet = SmallVec<[Sentiment; 4]>;

/// Coarse label produced by the external classifier (e.g. `NEGATIVE`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sentiment(pub String);

impl Sentiment {
    /// Construct a label from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    /// Bucket used for players without any labelled death.
    #[must_use]
    pub fn unlabeled() -> Self {
        Self(UNLABELED_SENTIMENT.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sentiment {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque label producer for death-screen messages.
pub trait SentimentClassifier {
    /// Label for `message`, or `None` when the classifier has no opinion.
    fn classify(&self, message: &str) -> Option<Sentiment>;
}

/// Precomputed message→label table exported by the offline classifier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelTable(HashMap<String, Sentiment>);

impl LabelTable {
    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Load labels from a JSON object of `message: label` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a string-to-string object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, message: &str, label: Sentiment) {
        self.0.insert(message.to_string(), label);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SentimentClassifier for LabelTable {
    fn classify(&self, message: &str) -> Option<Sentiment> {
        self.0
            .get(message)
            .filter(|label| !label.is_empty())
            .cloned()
    }
}

/// Most frequent label, ties going to the lexicographically smallest label.
pub fn dominant_sentiment<'a, I>(labels: I) -> Option<Sentiment>
where
    I: IntoIterator<Item = &'a Sentiment>,
{
    let mut counts: BTreeMap<&Sentiment, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    // BTreeMap iterates ascending, and max_by_key keeps the last maximum,
    // so walk it in reverse to land on the smallest tied label.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(label, _)| label.clone())
}
