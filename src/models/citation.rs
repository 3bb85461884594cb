use serde::{Deserialize, Serialize};

/// A ranked reference supporting a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub rank: u32,
    pub source: String,
    pub url: Option<String>,
    pub category: String,
    pub similarity: f64,
}

impl Citation {
    /// The link to open when the citation is activated, if it has one.
    pub fn link(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn clamped_similarity(&self) -> f64 {
        if self.similarity.is_nan() {
            0.0
        } else {
            self.similarity.clamp(0.0, 1.0)
        }
    }
}
