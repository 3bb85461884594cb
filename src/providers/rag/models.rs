use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct RagChatRequest<'a> {
    pub message: &'a str,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct RagChatResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Option<Vec<RagSource>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub model_used: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RagSource {
    pub rank: u32,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Debug, Deserialize)]
pub struct RagDrugList {
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub total_documents: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RagErrorResponse {
    pub detail: serde_json::Value,
}
