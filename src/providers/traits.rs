use async_trait::async_trait;

use super::types::{ChatReply, DrugCatalog, ProviderError};

/// The remote RAG backend, as seen by the conversation engine.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_message(&self, message: &str) -> Result<ChatReply, ProviderError>;

    async fn list_drugs(&self) -> Result<DrugCatalog, ProviderError>;

    async fn drug_info(&self, name: &str) -> Result<serde_json::Value, ProviderError>;
}
