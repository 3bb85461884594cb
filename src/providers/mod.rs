pub mod rag;
pub mod traits;
pub mod types;

pub use rag::RagClient;
pub use traits::ChatService;
pub use types::{ChatReply, DrugCatalog, ProviderError};
