//! AI service clients: embeddings and chat/vision completions
//!
//! Both services sit behind async traits so pipelines can be tested with
//! in-process fakes instead of live HTTP.

pub mod embeddings;
pub mod model;

pub use embeddings::{cosine_similarity, EmbeddingClient, EmbeddingError, HttpEmbeddingClient};
pub use model::{
    CompletionClient, CompletionRequest, ContentBlock, HttpModelClient, Message, ModelError, Role,
};
