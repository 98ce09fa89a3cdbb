//! Hybrid retrieval: keyword index, embedding index, reranker, and file
//! context selection.

pub mod embedding;
pub mod files;
pub mod keyword;
pub mod rerank;

pub use embedding::{DocChunk, EmbeddingHit, EmbeddingIndex};
pub use files::{auto_select, read_attached, FileContext};
pub use keyword::{DocEntry, KeywordHit, KeywordIndex};
pub use rerank::{rerank, RerankCandidate};
