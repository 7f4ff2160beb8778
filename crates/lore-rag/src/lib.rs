//! Lore RAG - Ingestion pipeline and retrieval-augmented generation
//!
//! The write side turns web pages and PDFs into Source and Chunk nodes
//! with lexical and vector index rows; the read side answers questions
//! grounded in retrieved chunks, either in one shot (`recall`) or as a
//! token stream with citations (`chat_stream`).

mod chunker;
mod ingest;
mod recall;

pub use chunker::{ChunkConfig, Chunker};
pub use ingest::Ingestor;
pub use recall::{
    chat_stream, recall, retrieve_context, ChatCitation, ChatEvent, MAX_HISTORY_TURNS,
};
