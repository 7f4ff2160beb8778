//! Lore Core - Data models and shared types for the research assistant
//!
//! This crate defines the fundamental types used across all Lore components:
//! - Node and Edge of the content graph
//! - Reserved node-type and relation tags
//! - Chat messages and roles
//! - The unified error type and runtime settings

mod config;
mod error;
mod message;
mod node;

pub use config::Settings;
pub use error::{LoreError, Result};
pub use message::{Message, Role};
pub use node::{Edge, GraphPayload, NewNode, Node, NodeUpdate};

/// Reserved values for [`Node::node_type`].
///
/// `node_type` is an open string tag; these are the values the core itself
/// creates and queries for.
pub mod node_type {
    pub const PROJECT: &str = "Project";
    pub const SOURCE: &str = "Source";
    pub const CHUNK: &str = "Chunk";
    pub const ARTIFACT: &str = "Artifact";
    pub const CHAT: &str = "Chat";
    pub const CONCEPT: &str = "Concept";
}

/// Reserved values for [`Edge::relation_type`].
pub mod relation {
    pub const HAS_SOURCE: &str = "HAS_SOURCE";
    pub const HAS_ARTIFACT: &str = "HAS_ARTIFACT";
    pub const HAS_CHUNK: &str = "HAS_CHUNK";
    pub const CITES: &str = "CITES";
    pub const CONVERSATION_IN: &str = "CONVERSATION_IN";
    pub const RELATED_TO: &str = "RELATED_TO";
    pub const SUPPORTS: &str = "SUPPORTS";
    pub const CONTRADICTS: &str = "CONTRADICTS";
    pub const EXTENDS: &str = "EXTENDS";
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Edge, GraphPayload, LoreError, Message, NewNode, Node, NodeUpdate, Result, Role,
        Settings,
    };
}
