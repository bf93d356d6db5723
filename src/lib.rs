//! French Tutor - WhatsApp tutoring relay
//!
//! Receives messaging-platform webhooks, asks a chat-completion model
//! (playing a patient French teacher) for a reply, logs the vocabulary and
//! corrections the model marks up, and answers with the cleaned reply.
//!
//! # Example
//!
//! ```ignore
//! use french_tutor::{agent, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let tutor = agent::build_tutor(&config, "sk-...".to_string()).await?;
//!     let reply = tutor.get_reply("whatsapp:+33612345678", "Bonjour !").await;
//!     println!("{}", french_tutor::strip_markers(&reply));
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod vocabulary;
pub mod agent;
pub mod config;
pub mod security;
pub mod messaging;
pub mod server;
pub mod cli;

pub use agent::{
    conversation::{Conversation, ConversationStore, InMemoryConversationStore},
    llm::{CompletionError, CompletionParams, CompletionService, OpenAiClient},
    tutor::{Tutor, TutorSettings},
};

pub use vocabulary::{
    extract_markers, strip_markers, EntryKind, Marker, UserRecord, UserStats, VocabularyStore,
};

pub use config::Config;

pub use server::{router, ServerState};
