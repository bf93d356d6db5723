//! Agent module - conversation state, completion client and the tutor

pub mod conversation;
pub mod llm;
pub mod persona;
pub mod tutor;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::vocabulary::VocabularyStore;
use conversation::InMemoryConversationStore;
use llm::{OpenAiClient, ProviderConfig};
use tutor::{Tutor, TutorSettings};

/// Wire a tutor from configuration: OpenAI-compatible client, in-memory
/// conversation store and the JSON vocabulary log.
pub async fn build_tutor(config: &Config, api_key: String) -> Result<Tutor> {
    let provider = ProviderConfig::with_base_url(api_key, config.completion.base_url.as_str());
    let client = OpenAiClient::with_timeout(
        provider,
        Duration::from_secs(config.completion.timeout_secs),
    )
    .context("Failed to build completion client")?;

    let vocabulary = VocabularyStore::open(&config.store.path)
        .await
        .with_context(|| format!("Failed to initialize vocabulary log at {}", config.store.path.display()))?;
    info!("Vocabulary log: {}", vocabulary.path().display());

    Ok(Tutor::new(
        Arc::new(client),
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(vocabulary),
        TutorSettings::from_config(config),
    ))
}
