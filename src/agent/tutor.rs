//! Tutor orchestrator: one inbound message in, one reply out
//!
//! Seeds the persona, calls the completion service with the learner's full
//! history, keeps the history bounded, and logs every vocabulary/correction
//! marker found in the reply.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::agent::conversation::{ConversationStore, DEFAULT_MAX_TURNS};
use crate::agent::llm::{CompletionParams, CompletionService};
use crate::agent::persona::{FALLBACK_REPLY, TUTOR_SYSTEM_PROMPT};
use crate::config::Config;
use crate::types::Message;
use crate::vocabulary::{extract_markers, VocabularyStore};

/// Knobs for the tutor
#[derive(Debug, Clone)]
pub struct TutorSettings {
    pub params: CompletionParams,
    pub max_turns: usize,
    pub system_prompt: String,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            params: CompletionParams::default(),
            max_turns: DEFAULT_MAX_TURNS,
            system_prompt: TUTOR_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl TutorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            params: CompletionParams {
                model: config.completion.model.clone(),
                temperature: config.completion.temperature,
                max_tokens: config.completion.max_tokens,
            },
            max_turns: config.conversation.max_turns,
            system_prompt: TUTOR_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// The tutoring service shared by every request
pub struct Tutor {
    completion: Arc<dyn CompletionService>,
    conversations: Arc<dyn ConversationStore>,
    vocabulary: Arc<VocabularyStore>,
    settings: TutorSettings,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Tutor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        conversations: Arc<dyn ConversationStore>,
        vocabulary: Arc<VocabularyStore>,
        settings: TutorSettings,
    ) -> Self {
        Self {
            completion,
            conversations,
            vocabulary,
            settings,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn vocabulary(&self) -> &Arc<VocabularyStore> {
        &self.vocabulary
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    pub fn settings(&self) -> &TutorSettings {
        &self.settings
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget `user_id`'s lock once no other turn holds or awaits it
    async fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        // map entry + `lock`; clones are only handed out under `user_locks`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }

    /// Produce the tutor's raw reply (markers included) to `user_message`.
    ///
    /// Never fails: a completion error yields `FALLBACK_REPLY` and leaves the
    /// stored history untouched. Turns for the same user are serialized.
    pub async fn get_reply(&self, user_id: &str, user_message: &str) -> String {
        let lock = self.user_lock(user_id).await;
        let reply = {
            let _turn = lock.lock().await;
            self.take_turn(user_id, user_message).await
        };
        self.release_user_lock(user_id, lock).await;
        reply
    }

    async fn take_turn(&self, user_id: &str, user_message: &str) -> String {
        let mut conversation = self.conversations.load(user_id).await;
        conversation.seed(Message::system(self.settings.system_prompt.as_str()));
        conversation.add_message(Message::user(user_message));

        let reply = match self
            .completion
            .complete(&conversation.messages, &self.settings.params)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!("Completion service error for {}: {}", user_id, e);
                return FALLBACK_REPLY.to_string();
            }
        };

        conversation.add_message(Message::assistant(reply.as_str()));
        conversation.truncate(self.settings.max_turns);
        debug!("History for {} now {} turns", user_id, conversation.len());
        self.conversations.save(user_id, conversation).await;

        self.log_markers(user_id, &reply).await;

        reply
    }

    /// Write every marker in `reply` to the vocabulary store; returns how many
    /// were found.
    pub async fn log_markers(&self, user_id: &str, reply: &str) -> usize {
        let markers = extract_markers(reply);
        if markers.is_empty() && (reply.contains("[VOCAB:") || reply.contains("[CORRECTION:")) {
            warn!("Reply for {} has malformed markers", user_id);
        }
        for marker in &markers {
            self.vocabulary
                .log_entry(user_id, marker.word(), &marker.definition(), marker.kind())
                .await;
        }
        markers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::InMemoryConversationStore;
    use crate::agent::llm::CompletionError;
    use crate::types::Role;
    use async_trait::async_trait;

    mockall::mock! {
        pub Completion {}

        #[async_trait]
        impl CompletionService for Completion {
            async fn complete(
                &self,
                messages: &[Message],
                params: &CompletionParams,
            ) -> Result<String, CompletionError>;
        }
    }

    struct Fixture {
        tutor: Tutor,
        conversations: Arc<InMemoryConversationStore>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(completion: MockCompletion) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let vocabulary = Arc::new(
            VocabularyStore::open(dir.path().join("vocabulary.json"))
                .await
                .unwrap(),
        );
        let conversations = Arc::new(InMemoryConversationStore::new());
        let tutor = Tutor::new(
            Arc::new(completion),
            conversations.clone(),
            vocabulary,
            TutorSettings::default(),
        );
        Fixture {
            tutor,
            conversations,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_first_message_seeds_system_turn() {
        let mut completion = MockCompletion::new();
        completion
            .expect_complete()
            .withf(|messages, params| {
                messages.len() == 2
                    && messages[0].role == Role::System
                    && messages[0].content == TUTOR_SYSTEM_PROMPT
                    && messages[1].role == Role::User
                    && messages[1].content == "Bonjour"
                    && params.max_tokens == 500
                    && params.temperature == 0.7
            })
            .times(1)
            .returning(|_, _| Ok("Bonjour ! Comment vas-tu ?".to_string()));

        let fx = fixture(completion).await;
        let reply = fx.tutor.get_reply("+33611111111", "Bonjour").await;
        assert_eq!(reply, "Bonjour ! Comment vas-tu ?");

        let conv = fx.conversations.load("+33611111111").await;
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_failure_returns_fallback_and_keeps_history() {
        let mut completion = MockCompletion::new();
        let mut calls = 0;
        completion.expect_complete().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok("Très bien.".to_string())
            } else {
                Err(CompletionError::EmptyResponse)
            }
        });

        let fx = fixture(completion).await;
        fx.tutor.get_reply("u", "Salut").await;
        let before = fx.conversations.load("u").await.messages;

        let reply = fx.tutor.get_reply("u", "Encore").await;
        assert_eq!(reply, FALLBACK_REPLY);
        assert_eq!(fx.conversations.load("u").await.messages, before);
    }

    #[tokio::test]
    async fn test_failure_on_first_message_stores_nothing() {
        let mut completion = MockCompletion::new();
        completion
            .expect_complete()
            .returning(|_, _| Err(CompletionError::EmptyResponse));

        let fx = fixture(completion).await;
        assert_eq!(fx.tutor.get_reply("u", "Salut").await, FALLBACK_REPLY);
        assert!(fx.conversations.users().await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped_and_keeps_system_turn() {
        let mut completion = MockCompletion::new();
        completion
            .expect_complete()
            .withf(|messages, _| messages[0].role == Role::System && messages.len() <= 21)
            .returning(|_, _| Ok("D'accord.".to_string()));

        let fx = fixture(completion).await;
        for i in 0..30 {
            fx.tutor.get_reply("u", &format!("message {}", i)).await;
        }

        let conv = fx.conversations.load("u").await;
        assert_eq!(conv.len(), DEFAULT_MAX_TURNS);
        assert_eq!(conv.messages[0].content, TUTOR_SYSTEM_PROMPT);
        assert_eq!(conv.messages[DEFAULT_MAX_TURNS - 1].role, Role::Assistant);
        assert_eq!(conv.messages[DEFAULT_MAX_TURNS - 2].content, "message 29");
        assert_eq!(
            conv.messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_markers_are_logged_and_reply_is_raw() {
        let mut completion = MockCompletion::new();
        completion.expect_complete().returning(|_, _| {
            Ok("[VOCAB: bonjour - a greeting] texte [CORRECTION: je suis allé -> je suis allée - agreement]"
                .to_string())
        });

        let fx = fixture(completion).await;
        let reply = fx.tutor.get_reply("u", "je suis allé").await;
        assert!(reply.contains("[VOCAB:"));

        let record = fx.tutor.vocabulary().get_user_vocabulary("u").await.unwrap();
        assert_eq!(record.vocabulary.len(), 1);
        assert_eq!(record.vocabulary[0].word, "bonjour");
        assert_eq!(record.vocabulary[0].definition, "a greeting");
        assert_eq!(record.corrections.len(), 1);
        assert_eq!(record.corrections[0].word, "je suis allée");
        assert_eq!(
            record.corrections[0].definition,
            "Correction de \"je suis allé\": agreement"
        );
    }

    #[tokio::test]
    async fn test_users_have_independent_histories() {
        let mut completion = MockCompletion::new();
        completion.expect_complete().returning(|_, _| Ok("Oui.".to_string()));

        let fx = fixture(completion).await;
        fx.tutor.get_reply("alice", "un").await;
        fx.tutor.get_reply("alice", "deux").await;
        fx.tutor.get_reply("bob", "trois").await;

        assert_eq!(fx.conversations.load("alice").await.len(), 5);
        assert_eq!(fx.conversations.load("bob").await.len(), 3);
    }

    #[tokio::test]
    async fn test_user_locks_released_after_turns() {
        let mut completion = MockCompletion::new();
        completion.expect_complete().returning(|_, _| Ok("Oui.".to_string()));

        let fx = Arc::new(fixture(completion).await);
        let mut handles = Vec::new();
        for i in 0..10 {
            let fx = fx.clone();
            handles.push(tokio::spawn(async move {
                fx.tutor.get_reply(&format!("user{}", i % 3), "salut").await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(fx.tutor.user_locks.lock().await.is_empty());
        assert_eq!(fx.conversations.users().await.len(), 3);
    }

    #[tokio::test]
    async fn test_store_write_failure_does_not_change_reply() {
        let mut completion = MockCompletion::new();
        completion
            .expect_complete()
            .returning(|_, _| Ok("Super ! [VOCAB: chat - cat]".to_string()));

        let fx = fixture(completion).await;
        let path = fx.tutor.vocabulary().path().to_path_buf();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let reply = fx.tutor.get_reply("u", "Bonjour").await;
        assert_eq!(reply, "Super ! [VOCAB: chat - cat]");
        assert_eq!(fx.conversations.load("u").await.len(), 3);
        assert!(path.is_dir());
    }
}
