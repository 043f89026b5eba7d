use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::client::ModelClient;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::{Result, SupportError};
use crate::intent::{Classification, IntentClassifier, IntentLabel, LlmIntentClassifier};
use crate::models::Message;
use crate::reply::{LlmReplyGenerator, ReplyGenerator};
use crate::summary::{LlmSummarizer, Summarizer};
use crate::transport::{MistralTransport, Transport};

/// Where a turn is in the classify-then-reply pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingClassification,
    AwaitingReply,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::AwaitingClassification => "awaiting_classification",
            TurnPhase::AwaitingReply => "awaiting_reply",
        };
        f.write_str(s)
    }
}

/// Result of one completed user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub category: IntentLabel,
    #[serde(skip)]
    pub classification: Classification,
    pub reply: String,
    /// Text stored as the assistant message.
    pub content: String,
}

pub fn assistant_content(category: IntentLabel, reply: &str) -> String {
    format!("**Category:** {category}\n\n{reply}")
}

/// Classifier, reply generator and summarizer sharing one model client.
pub struct SupportService {
    classifier: Box<dyn IntentClassifier>,
    replies: Box<dyn ReplyGenerator>,
    summarizer: Box<dyn Summarizer>,
}

impl SupportService {
    pub fn new(cfg: &Config) -> Result<Self> {
        let transport = Arc::new(MistralTransport::new(
            cfg.mistral.base_url.clone(),
            cfg.retry.clone(),
        )?);
        Ok(Self::with_transport(cfg, transport))
    }

    pub fn with_transport(cfg: &Config, transport: Arc<dyn Transport>) -> Self {
        let client = Arc::new(ModelClient::new(transport, cfg.mistral.clone()));
        tracing::info!("Support service using model {}", client.model());

        Self::from_parts(
            Box::new(LlmIntentClassifier::new(Arc::clone(&client))),
            Box::new(LlmReplyGenerator::new(Arc::clone(&client))),
            Box::new(LlmSummarizer::new(client, cfg.summary.clone())),
        )
    }

    pub fn from_parts(
        classifier: Box<dyn IntentClassifier>,
        replies: Box<dyn ReplyGenerator>,
        summarizer: Box<dyn Summarizer>,
    ) -> Self {
        Self {
            classifier,
            replies,
            summarizer,
        }
    }

    /// Runs one user turn against `conversation`.
    ///
    /// The user message is appended first. If a model call fails the error is
    /// returned and no assistant message is added for this turn.
    pub async fn handle_turn(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(SupportError::Session("message is empty".to_string()));
        }

        let session = conversation.id();
        conversation.append(Message::user(text));

        tracing::debug!(%session, phase = %TurnPhase::AwaitingClassification, "Turn started");
        let classification = self.classifier.classify_detailed(text).await?;
        let category = classification.label;

        tracing::debug!(%session, phase = %TurnPhase::AwaitingReply, %category, "Inquiry classified");
        let reply = self.replies.generate_reply(text, category).await?;

        let content = assistant_content(category, &reply);
        conversation.append(Message::assistant(content.clone()));
        tracing::debug!(%session, phase = %TurnPhase::Idle, messages = conversation.len(), "Turn complete");

        Ok(TurnOutcome {
            category,
            classification,
            reply,
            content,
        })
    }

    pub async fn summarize(&self, conversation: &Conversation) -> Result<String> {
        if conversation.is_empty() {
            return Err(SupportError::Session("conversation is empty".to_string()));
        }
        self.summarizer.summarize(conversation.all()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MISSING_KEY_SENTINEL;
    use crate::intent::ClassificationSource;
    use crate::models::{ChatRequest, ChatResponse, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Answers classifier prompts and reply prompts from separate scripts
    struct MockTransport {
        labels: Mutex<Vec<Result<String>>>,
        replies: Mutex<Vec<Result<String>>>,
        calls: Mutex<usize>,
    }

    impl MockTransport {
        fn new(labels: Vec<Result<String>>, replies: Vec<Result<String>>) -> Self {
            Self {
                labels: Mutex::new(labels.into_iter().rev().collect()),
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("mutex")
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn chat(&self, _api_key: &str, req: &ChatRequest) -> Result<ChatResponse> {
            *self.calls.lock().expect("mutex") += 1;
            let prompt = &req.messages[0].content;
            let script = if prompt.contains("You are a bank customer service bot.") {
                &self.labels
            } else {
                &self.replies
            };
            let next = script
                .lock()
                .expect("mutex")
                .pop()
                .unwrap_or_else(|| Err(SupportError::Internal("No more mock responses".to_string())));
            next.map(ChatResponse::from_text)
        }
    }

    fn config(with_key: bool) -> Config {
        let mut cfg = Config::default();
        cfg.mistral.api_key_env = "SUPPORT_CHAT_TEST_UNSET_VAR_0d2e".to_string();
        if with_key {
            cfg.mistral.api_key = Some("sk-test".to_string());
        }
        cfg
    }

    #[tokio::test]
    async fn test_turn_appends_user_then_tagged_assistant() {
        let tx = Arc::new(MockTransport::new(
            vec![Ok("Card Arrival".to_string())],
            vec![Ok("It should arrive within 5 days.".to_string())],
        ));
        let service = SupportService::with_transport(&config(true), tx.clone());
        let mut conv = Conversation::new();

        let outcome = service
            .handle_turn(&mut conv, "When will my card arrive?")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.category, IntentLabel::CardArrival);
        assert_eq!(outcome.classification.source, ClassificationSource::Model);
        assert_eq!(
            outcome.content,
            "**Category:** card arrival\n\nIt should arrive within 5 days."
        );
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.all()[0].role(), Role::User);
        assert_eq!(conv.all()[0].content(), "When will my card arrive?");
        assert_eq!(conv.all()[1].role(), Role::Assistant);
        assert_eq!(conv.all()[1].content(), outcome.content);
        assert_eq!(tx.calls(), 2);
    }

    #[tokio::test]
    async fn test_two_turns_append_four_messages_regardless_of_label() {
        let tx = Arc::new(MockTransport::new(
            vec![Ok("troubleshooting".to_string()), Ok("change pin".to_string())],
            vec![Ok("first".to_string()), Ok("second".to_string())],
        ));
        let service = SupportService::with_transport(&config(true), tx);
        let mut conv = Conversation::new();

        let first = service
            .handle_turn(&mut conv, "Can I get help starting my computer?")
            .await
            .expect("turn should succeed");
        let second = service
            .handle_turn(&mut conv, "How do I change my PIN?")
            .await
            .expect("turn should succeed");

        assert_eq!(first.category, IntentLabel::CustomerService);
        assert_eq!(second.category, IntentLabel::ChangePin);
        let roles: Vec<Role> = conv.all().iter().map(|m| m.role()).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(conv.all()[2].content(), "How do I change my PIN?");
    }

    #[tokio::test]
    async fn test_missing_key_still_completes_turn_with_sentinel() {
        let tx = Arc::new(MockTransport::new(vec![], vec![]));
        let service = SupportService::with_transport(&config(false), tx.clone());
        let mut conv = Conversation::new();

        let outcome = service
            .handle_turn(&mut conv, "hello")
            .await
            .expect("sentinel path is not an error");

        assert_eq!(outcome.category, IntentLabel::CustomerService);
        assert_eq!(outcome.reply, MISSING_KEY_SENTINEL);
        assert_eq!(
            conv.all()[1].content(),
            "**Category:** customer service\n\nERROR: MISTRAL_API_KEY is not set."
        );
        assert_eq!(tx.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_turn_without_assistant_message() {
        let tx = Arc::new(MockTransport::new(
            vec![Ok("charge dispute".to_string())],
            vec![Err(SupportError::Transport("503".to_string()))],
        ));
        let service = SupportService::with_transport(&config(true), tx);
        let mut conv = Conversation::new();

        let err = service
            .handle_turn(&mut conv, "I see a charge I don't know")
            .await
            .expect_err("transport failure must abort the turn");

        assert!(matches!(err, SupportError::Transport(_)));
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.all()[0].role(), Role::User);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_append() {
        let tx = Arc::new(MockTransport::new(vec![], vec![]));
        let service = SupportService::with_transport(&config(true), tx);
        let mut conv = Conversation::new();

        assert!(service.handle_turn(&mut conv, "   ").await.is_err());
        assert!(conv.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_requires_messages() {
        let tx = Arc::new(MockTransport::new(vec![], vec![]));
        let service = SupportService::with_transport(&config(true), tx.clone());

        let err = service
            .summarize(&Conversation::new())
            .await
            .expect_err("empty conversation cannot be summarized");
        assert!(matches!(err, SupportError::Session(_)));
        assert_eq!(tx.calls(), 0);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(TurnPhase::Idle.to_string(), "idle");
        assert_eq!(
            TurnPhase::AwaitingClassification.to_string(),
            "awaiting_classification"
        );
    }
}
