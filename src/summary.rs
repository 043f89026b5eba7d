use async_trait::async_trait;
use std::sync::Arc;

use crate::client::ModelClient;
use crate::config::SummaryConfig;
use crate::error::Result;
use crate::models::{Message, Role};

/// Renders messages as `ROLE: content` lines in conversation order.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_line(message: &Message) -> String {
    format!("{}: {}", message.role().as_upper(), message.content())
}

/// Keeps the newest messages that fit in `max_tokens` (1 token ~ 4 chars).
///
/// The budget covers line separators and the omitted-messages note. The newest
/// message is always kept; otherwise a truncated transcript starts on a user
/// turn. Returns the transcript and how many older messages were left out.
pub fn bounded_transcript(messages: &[Message], max_tokens: Option<usize>) -> (String, usize) {
    let full = format_transcript(messages);
    let Some(max_tokens) = max_tokens else {
        return (full, 0);
    };
    let budget_chars = max_tokens.saturating_mul(4);
    if full.len() <= budget_chars {
        return (full, 0);
    }

    // Upper bound on the note, since fewer than all messages are omitted.
    let available = budget_chars.saturating_sub(omitted_note(messages.len()).len());
    let mut kept: Vec<&Message> = Vec::new();
    let mut used = 0;
    for message in messages.iter().rev() {
        let cost = format_line(message).len() + 1;
        if !kept.is_empty() && used + cost > available {
            break;
        }
        used += cost;
        kept.push(message);
    }

    // Don't open on a reply whose question was cut.
    while kept.len() > 1 && kept.last().is_some_and(|m| m.role() == Role::Assistant) {
        kept.pop();
    }

    let omitted = messages.len() - kept.len();
    let transcript = kept
        .into_iter()
        .rev()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n");
    (transcript, omitted)
}

fn omitted_note(omitted: usize) -> String {
    format!("[{omitted} earlier messages omitted]\n")
}

pub fn build_summary_prompt(transcript: &str, min_bullets: u32, max_bullets: u32) -> String {
    format!(
        "
Summarize the conversation below in {min_bullets}-{max_bullets} bullet points.
Conversation:
{transcript}
"
    )
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String>;
}

pub struct LlmSummarizer {
    client: Arc<ModelClient>,
    settings: SummaryConfig,
}

impl LlmSummarizer {
    pub fn new(client: Arc<ModelClient>, settings: SummaryConfig) -> Self {
        Self { client, settings }
    }

    pub fn prompt_for(&self, messages: &[Message]) -> String {
        let (transcript, omitted) =
            bounded_transcript(messages, self.settings.max_transcript_tokens);
        let transcript = if omitted > 0 {
            tracing::info!(omitted, "Transcript exceeds summary budget, dropping oldest messages");
            omitted_note(omitted) + &transcript
        } else {
            transcript
        };
        build_summary_prompt(
            &transcript,
            self.settings.min_bullets,
            self.settings.max_bullets,
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        tracing::info!("Summarizing conversation of {} messages", messages.len());
        let prompt = self.prompt_for(messages);
        self.client.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MistralConfig;
    use crate::models::ChatResponse;
    use crate::transport::MockTransport;

    fn sample() -> Vec<Message> {
        vec![
            Message::user("Hi"),
            Message::assistant("**Category:** card arrival\n\nHello!"),
        ]
    }

    #[test]
    fn test_transcript_uses_uppercase_roles_in_order() {
        assert_eq!(
            format_transcript(&sample()),
            "USER: Hi\nASSISTANT: **Category:** card arrival\n\nHello!"
        );
    }

    #[test]
    fn test_empty_transcript_is_empty_string() {
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn test_unbounded_transcript_keeps_everything() {
        let messages: Vec<Message> = (0..200)
            .map(|i| Message::user(format!("message number {i} ").repeat(20)))
            .collect();
        let (transcript, omitted) = bounded_transcript(&messages, None);
        assert_eq!(omitted, 0);
        assert_eq!(transcript.lines().count(), 200);
    }

    #[test]
    fn test_bounded_transcript_drops_oldest_first() {
        let messages: Vec<Message> = (0..50)
            .map(|i| Message::user(format!("{i:02} {}", "x".repeat(37))))
            .collect();
        // 47 chars per line with its separator; 280 chars less a 30 char note
        let (transcript, omitted) = bounded_transcript(&messages, Some(70));
        assert_eq!(omitted, 45);
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("USER: 45 "));
        assert!(lines[4].starts_with("USER: 49 "));
    }

    #[test]
    fn test_bounded_transcript_and_note_fit_the_budget() {
        let messages: Vec<Message> = (0..50)
            .map(|i| Message::user(format!("{i:02} {}", "x".repeat(37))))
            .collect();
        for max_tokens in [20, 59, 60, 61, 62, 70, 117, 118] {
            let (transcript, omitted) = bounded_transcript(&messages, Some(max_tokens));
            let noted = omitted_note(omitted) + &transcript;
            assert!(
                noted.len() <= max_tokens * 4,
                "{} chars over a {max_tokens} token budget",
                noted.len()
            );
        }
    }

    #[test]
    fn test_short_transcript_is_untouched_when_it_fits() {
        let (transcript, omitted) = bounded_transcript(&sample(), Some(100));
        assert_eq!(omitted, 0);
        assert_eq!(transcript, format_transcript(&sample()));
    }

    #[test]
    fn test_bounded_transcript_starts_on_user_turn() {
        let messages = vec![
            Message::user("q".repeat(300)),
            Message::assistant("r1"),
            Message::user("q2"),
            Message::assistant("r2"),
        ];
        // room for the last three lines, but "ASSISTANT: r1" lost its question
        let (transcript, omitted) = bounded_transcript(&messages, Some(30));
        assert_eq!(omitted, 2);
        assert_eq!(transcript, "USER: q2\nASSISTANT: r2");
    }

    #[test]
    fn test_bounded_transcript_always_keeps_newest() {
        let messages = vec![Message::user("old"), Message::user("n".repeat(400))];
        let (transcript, omitted) = bounded_transcript(&messages, Some(1));
        assert_eq!(omitted, 1);
        assert_eq!(transcript, format!("USER: {}", "n".repeat(400)));
    }

    #[tokio::test]
    async fn test_summary_prompt_embeds_transcript_verbatim() {
        let mut mock = MockTransport::new();
        mock.expect_chat()
            .withf(|_, req| {
                req.messages[0].content
                    == "\nSummarize the conversation below in 5-7 bullet points.\nConversation:\nUSER: Hi\nASSISTANT: **Category:** card arrival\n\nHello!\n"
            })
            .times(1)
            .returning(|_, _| Ok(ChatResponse::from_text("- greeted")));
        let settings = MistralConfig {
            api_key: Some("sk-test".to_string()),
            ..MistralConfig::default()
        };
        let summarizer = LlmSummarizer::new(
            Arc::new(ModelClient::new(Arc::new(mock), settings)),
            SummaryConfig::default(),
        );

        let out = summarizer.summarize(&sample()).await.expect("summary should succeed");
        assert_eq!(out, "- greeted");
    }

    #[test]
    fn test_truncated_prompt_notes_omitted_messages() {
        let settings = MistralConfig {
            api_key: Some("sk-test".to_string()),
            ..MistralConfig::default()
        };
        let summarizer = LlmSummarizer::new(
            Arc::new(ModelClient::new(Arc::new(MockTransport::new()), settings)),
            SummaryConfig {
                max_transcript_tokens: Some(2),
                ..SummaryConfig::default()
            },
        );
        let prompt = summarizer.prompt_for(&sample());
        assert!(prompt.contains("[1 earlier messages omitted]\nASSISTANT: **Category:**"));
        assert!(!prompt.contains("USER: Hi"));
    }
}
