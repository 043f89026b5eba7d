use async_trait::async_trait;
use std::sync::Arc;

use crate::client::ModelClient;
use crate::error::Result;
use crate::intent::IntentLabel;

/// Support facts the assistant is allowed to rely on, one bullet per category.
pub const POLICY_FACTS: &str = "
- Card arrival: Cards usually arrive within the delivery window stated in the app. If delayed, we can help check status.
- Change PIN: You can change your PIN from the app/ATM depending on your card type.
- Exchange rate: Exchange rates vary by currency and time; fees may apply depending on the transfer type.
- Country support: Card usage/support varies by country; tell us which country you’re traveling to.
- Cancel transfer: Some transfers can be canceled only if they are still pending.
- Charge dispute: If you see an unrecognized charge, we can open a dispute after we verify the transaction details.
- Customer service: For anything else, we’ll guide you to the right support step.
";

pub fn build_reply_prompt(inquiry: &str, category: IntentLabel) -> String {
    format!(
        "
You are a helpful customer support assistant.
The user’s message was classified as: {category}

Use the following support facts/policy:
{POLICY_FACTS}

Now answer the user clearly and concisely, and ask ONE follow-up question if needed.

User message: {inquiry}
"
    )
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, inquiry: &str, category: IntentLabel) -> Result<String>;
}

pub struct LlmReplyGenerator {
    client: Arc<ModelClient>,
}

impl LlmReplyGenerator {
    pub fn new(client: Arc<ModelClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReplyGenerator for LlmReplyGenerator {
    async fn generate_reply(&self, inquiry: &str, category: IntentLabel) -> Result<String> {
        tracing::info!("Generating reply for category '{}'", category);
        let prompt = build_reply_prompt(inquiry, category);
        self.client.complete(&prompt).await
    }
}
