use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::client::ModelClient;
use crate::error::Result;

/// Closed set of inquiry categories the classifier may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentLabel {
    #[serde(rename = "card arrival")]
    CardArrival,
    #[serde(rename = "change pin")]
    ChangePin,
    #[serde(rename = "exchange rate")]
    ExchangeRate,
    #[serde(rename = "country support")]
    CountrySupport,
    #[serde(rename = "cancel transfer")]
    CancelTransfer,
    #[serde(rename = "charge dispute")]
    ChargeDispute,
    #[serde(rename = "customer service")]
    CustomerService,
}

impl IntentLabel {
    pub const ALL: [IntentLabel; 7] = [
        IntentLabel::CardArrival,
        IntentLabel::ChangePin,
        IntentLabel::ExchangeRate,
        IntentLabel::CountrySupport,
        IntentLabel::CancelTransfer,
        IntentLabel::ChargeDispute,
        IntentLabel::CustomerService,
    ];

    /// Label used when the model answer is not one of the known categories.
    pub const FALLBACK: IntentLabel = IntentLabel::CustomerService;

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::CardArrival => "card arrival",
            IntentLabel::ChangePin => "change pin",
            IntentLabel::ExchangeRate => "exchange rate",
            IntentLabel::CountrySupport => "country support",
            IntentLabel::CancelTransfer => "cancel transfer",
            IntentLabel::ChargeDispute => "charge dispute",
            IntentLabel::CustomerService => "customer service",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntent(pub String);

impl fmt::Display for UnknownIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown intent label '{}'", self.0)
    }
}

impl std::error::Error for UnknownIntent {}

/// Exact, case-sensitive match against the label text.
impl FromStr for IntentLabel {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        IntentLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub label: IntentLabel,
    /// Model output before normalization.
    pub raw: String,
    pub source: ClassificationSource,
}

pub const CLASSIFIER_PROMPT: &str = r#"
You are a bank customer service bot.
Your task is to assess customer intent and categorize customer
inquiry after <<<>>> into one of the following predefined categories:
card arrival
change pin
exchange rate
country support
cancel transfer
charge dispute
If the text doesn't fit into any of the above categories,
classify it as:
customer service
You will only respond with the predefined category.
Do not provide explanations or notes.
###
Here are some examples:
Inquiry: How do I know if I will get my card, or if it is lost? I am concerned about the delivery process and would like to ensure that I will receive my card
Category: card arrival
Inquiry: I am planning an international trip to Paris and would like to inquire about the current exchange rates for Euros as well as any associated fees for
Category: exchange rate
Inquiry: What countries are getting support? I will be traveling and living abroad for an extended period of time, specifically in France and Germany, and w
Category: country support
Inquiry: Can I get help starting my computer? I am having difficulty starting my computer, and would appreciate your expertise in helping me troubleshoot th
Category: customer service
###
<<<
Inquiry: {inquiry}
>>>
Category:
"#;

pub fn build_classifier_prompt(inquiry: &str) -> String {
    CLASSIFIER_PROMPT.replace("{inquiry}", inquiry)
}

/// Trim, lowercase, then require an exact label match.
pub fn normalize_label(raw: &str) -> Classification {
    let normalized = raw.trim().to_lowercase();
    match normalized.parse::<IntentLabel>() {
        Ok(label) => Classification {
            label,
            raw: raw.to_string(),
            source: ClassificationSource::Model,
        },
        Err(_) => Classification {
            label: IntentLabel::FALLBACK,
            raw: raw.to_string(),
            source: ClassificationSource::Fallback,
        },
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify_detailed(&self, inquiry: &str) -> Result<Classification>;

    async fn classify(&self, inquiry: &str) -> Result<IntentLabel> {
        Ok(self.classify_detailed(inquiry).await?.label)
    }
}

pub struct LlmIntentClassifier {
    client: Arc<ModelClient>,
}

impl LlmIntentClassifier {
    pub fn new(client: Arc<ModelClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify_detailed(&self, inquiry: &str) -> Result<Classification> {
        let prompt = build_classifier_prompt(inquiry);
        let raw = self.client.complete(&prompt).await?;
        let classification = normalize_label(&raw);

        if classification.source == ClassificationSource::Fallback {
            tracing::debug!(
                raw = %classification.raw,
                fallback = %classification.label,
                "Classifier output outside label set, using fallback"
            );
        } else {
            tracing::info!("Classified inquiry as '{}'", classification.label);
        }

        Ok(classification)
    }
}
