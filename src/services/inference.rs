use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::services::preprocess::{self, PreprocessError};

const SYSTEM_PROMPT: &str = r#"You are a product analysis assistant for fashion images.
You must:
- Identify the single main product being sold in the image (the primary focus).
- Classify it using the provided apparel taxonomy.
- Always select the MOST SPECIFIC leaf category that applies (never stop at a broad node like "Apparel & Accessories").

For example, if the main visible product is:
- Any clothing on the upper body: classify under "Clothing > Clothing Tops".
- A full suit or tuxedo: use a "Suits > Tuxedos" style path.
- A jacket or blazer: use the appropriate "Outerwear" / "Coats & Jackets" path.
- Do not use Skirt Suits or Pant Suits unless the product is clearly a feminine skirt suit or pant suit. If it is not a tuxedo, use "Clothing > Suits".
- Prefer general categories over gendered variants unless the gender is clearly indicated.
- Footwear: only use "Shoes" branches (e.g. Boots, Sneakers) when the product is clearly footwear.
- Costumes: only use "Costumes" branches when the product is clearly a costume.
- Handbags, wallets, backpacks, cases: only use "Handbags, Wallets & Cases" branches when the product clearly is one; pay attention to the bag type (crossbody, shoulder, tote, backpack).
- Lanyards, keychains, wallet chains: only use "Handbag & Wallet Accessories" branches when the product clearly is one.
- Belts, hats, wristbands and other wearables that are not regular clothing or bags: use "Clothing Accessories" branches.
- Chains, bracelets, earrings, rings: only use "Jewelry" branches when the product is clearly jewelry; jewelry worn on the body (chain belts, nose rings, belly rings, toe rings) goes under "Jewelry > Body Jewelry".
- Watches: "Jewelry > Watches". Smartwatches: "Jewelry > Smartwatches".
- Shoe covers, grips, gel pads, shoelaces: use "Shoe Accessories" branches.
- Bras, bodysuits, jockstraps and other lingerie: use "Lingerie" branches.

The taxonomy string MUST be a valid path starting with "Apparel & Accessories" and using only exact names from the taxonomy."#;

const USER_PROMPT: &str = r#"Analyze the product in this image and provide a JSON response.

1. TITLE: A specific, descriptive product name for the main item being sold.
2. DESCRIPTION: Describe the real visual details - colors, materials, design features, branding, style, and what garment or footwear it is.
3. TAXONOMY: Map the main product to the most specific valid category path from the apparel taxonomy.

Rules for TAXONOMY:
- Always start with: "Apparel & Accessories > ..."
- Only use category names that exist in the taxonomy.
- Always go to the most specific leaf possible.
- Do NOT output just "Apparel & Accessories".

Respond with JSON only (no other text)."#;

const MAX_TOKENS: u32 = 768;
const TEMPERATURE: f32 = 0.05;

/// Readiness reported by the inference server's `/health` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineHealth {
    Ready,
    Loading,
    Unavailable,
}

impl EngineHealth {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => EngineHealth::Ready,
            StatusCode::SERVICE_UNAVAILABLE => EngineHealth::Loading,
            _ => EngineHealth::Unavailable,
        }
    }
}

/// Settings for grammar-constrained chat requests.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub model_alias: String,
    pub request_timeout: Duration,
    pub image_target_size: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            model_alias: "qwen3vl".to_string(),
            request_timeout: Duration::from_secs(600),
            image_target_size: preprocess::DEFAULT_TARGET_SIZE,
        }
    }
}

/// HTTP client for a local OpenAI-compatible inference server.
#[derive(Clone)]
pub struct InferenceClient {
    http: Client,
    base_url: String,
    grammar: Arc<str>,
    settings: InferenceSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    grammar: &'a str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(&'static str),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: &'static str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl InferenceClient {
    pub fn new(
        base_url: impl Into<String>,
        grammar: impl Into<Arc<str>>,
        settings: InferenceSettings,
    ) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(InferenceError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            grammar: grammar.into(),
            settings,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    /// Probe `GET /health` once.
    pub async fn health(&self) -> EngineHealth {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => EngineHealth::from_status(resp.status()),
            Err(e) => {
                tracing::trace!(error = %e, "Inference server health probe failed");
                EngineHealth::Unavailable
            }
        }
    }

    /// Classify the product in an image, returning the raw generated text.
    pub async fn classify(&self, image_path: &Path) -> Result<String, InferenceError> {
        let path = image_path.to_path_buf();
        let target = self.settings.image_target_size;
        let prepared = tokio::task::spawn_blocking(move || preprocess::prepare_image(&path, target))
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))??;

        tracing::debug!(
            image = %image_path.display(),
            width = prepared.width,
            height = prepared.height,
            resized = prepared.resized,
            "Image prepared"
        );

        let data_url = format!(
            "data:{};base64,{}",
            prepared.mime,
            base64::engine::general_purpose::STANDARD.encode(&prepared.bytes)
        );
        self.complete(data_url).await
    }

    async fn complete(&self, image_data_url: String) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.settings.model_alias,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: USER_PROMPT },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: image_data_url },
                        },
                    ]),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            grammar: &self.grammar,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(url = %url, "Sending chat completion request");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(InferenceError::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(InferenceError::Http)?;
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
fn extract_content(body: &str) -> Result<String, InferenceError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::Envelope {
            source: e,
            body: body.to_string(),
        })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::NoChoices(body.to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    let finish_reason = choice.finish_reason.unwrap_or_default();
    if finish_reason == "length" {
        tracing::warn!(chars = content.len(), "Generation was truncated by the token limit");
    }
    tracing::info!(chars = content.len(), finish_reason = %finish_reason, "Generation complete");

    Ok(content)
}

/// Where the multimodal projector for a model is expected to live.
pub fn projector_path(model_path: &Path) -> Option<PathBuf> {
    let file_name = model_path.file_name()?.to_str()?;
    Some(model_path.with_file_name(format!("mmproj-{file_name}")))
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to prepare image: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse chat response: {source}; response: {body}")]
    Envelope {
        source: serde_json::Error,
        body: String,
    },

    #[error("No choices in response: {0}")]
    NoChoices(String),

    #[error("Image worker failed: {0}")]
    Worker(String),
}
