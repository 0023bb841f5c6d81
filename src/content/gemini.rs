use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{prompt, ContentService, GenerationError, ImageRequest, RefineRequest, TextRequest};
use crate::config::Config;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/";

/// Generative Language API client. One HTTP request per call, no retry.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    temperature: f32,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: Url,
        timeout: Duration,
        temperature: f32,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .user_agent("omnipost/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            temperature,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, GenerationError> {
        let base_url = Url::parse(&cfg.gemini.base_url)
            .map_err(|e| GenerationError::InvalidResponse(format!("bad base url: {}", e)))?;
        Self::new(
            cfg.resolved_api_key(),
            base_url,
            Duration::from_secs(cfg.gemini.timeout_seconds),
            cfg.gemini.temperature,
        )
    }

    pub fn endpoint(&self, model: &str) -> Result<Url, GenerationError> {
        self.base_url
            .join(&format!("v1beta/models/{}:generateContent", model))
            .map_err(|e| GenerationError::InvalidResponse(format!("bad endpoint: {}", e)))
    }

    async fn execute(&self, model: &str, body: &Value) -> Result<Value, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let url = self.endpoint(model)?;
        debug!(%url, model, "content service request");

        let res = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model, "content service error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res.json::<Value>().await?)
    }
}

#[async_trait]
impl ContentService for GeminiClient {
    #[instrument(skip_all, fields(surface = %req.surface))]
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GenerationError> {
        let body = build_text_body(req, self.temperature);
        let payload = self.execute(req.model_tier.text_model(), &body).await?;
        parse_text_response(&payload)
    }

    #[instrument(skip_all, fields(surface = %req.surface))]
    async fn generate_image(&self, req: &ImageRequest) -> Result<String, GenerationError> {
        let body = build_image_body(req);
        let payload = self.execute(req.model_tier.image_model(), &body).await?;
        parse_image_response(&payload)
    }

    #[instrument(skip_all, fields(surface = %req.surface, action = %req.action))]
    async fn refine(&self, req: &RefineRequest) -> Result<String, GenerationError> {
        let body = build_refine_body(req, self.temperature);
        let payload = self.execute(req.model_tier.text_model(), &body).await?;
        parse_text_response(&payload)
    }
}

pub fn build_text_body(req: &TextRequest, temperature: f32) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": prompt::text_instruction(req) }] },
        "contents": [{ "role": "user", "parts": [{ "text": req.topic }] }],
        "generationConfig": { "temperature": temperature },
    })
}

pub fn build_refine_body(req: &RefineRequest, temperature: f32) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": prompt::refine_instruction(req) }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt::refine_content(req) }] }],
        "generationConfig": { "temperature": temperature },
    })
}

pub fn build_image_body(req: &ImageRequest) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt::image_prompt(req) }] }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": req.surface.aspect_ratio() },
        },
    })
}

fn candidate_parts(payload: &Value) -> impl Iterator<Item = &Value> {
    payload["candidates"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|c| c["content"]["parts"].as_array())
        .flatten()
}

/// Concatenate the text parts of the first candidate.
pub fn parse_text_response(payload: &Value) -> Result<String, GenerationError> {
    let first = payload["candidates"]
        .as_array()
        .and_then(|arr| arr.first())
        .ok_or_else(|| GenerationError::InvalidResponse("missing candidates".into()))?;
    let text: String = first["content"]["parts"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["text"].as_str())
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyText);
    }
    Ok(text.to_string())
}

/// First inline `image/*` part across all candidates, as a `data:` URL.
pub fn parse_image_response(payload: &Value) -> Result<String, GenerationError> {
    candidate_parts(payload)
        .find_map(|part| {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))?
                .as_str()?;
            if !mime.starts_with("image/") {
                return None;
            }
            let data = inline["data"].as_str()?;
            Some(format!("data:{};base64,{}", mime, data))
        })
        .ok_or(GenerationError::NoImage)
}
