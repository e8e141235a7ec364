//! Code generation gateway.
//!
//! [`CodeModel`] abstracts the hosted LLM so the generation flow can be tested
//! with scripted doubles. [`GeminiClient`] is the production implementation.
//! [`CodeGenerator`] renders prompts, calls the model, and for the mobile
//! dialect applies the web-framework heuristic with a single regeneration.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::credentials::{Credential, KeyStatus};
use crate::errors::GatewayError;
use crate::prompt::{self, GenerationRequest, TargetDialect};

/// Fallback file name when nothing better can be derived from the code.
pub const DEFAULT_FILENAME: &str = "generated_app.py";

/// Lower-cased substrings that indicate web-UI code where Python was requested.
const WEB_MARKERS: &[&str] = &[
    "import react",
    "from 'react'",
    "from \"react\"",
    "reactdom",
    "usestate(",
    "<!doctype html",
    "<html",
    "<div",
    "document.getelementbyid",
    "export default",
    "console.log(",
];

/// Abstraction over the hosted LLM for testability.
#[async_trait]
pub trait CodeModel: Send + Sync {
    /// Send `prompt` and return the generated text.
    async fn complete(&self, prompt: &str, credential: &Credential) -> Result<String, GatewayError>;

    /// Advisory validity check of an API key.
    async fn check_key(&self, key: &str) -> KeyStatus;
}

/// Result of one generation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub generated_code: String,
    pub filename: String,
    /// True when the first answer tripped the web-code heuristic and was regenerated.
    pub regenerated: bool,
}

/// Return the first web-framework marker found in `code`, if any.
pub fn find_web_marker(code: &str) -> Option<&'static str> {
    let lower = code.to_lowercase();
    WEB_MARKERS.iter().copied().find(|m| lower.contains(m))
}

static APP_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)App\b").expect("valid regex")
});
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)").expect("valid regex"));

/// Derive a file name from the class names in generated Python code.
///
/// `class CalculatorApp(App)` → `calculator_app.py`; otherwise the first
/// `class Foo` → `foo.py`; otherwise [`DEFAULT_FILENAME`].
pub fn suggest_filename(code: &str) -> String {
    if let Some(caps) = APP_CLASS_RE.captures(code) {
        return format!("{}_app.py", caps[1].to_lowercase());
    }
    if let Some(caps) = CLASS_RE.captures(code) {
        return format!("{}.py", caps[1].to_lowercase());
    }
    DEFAULT_FILENAME.to_string()
}

/// Generation flows on top of a [`CodeModel`].
#[derive(Clone)]
pub struct CodeGenerator {
    model: Arc<dyn CodeModel>,
}

impl CodeGenerator {
    pub fn new(model: Arc<dyn CodeModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn CodeModel> {
        &self.model
    }

    /// Generate code in whatever language the request implies.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResult, GatewayError> {
        let rendered = prompt::render(request, TargetDialect::Any);
        let code = self.call(&rendered, credential).await?;
        Ok(GenerationResult {
            filename: suggest_filename(&code),
            generated_code: code,
            regenerated: false,
        })
    }

    /// Generate a Kivy/Android Python file. If the answer looks like web code,
    /// regenerate once with a stricter instruction and return that answer as is.
    pub async fn generate_mobile(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResult, GatewayError> {
        let rendered = prompt::render(request, TargetDialect::KivyAndroid);
        let first = self.call(&rendered, credential).await?;

        let Some(marker) = find_web_marker(&first) else {
            return Ok(GenerationResult {
                filename: suggest_filename(&first),
                generated_code: first,
                regenerated: false,
            });
        };

        tracing::warn!(marker, "Generated code looks like web code, regenerating once");
        let strict = prompt::render_strict_retry(request);
        let retry = self.call(&strict, credential).await?;
        if let Some(marker) = find_web_marker(&retry) {
            tracing::warn!(marker, "Regenerated code still contains a web marker");
        }
        Ok(GenerationResult {
            filename: suggest_filename(&retry),
            generated_code: retry,
            regenerated: true,
        })
    }

    async fn call(&self, prompt: &str, credential: &Credential) -> Result<String, GatewayError> {
        if !credential.is_present() {
            return Err(GatewayError::MissingApiKey);
        }
        let start = std::time::Instant::now();
        let text = self.model.complete(prompt, credential).await?;
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        tracing::debug!(
            prompt_chars = prompt.len(),
            response_chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "LLM call complete"
        );
        Ok(text)
    }
}

// ── Gemini ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CodeModel for GeminiClient {
    async fn complete(&self, prompt: &str, credential: &Credential) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.temperature
            }
        });

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &credential.value)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, body });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let text = parsed.text();
        if text.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(text)
    }

    async fn check_key(&self, key: &str) -> KeyStatus {
        if key.trim().is_empty() {
            return KeyStatus::Unchecked;
        }
        let url = format!("{}/v1beta/models?pageSize=1", self.base_url);
        match self.client.get(url).header("x-goog-api-key", key).send().await {
            Ok(resp) => match resp.status().as_u16() {
                200..=299 => KeyStatus::Valid,
                400 | 401 | 403 => KeyStatus::Invalid,
                _ => KeyStatus::Unchecked,
            },
            Err(e) => {
                tracing::debug!("API key check failed: {}", e);
                KeyStatus::Unchecked
            }
        }
    }
}
