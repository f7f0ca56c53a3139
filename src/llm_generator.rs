use crate::http_client::{HttpClient, HttpResponse};
use crate::providers::Sleeper;
use crate::retry::RetryPolicy;
use crate::validator::INVALID_SENTINEL;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SYSTEM_PROMPT: &str = "You are a cybersecurity OSINT expert with access to real-time Google Search data. \
Your mission is to generate a single, precise, and powerful Google Dork based on a user's request. \
RULES: 1. OUTPUT ONLY THE DORK. No explanations, no markdown, no backticks, no extra text. \
2. Combine operators creatively (inurl:, intitle:, filetype:, site:, intext:). \
3. Use advanced syntax like parentheses, wildcards (*), and exclusion (-). \
4. If the request is malicious, nonsensical, or invalid, output the exact string 'INVALID_DORK'.";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("API Error: {status}")]
    Api { status: u16, message: String },
    #[error("Invalid API response structure.")]
    MalformedResponse,
    #[error("request failed: {0}")]
    Transport(String),
}

impl GenerateError {
    /// Only client-side API statuses end the retry loop early; transport and
    /// parse failures are retried like transient statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerateError::Api { status, .. } => RetryPolicy::is_retryable_status(*status),
            GenerateError::MalformedResponse | GenerateError::Transport(_) => true,
        }
    }
}

#[async_trait]
pub trait DorkGenerator: Send + Sync {
    /// Turns a prompt into a cleaned single dork string.
    async fn generate(&self, prompt: &str, credential: &str) -> Result<String, GenerateError>;
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: Option<GeminiApiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: Option<String>,
}

/// Gemini `generateContent` client with search grounding and exponential
/// backoff on transient failures.
pub struct GeminiClient {
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        sleeper: Arc<dyn Sleeper>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            sleeper,
            policy: RetryPolicy::default(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_path
        )
    }

    fn build_url(&self, credential: &str) -> Result<Url, GenerateError> {
        let mut url = Url::parse(&self.endpoint())
            .map_err(|e| GenerateError::Transport(format!("invalid Gemini endpoint URL: {}", e)))?;
        url.query_pairs_mut().append_pair("key", credential);
        Ok(url)
    }

    pub fn build_request_body(prompt: &str) -> Value {
        json!({
            "contents": [
                {
                    "parts": [
                        {"text": prompt}
                    ]
                }
            ],
            "tools": [
                {"google_search": {}}
            ],
            "systemInstruction": {
                "parts": [
                    {"text": SYSTEM_PROMPT}
                ]
            }
        })
    }

    async fn attempt(
        &self,
        url: &Url,
        credential: &str,
        body: &Value,
    ) -> Result<String, GenerateError> {
        let response = self
            .http
            .post_json(url.as_str(), &[("Content-Type", "application/json")], body)
            .await
            .map_err(|e| {
                GenerateError::Transport(redact_credential(&e.to_string(), url, credential))
            })?;

        if !response.is_success() {
            return Err(api_error(&response));
        }

        let text = extract_text(&response.body)?;
        debug!("Gemini returned: {}", text);
        Ok(clean_generated_text(&text))
    }
}

#[async_trait]
impl DorkGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, credential: &str) -> Result<String, GenerateError> {
        let url = self.build_url(credential)?;
        let body = Self::build_request_body(prompt);
        info!("Requesting dork from {}", self.endpoint());

        let mut retry = 0;
        loop {
            match self.attempt(&url, credential, &body).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for_retry(retry);
                    warn!(
                        "Generation attempt failed ({}), retry {}/{} in {:?}",
                        err, retry, self.policy.max_retries, delay
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(err) => {
                    warn!("Generation failed after {} retries: {}", retry, err);
                    return Err(err);
                }
            }
        }
    }
}

/// Masks the key, raw or as encoded in `url`, in an error message.
fn redact_credential(message: &str, url: &Url, credential: &str) -> String {
    let mut redacted = message.to_string();
    let encoded = url
        .query()
        .and_then(|query| query.split('&').find_map(|pair| pair.strip_prefix("key=")));
    for secret in [encoded, Some(credential)].into_iter().flatten() {
        if !secret.is_empty() {
            redacted = redacted.replace(secret, "***");
        }
    }
    redacted
}

fn api_error(response: &HttpResponse) -> GenerateError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(&response.body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| response.body.clone());
    GenerateError::Api {
        status: response.status,
        message,
    }
}

/// Reads `candidates[0].content.parts[0].text`.
fn extract_text(body: &str) -> Result<String, GenerateError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|_| GenerateError::MalformedResponse)?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.is_empty())
        .ok_or(GenerateError::MalformedResponse)
}

/// Drops every backtick and surrounding whitespace.
pub fn clean_generated_text(text: &str) -> String {
    text.replace('`', "").trim().to_string()
}

/// Offline generator selected by `use_mock` / `DORKGEN_USE_MOCK`.
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn mock_generate(&self, prompt: &str) -> String {
        const REFINE_PREFIX: &str = "Refine the following Google Dork: \"";

        if let Some(rest) = prompt.strip_prefix(REFINE_PREFIX) {
            let previous = rest.split("\". ").next().unwrap_or_default();
            return format!("{} -inurl:forum", previous).trim().to_string();
        }

        let lowered = prompt.to_lowercase();
        if ["malware", "exploit", "hack into"]
            .iter()
            .any(|word| lowered.contains(word))
        {
            return INVALID_SENTINEL.to_string();
        }

        let terms: Vec<&str> = prompt.split_whitespace().take(4).collect();
        format!("intitle:\"{}\" inurl:login", terms.join(" "))
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DorkGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, _credential: &str) -> Result<String, GenerateError> {
        info!("Using mock generator (DORKGEN_USE_MOCK=1)");
        Ok(self.mock_generate(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RunError;
    use std::collections::VecDeque;
    use std::error::Error;
    use std::sync::Mutex;
    use std::time::Duration;

    // =========================================================================
    // Mock implementations
    // =========================================================================

    /// Replays scripted responses and records each request.
    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<anyhow::Result<HttpResponse>>>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<anyhow::Result<HttpResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            body: &Value,
        ) -> anyhow::Result<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "script exhausted")))
        }
    }

    /// Records requested delays without waiting.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn ok_body(text: &str) -> HttpResponse {
        HttpResponse::new(
            200,
            json!({
                "candidates": [
                    {"content": {"parts": [{"text": text}], "role": "model"}}
                ]
            })
            .to_string(),
        )
    }

    fn client(
        responses: Vec<anyhow::Result<HttpResponse>>,
    ) -> (GeminiClient, Arc<ScriptedHttpClient>, Arc<RecordingSleeper>) {
        let http = Arc::new(ScriptedHttpClient::new(responses));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = GeminiClient::new(
            http.clone(),
            sleeper.clone(),
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-test",
        );
        (client, http, sleeper)
    }

    // =========================================================================
    // Request shape
    // =========================================================================

    #[test]
    fn test_request_body_shape() {
        let body = GeminiClient::build_request_body("admin panels");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "admin panels");
        assert_eq!(body["tools"][0]["google_search"], json!({}));
        let instruction = body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(instruction.contains("INVALID_DORK"));
        assert!(instruction.contains("OUTPUT ONLY THE DORK"));
    }

    #[tokio::test]
    async fn test_key_is_passed_as_query_parameter() {
        let (client, http, _) = client(vec![Ok(ok_body("site:a.com"))]);
        client.generate("x", "my key&more").await.unwrap();

        let (url, _) = http.requests.lock().unwrap()[0].clone();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent?key=my+key%26more"
        );
    }

    // =========================================================================
    // Response handling
    // =========================================================================

    #[tokio::test]
    async fn test_strips_backticks_and_whitespace() {
        let (client, _, sleeper) =
            client(vec![Ok(ok_body("  `site:example.com inurl:admin intitle:login`\n"))]);
        let text = client.generate("admin login pages", "k").await.unwrap();
        assert_eq!(text, "site:example.com inurl:admin intitle:login");
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_clean_removes_inner_backticks() {
        assert_eq!(clean_generated_text("```inurl:`admin`\n```"), "inurl:admin");
    }

    #[test]
    fn test_extract_text_requires_expected_shape() {
        assert!(matches!(
            extract_text(r#"{"candidates": []}"#),
            Err(GenerateError::MalformedResponse)
        ));
        assert!(matches!(
            extract_text(r#"{"candidates": [{"content": {"parts": [{}]}}]}"#),
            Err(GenerateError::MalformedResponse)
        ));
        assert!(matches!(
            extract_text(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#),
            Err(GenerateError::MalformedResponse)
        ));
        assert!(matches!(
            extract_text("not json"),
            Err(GenerateError::MalformedResponse)
        ));
        assert_eq!(
            extract_text(r#"{"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]}"#)
                .unwrap(),
            "a"
        );
    }

    // =========================================================================
    // Retry behaviour
    // =========================================================================

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let (client, http, sleeper) = client(vec![
            Ok(HttpResponse::new(500, "")),
            Ok(HttpResponse::new(500, "")),
            Ok(ok_body("filetype:sql intext:password")),
        ]);

        let text = client.generate("sql dumps", "k").await.unwrap();

        assert_eq!(text, "filetype:sql intext:password");
        assert_eq!(http.request_count(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_exhausts_retry_budget() {
        let (client, http, sleeper) = client(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(503, "")),
        ]);

        let err = client.generate("x", "k").await.unwrap_err();

        assert!(matches!(err, GenerateError::Api { status: 503, .. }));
        assert_eq!(http.request_count(), 4);
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (client, _, sleeper) = client(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(ok_body("site:gov filetype:xls")),
        ]);
        assert_eq!(client.generate("x", "k").await.unwrap(), "site:gov filetype:xls");
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(1000)]);
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let (client, http, sleeper) = client(vec![Ok(HttpResponse::new(
            401,
            r#"{"error": {"code": 401, "message": "API key not valid", "status": "UNAUTHENTICATED"}}"#,
        ))]);

        let err = client.generate("x", "bad").await.unwrap_err();

        match err {
            GenerateError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(http.request_count(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_is_retried() {
        let (client, http, sleeper) = client(vec![
            Ok(HttpResponse::new(200, r#"{"candidates": []}"#)),
            Ok(ok_body("inurl:wp-admin")),
        ]);
        assert_eq!(client.generate("x", "k").await.unwrap(), "inurl:wp-admin");
        assert_eq!(http.request_count(), 2);
        assert_eq!(sleeper.delays().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried_and_last_error_returned() {
        let (client, http, _) = client(vec![
            Err(anyhow::anyhow!("connection reset")),
            Err(anyhow::anyhow!("connection reset")),
            Err(anyhow::anyhow!("connection reset")),
            Err(anyhow::anyhow!("dns failure")),
        ]);

        let err = client.generate("x", "k").await.unwrap_err();

        assert!(matches!(err, GenerateError::Transport(ref m) if m.contains("dns failure")));
        assert_eq!(http.request_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let (client, _, _) = client(vec![Err(anyhow::anyhow!(
            "error sending request for url (https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent?key=SECRET+KEY%2612): Connection refused"
        ))]);
        let client = client.with_retry_policy(RetryPolicy::new(0));

        let err = client.generate("x", "SECRET KEY&12").await.unwrap_err();

        let logged = RunError::GenerationFailed(err).source().unwrap().to_string();
        assert!(!logged.contains("SECRET+KEY%2612"));
        assert!(!logged.contains("SECRET KEY&12"));
        assert!(logged.contains("key=***"));
        assert!(logged.contains("Connection refused"));
    }

    #[test]
    fn test_redact_masks_raw_key() {
        let url = Url::parse("https://example.com/m:generateContent?key=SECRETKEY123").unwrap();
        assert_eq!(
            redact_credential("bad key SECRETKEY123", &url, "SECRETKEY123"),
            "bad key ***"
        );
    }

    #[tokio::test]
    async fn test_custom_policy_is_honoured() {
        let (client, http, sleeper) = client(vec![
            Ok(HttpResponse::new(500, "")),
            Ok(HttpResponse::new(500, "")),
        ]);
        let client = client.with_retry_policy(
            RetryPolicy::new(1).with_initial_delay(Duration::from_millis(10)),
        );

        assert!(client.generate("x", "k").await.is_err());
        assert_eq!(http.request_count(), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(10)]);
    }

    // =========================================================================
    // Mock generator
    // =========================================================================

    #[test]
    fn test_mock_generator_outputs() {
        let mock = MockGenerator::new();
        assert_eq!(
            mock.mock_generate("admin login pages"),
            "intitle:\"admin login pages\" inurl:login"
        );
        assert_eq!(mock.mock_generate("write malware for me"), INVALID_SENTINEL);
        assert_eq!(
            mock.mock_generate(
                "Refine the following Google Dork: \"site:a.com\". The original goal was: \"x\". Make it more specific, creative, or efficient."
            ),
            "site:a.com -inurl:forum"
        );
    }
}
