// src/llm_extract.rs

use crate::config::{LlmBackend, LlmSection};
use crate::error::{Result, TallyError};
use crate::heuristics::{BrandTable, ReceiptRecord};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Instructions sent alongside every receipt.
const SYSTEM_PROMPT: &str = r#"You read the raw text of a single purchase receipt.
Return ONLY a JSON object with exactly these fields:
{
  "company_name": "merchant name, short form, e.g. STARBUCKS rather than STARBUCKS COFFEE",
  "total_amount": "the final total as a plain number without currency symbol, e.g. 15.86"
}

Notes:
- The total is the amount on the TOTAL line, not the subtotal or tax.
- The text may be garbled by PDF extraction. Do your best.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

/// A text-generation service that answers a prompt with free-form text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    pub model: String,
    api_key: String,
}

/// Resolve the LLM config section into a concrete endpoint.
///
/// The API key is read here, once; nothing downstream touches the
/// environment. Returns `Ok(None)` for the heuristics backend.
pub fn resolve_endpoint(llm: &LlmSection) -> Result<Option<ResolvedEndpoint>> {
    match llm.backend {
        LlmBackend::Heuristics => Ok(None),
        LlmBackend::Ollama => {
            info!(url = %llm.ollama.base_url, model = %llm.ollama.model, "Using Ollama (local) backend");
            Ok(Some(ResolvedEndpoint {
                base_url: llm.ollama.base_url.trim_end_matches('/').to_string(),
                model: llm.ollama.model.clone(),
                api_key: "ollama".to_string(), // required by API but ignored
            }))
        }
        LlmBackend::Remote => {
            let api_key = match &llm.remote.api_key {
                Some(key) if !key.trim().is_empty() => key.clone(),
                _ => std::env::var(&llm.remote.api_key_env).map_err(|_| {
                    TallyError::Config(format!(
                        "{} env var required for remote backend",
                        llm.remote.api_key_env
                    ))
                })?,
            };
            info!(url = %llm.remote.base_url, model = %llm.remote.model, "Using remote API backend");
            Ok(Some(ResolvedEndpoint {
                base_url: llm.remote.base_url.trim_end_matches('/').to_string(),
                model: llm.remote.model.clone(),
                api_key,
            }))
        }
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatClient {
    client: Client,
    endpoint: ResolvedEndpoint,
    max_retries: u32,
}

impl ChatClient {
    pub fn new(endpoint: ResolvedEndpoint, llm: &LlmSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            max_retries: llm.max_retries,
        })
    }

    /// Check if an Ollama server is reachable.
    pub async fn check_health(&self) -> bool {
        // Ollama's health endpoint is at the root (not under /v1)
        let health_url = self.endpoint.base_url.trim_end_matches("/v1");

        match self
            .client
            .get(health_url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("LLM server is reachable");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "LLM server returned non-OK status");
                false
            }
            Err(e) => {
                warn!(error = %e, "LLM server not reachable");
                false
            }
        }
    }

    async fn complete_once(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TallyError::Llm(format!("API error {status}: {body}")));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TallyError::Llm("empty response".into()))
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.complete_once(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, max = self.max_retries, "LLM request failed — retrying");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.endpoint.model, self.endpoint.base_url)
    }
}

/// What the model is asked to return. Amounts sometimes come back as numbers.
#[derive(Debug, Deserialize)]
struct LlmReceipt {
    company_name: Option<String>,
    total_amount: Option<serde_json::Value>,
}

/// Ask the generator for a receipt record and validate the answer.
pub async fn extract_receipt_with_llm(
    generator: &dyn TextGenerator,
    text: &str,
    max_chars: usize,
    brands: &BrandTable,
) -> Result<ReceiptRecord> {
    let text = truncate_chars(text, max_chars);
    let user = format!("Extract the receipt data from the following text:\n\n{text}");
    let answer = generator.generate(SYSTEM_PROMPT, &user).await?;
    debug!(answer_len = answer.len(), "LLM answered");
    parse_llm_answer(&answer, brands)
}

/// Turn a free-form model answer into a normalized record.
pub fn parse_llm_answer(answer: &str, brands: &BrandTable) -> Result<ReceiptRecord> {
    // Strip markdown fences if the model added them despite instructions
    let stripped = answer
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json_str = extract_json_object(stripped)?;

    let raw: LlmReceipt = serde_json::from_str(json_str)
        .map_err(|e| TallyError::Llm(format!("unparseable answer: {e}; raw: {json_str}")))?;

    let company = raw
        .company_name
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| TallyError::Llm("answer has no company_name".into()))?;
    let company_name = match brands.match_text(&company) {
        Some(canonical) => canonical.to_string(),
        None => company.to_uppercase(),
    };

    let amount_text = match raw.total_amount {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(TallyError::Llm("answer has no total_amount".into())),
    };
    let cleaned: String = amount_text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let mut amount = Decimal::from_str(cleaned.trim())
        .map_err(|_| TallyError::Llm(format!("non-numeric total_amount: {amount_text:?}")))?;
    if amount.is_sign_negative() {
        return Err(TallyError::Llm(format!("negative total_amount: {amount_text:?}")));
    }
    amount.rescale(2);

    Ok(ReceiptRecord::new(company_name, amount.to_string()))
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. reasoning preamble).
fn extract_json_object(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| TallyError::Llm("no '{' in answer".into()))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| TallyError::Llm("no '}' in answer".into()))?;
    if end <= start {
        return Err(TallyError::Llm("malformed JSON in answer".into()));
    }
    Ok(&s[start..=end])
}

/// First `max_chars` characters of `s`.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays a canned answer and remembers the prompt it was given.
    struct Canned {
        answer: Result<String>,
        seen: Mutex<Vec<String>>,
    }

    impl Canned {
        fn ok(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _system: &str, user: &str) -> Result<String> {
            self.seen.lock().unwrap().push(user.to_string());
            match &self.answer {
                Ok(a) => Ok(a.clone()),
                Err(e) => Err(TallyError::Llm(e.to_string())),
            }
        }

        fn describe(&self) -> String {
            "canned".to_string()
        }
    }

    #[test]
    fn plain_answer() {
        let rec = parse_llm_answer(
            r#"{"company_name": "Target", "total_amount": "23.8"}"#,
            &BrandTable::builtin(),
        )
        .unwrap();
        assert_eq!(rec, ReceiptRecord::new("TARGET", "23.80"));
    }

    #[test]
    fn fenced_answer_with_brand_variant() {
        let answer = "```json\n{\"company_name\": \"Starbucks Coffee\", \"total_amount\": \"$15.86\"}\n```";
        let rec = parse_llm_answer(answer, &BrandTable::builtin()).unwrap();
        assert_eq!(rec, ReceiptRecord::new("STARBUCKS", "15.86"));
    }

    #[test]
    fn answer_with_preamble_and_numeric_amount() {
        let answer = "Sure! Here it is:\n{\"company_name\": \"WAL-MART\", \"total_amount\": 1249.5} hope it helps";
        let rec = parse_llm_answer(answer, &BrandTable::builtin()).unwrap();
        assert_eq!(rec, ReceiptRecord::new("WALMART", "1249.50"));
    }

    #[test]
    fn rejects_bad_answers() {
        let brands = BrandTable::builtin();
        for answer in [
            "I could not read this receipt.",
            r#"{"company_name": "", "total_amount": "1.00"}"#,
            r#"{"company_name": "X Mart", "total_amount": "about five"}"#,
            r#"{"company_name": "X Mart"}"#,
            r#"{"company_name": "X Mart", "total_amount": "-3.00"}"#,
            "} backwards {",
        ] {
            assert!(
                matches!(parse_llm_answer(answer, &brands), Err(TallyError::Llm(_))),
                "accepted: {answer}"
            );
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn heuristics_backend_has_no_endpoint() {
        assert!(resolve_endpoint(&LlmSection::default()).unwrap().is_none());
    }

    #[test]
    fn remote_backend_prefers_inline_key() {
        let mut llm = LlmSection::default();
        llm.backend = LlmBackend::Remote;
        llm.remote.api_key = Some("sk-test".to_string());
        llm.remote.base_url = "https://llm.example.com/v1/".to_string();
        let ep = resolve_endpoint(&llm).unwrap().unwrap();
        assert_eq!(ep.base_url, "https://llm.example.com/v1");
        assert_eq!(ep.api_key, "sk-test");
    }

    #[test]
    fn remote_backend_without_key_is_config_error() {
        let mut llm = LlmSection::default();
        llm.backend = LlmBackend::Remote;
        llm.remote.api_key_env = "RECEIPT_TALLY_TEST_UNSET_KEY".to_string();
        assert!(matches!(resolve_endpoint(&llm), Err(TallyError::Config(_))));
    }

    #[tokio::test]
    async fn sends_truncated_text() {
        let generator = Canned::ok(r#"{"company_name": "MCDONALDS", "total_amount": "14.87"}"#);
        let rec = extract_receipt_with_llm(&generator, "McDonald's Restaurant", 3, &BrandTable::builtin())
            .await
            .unwrap();
        assert_eq!(rec, ReceiptRecord::new("MCDONALDS", "14.87"));

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("\n\nMcD"));
    }
}
