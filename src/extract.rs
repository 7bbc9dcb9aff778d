// src/extract.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{LlmBackend, LlmSection};
use crate::model::{CustomerInfo, ExtractedItem, SyncResult, TransactionType};

/// The instructions that turn a general chat model into the ledger sync
/// engine. Accuracy rules mirror how industrial stock sheets are actually
/// laid out: sparse category rows followed by size-only variant rows.
const SYSTEM_PROMPT: &str = r#"You are the ledger sync engine for a metal-fittings distributor. Your primary goal is 100% ACCURACY in extracting inventory data and you return ONLY valid JSON.

CRITICAL INSTRUCTIONS FOR INDUSTRIAL STOCK SHEETS:
1. CONTEXTUAL EXTRACTION: The input data is often sparse. A product category (e.g., "SS 304 IC Ball Valve 1PC S/E") is usually in its own row. EVERY subsequent row with a SIZE (e.g., "1/4", "1/2") belongs to that parent product category until a NEW category name is found.
2. EXHAUSTIVE SCAN: Do NOT skip rows. If a row has a Size and a Total Quantity, it MUST be extracted.
3. GRADE PRECISION: Pay extremely close attention to "304", "316", "202", and "MS". These must be correctly assigned to the 'grade' property.
4. SIZE NORMALIZATION: Convert variants like '1/2 inch', '1/2"', '1/2' to a standard '1/2"'.
5. SKU MATCHING: Check the "Current Inventory Status" provided with the request. If Name+Grade+Size matches an existing record, use that SKU. Otherwise leave sku null.

CLASSIFICATION:
- A bulk stock sheet upload is a PURCHASE with ALL identified items in extractedItems.
- An invoice or outgoing delivery is a SALE; include customerInfo when the buyer is named.

The JSON must match this schema exactly:
{
  "transactionType": "INITIAL_SETUP" | "SALE" | "PURCHASE",
  "summary": "human-readable summary of the sync operation",
  "customerInfo": { "name": "string", "email": "string", "contact": "string" } or null,
  "extractedItems": [
    { "sku": "string or null", "name": "string", "grade": "string", "size": "string", "qty": number, "price": number or null }
  ],
  "alerts": ["string"]
}

Return ONLY the JSON object, no markdown fences, no commentary."#;

/// Raw material handed to the engine: a whole document, or a free-text note.
#[derive(Debug, Clone)]
pub enum SyncInput {
    Document { data: String, mime_type: String },
    Text(String),
}

// ---------------------------------------------------------------------------
// Chat wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Endpoint resolution
// ---------------------------------------------------------------------------

/// Resolved endpoint configuration ready to make API calls.
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

fn resolve_endpoint(llm: &LlmSection) -> Result<ResolvedEndpoint, Box<dyn std::error::Error>> {
    match llm.backend {
        LlmBackend::Ollama => {
            info!(
                url = %llm.ollama.base_url,
                model = %llm.ollama.model,
                "Using Ollama (local) backend"
            );
            Ok(ResolvedEndpoint {
                base_url: llm.ollama.base_url.clone(),
                model: llm.ollama.model.clone(),
                api_key: "ollama".to_string(), // required by API but ignored
            })
        }
        LlmBackend::Remote => {
            let api_key = std::env::var("LLM_API_KEY")
                .map_err(|_| "LLM_API_KEY env var required for remote backend")?;
            info!(
                url = %llm.remote.base_url,
                model = %llm.remote.model,
                "Using remote API backend"
            );
            Ok(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            })
        }
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches("/v1").trim_end_matches("/v1/");

    match client
        .get(health_url)
        .timeout(std::time::Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) => {
            if resp.status().is_success() {
                info!("Ollama server is reachable");
                true
            } else {
                warn!(status = %resp.status(), "Ollama server returned non-OK status");
                false
            }
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run one extraction against the configured engine.
///
/// `context_json` is the compact current-inventory array that lets the
/// model reuse existing SKUs. This function never fails: any network or
/// parse problem is logged and collapses into the fallback result, so the
/// caller's state can never be corrupted by a bad engine response.
pub async fn process_ledger_input(
    client: &Client,
    llm: &LlmSection,
    input: &SyncInput,
    context_json: &str,
) -> SyncResult {
    match call_engine(client, llm, input, context_json).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Engine sync failed; substituting fallback result");
            fallback_result()
        }
    }
}

/// The result the caller sees when the engine call or its output is broken.
pub fn fallback_result() -> SyncResult {
    SyncResult {
        transaction_type: TransactionType::Unknown,
        summary: "Critical failure during engine synchronization.".to_string(),
        customer_info: None,
        extracted_items: vec![],
        alerts: vec!["Internal parser error. Please ensure the file format is valid.".to_string()],
    }
}

async fn call_engine(
    client: &Client,
    llm: &LlmSection,
    input: &SyncInput,
    context_json: &str,
) -> Result<SyncResult, Box<dyn std::error::Error>> {
    let endpoint = resolve_endpoint(llm)?;

    if llm.backend == LlmBackend::Ollama {
        if !check_ollama_health(client, &endpoint.base_url).await {
            return Err(format!(
                "Ollama is not running at {}. Start it with: ollama serve",
                endpoint.base_url
            )
            .into());
        }
    }

    let context_part = format!("Current Inventory Status (JSON):\n{context_json}");

    let user_content = match input {
        SyncInput::Text(text) => MessageContent::Parts(vec![
            ContentPart::Text { text: context_part },
            ContentPart::Text {
                text: format!("Sync Request: {text}"),
            },
        ]),
        SyncInput::Document { data, mime_type } => {
            // Accept both raw base64 and full data URLs from the caller.
            let base64_data = match data.split_once(',') {
                Some((_, rest)) if data.starts_with("data:") => rest,
                _ => data.as_str(),
            };
            MessageContent::Parts(vec![
                ContentPart::Text { text: context_part },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{mime_type};base64,{base64_data}"),
                    },
                },
            ])
        }
    };

    let request = ChatRequest {
        model: endpoint.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user_content,
            },
        ],
        temperature: 0.0,
    };

    let url = format!("{}/chat/completions", endpoint.base_url);

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", endpoint.api_key))
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Engine API error {status}: {body}").into());
    }

    let chat_response: ChatResponse = response.json().await?;
    let content = chat_response
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or("Empty response from engine")?;

    let result = parse_engine_response(content)?;
    info!(
        transaction = ?result.transaction_type,
        items = result.extracted_items.len(),
        alerts = result.alerts.len(),
        "Engine extraction result"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Response parsing — the strict boundary between the engine's loose JSON
// and the typed model.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSyncResult {
    #[serde(default)]
    transaction_type: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    customer_info: Option<RawCustomerInfo>,
    #[serde(default)]
    extracted_items: Vec<RawItem>,
    #[serde(default)]
    alerts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCustomerInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    contact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    qty: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
}

/// Parse raw chat output into a validated `SyncResult`.
pub fn parse_engine_response(content: &str) -> Result<SyncResult, Box<dyn std::error::Error>> {
    // Strip markdown fences if the model added them despite instructions
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Some models (especially with /think mode) may prepend reasoning text.
    // Find the first '{' and last '}' to extract just the JSON object.
    let json_str = extract_json_object(json_str)?;

    let raw: RawSyncResult = serde_json::from_str(json_str)
        .map_err(|e| format!("Failed to parse engine response: {e}\nRaw: {json_str}"))?;

    Ok(validate(raw))
}

fn validate(raw: RawSyncResult) -> SyncResult {
    let transaction_type = match raw.transaction_type.as_deref() {
        Some("SALE") => TransactionType::Sale,
        Some("PURCHASE") => TransactionType::Purchase,
        Some("INITIAL_SETUP") => TransactionType::InitialSetup,
        other => {
            warn!(reported = ?other, "Unrecognized transaction type from engine");
            TransactionType::Unknown
        }
    };

    let customer_info = raw.customer_info.and_then(|c| {
        let name = c.name.unwrap_or_default();
        if name.trim().is_empty() {
            None
        } else {
            Some(CustomerInfo {
                name,
                email: c.email,
                contact: c.contact,
            })
        }
    });

    let mut nameless = 0usize;
    let extracted_items: Vec<ExtractedItem> = raw
        .extracted_items
        .into_iter()
        .map(|i| {
            let name = i.name.unwrap_or_default();
            if name.trim().is_empty() {
                nameless += 1;
            }
            ExtractedItem {
                sku: i.sku,
                name,
                grade: i.grade.unwrap_or_default(),
                size: i.size.unwrap_or_default(),
                qty: i.qty.unwrap_or(0.0),
                price: i.price,
            }
        })
        .collect();

    let mut alerts = raw.alerts;
    if nameless > 0 {
        alerts.push(format!(
            "Engine returned {nameless} line(s) without a product name; they will be skipped."
        ));
    }
    if extracted_items.is_empty() {
        alerts.push("Engine detected no inventory lines in the provided source.".to_string());
    }

    SyncResult {
        transaction_type,
        summary: raw.summary.unwrap_or_default(),
        customer_info,
        extracted_items,
        alerts,
    }
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. thinking tokens).
fn extract_json_object(s: &str) -> Result<&str, Box<dyn std::error::Error>> {
    let start = s.find('{').ok_or("No '{' found in engine response")?;
    let end = s.rfind('}').ok_or("No '}' found in engine response")?;
    if end <= start {
        return Err("Malformed JSON in engine response".into());
    }
    Ok(&s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let content = r#"{
            "transactionType": "SALE",
            "summary": "Sold valves to Acme.",
            "customerInfo": { "name": "Acme Corp", "contact": "99999" },
            "extractedItems": [
                { "sku": "VLV-304-1PC-14", "name": "SS IC Ball Valve 1PC S/E", "grade": "304", "size": "1/4\"", "qty": 10, "price": 188 }
            ],
            "alerts": []
        }"#;
        let result = parse_engine_response(content).unwrap();
        assert_eq!(result.transaction_type, TransactionType::Sale);
        assert_eq!(result.extracted_items.len(), 1);
        assert_eq!(result.extracted_items[0].qty, 10.0);
        assert_eq!(result.customer_info.as_ref().unwrap().name, "Acme Corp");
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn strips_fences_and_leading_chatter() {
        let content = "Okay, here is the extraction.\n```json\n{\"transactionType\":\"PURCHASE\",\"summary\":\"s\",\"extractedItems\":[{\"name\":\"Elbow\",\"grade\":\"304\",\"size\":\"1/2\\\"\",\"qty\":5}]}\n```";
        let result = parse_engine_response(content).unwrap();
        assert_eq!(result.transaction_type, TransactionType::Purchase);
        assert_eq!(result.extracted_items[0].name, "Elbow");
    }

    #[test]
    fn empty_item_list_appends_alert() {
        let content = r#"{"transactionType":"PURCHASE","summary":"nothing found","extractedItems":[]}"#;
        let result = parse_engine_response(content).unwrap();
        assert_eq!(
            result.alerts,
            vec!["Engine detected no inventory lines in the provided source.".to_string()]
        );
    }

    #[test]
    fn unknown_transaction_type_maps_to_unknown() {
        let content = r#"{"transactionType":"REFUND","summary":"s","extractedItems":[{"name":"X","grade":"304","size":"1\"","qty":1}]}"#;
        let result = parse_engine_response(content).unwrap();
        assert_eq!(result.transaction_type, TransactionType::Unknown);
    }

    #[test]
    fn nameless_customer_is_dropped() {
        let content = r#"{"transactionType":"SALE","summary":"s","customerInfo":{"name":"  "},"extractedItems":[{"name":"X","grade":"304","size":"1\"","qty":1}]}"#;
        let result = parse_engine_response(content).unwrap();
        assert!(result.customer_info.is_none());
    }

    #[test]
    fn nameless_items_get_flagged_but_kept_for_the_drop_guard() {
        let content = r#"{"transactionType":"PURCHASE","summary":"s","extractedItems":[{"grade":"304","size":"1\"","qty":1},{"name":"Elbow","grade":"304","size":"1/2\"","qty":2}]}"#;
        let result = parse_engine_response(content).unwrap();
        assert_eq!(result.extracted_items.len(), 2);
        assert_eq!(result.alerts.len(), 1);
        assert!(result.alerts[0].contains("1 line(s) without a product name"));
    }

    #[test]
    fn missing_qty_defaults_to_zero() {
        let content = r#"{"transactionType":"PURCHASE","summary":"s","extractedItems":[{"name":"Elbow","grade":"304","size":"1/2\""}]}"#;
        let result = parse_engine_response(content).unwrap();
        assert_eq!(result.extracted_items[0].qty, 0.0);
        assert!(result.extracted_items[0].price.is_none());
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(parse_engine_response("no json here at all").is_err());
        assert!(parse_engine_response("}{").is_err());
        assert!(parse_engine_response("{\"transactionType\": 12").is_err());
    }

    #[test]
    fn fallback_result_shape() {
        let fb = fallback_result();
        assert_eq!(fb.transaction_type, TransactionType::Unknown);
        assert!(fb.extracted_items.is_empty());
        assert_eq!(fb.alerts.len(), 1);
    }

    #[test]
    fn json_object_recovery_bounds() {
        assert_eq!(extract_json_object("xx{\"a\":1}yy").unwrap(), "{\"a\":1}");
        assert!(extract_json_object("no braces").is_err());
    }
}
