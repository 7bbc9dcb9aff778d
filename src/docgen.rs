// src/docgen.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{LlmBackend, LlmSection};
use crate::model::{Customer, Product};

/// What the caller sees when challan generation fails, in any way.
pub const GENERATION_FAILED: &str = "Error generating document.";

/// One delivery-challan line, resolved against the current ledger. Fields
/// are optional because the referenced SKU may have been purged since the
/// order was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct ChallanItem {
    pub name: Option<String>,
    pub grade: Option<String>,
    pub size: Option<String>,
    pub qty: f64,
}

/// Resolve a customer's most recent order into challan lines. SKU lookup is
/// exact-trimmed, the same comparison the order was written with.
pub fn challan_items(customer: &Customer, inventory: &[Product]) -> Vec<ChallanItem> {
    let Some(last_order) = customer.order_history.first() else {
        return vec![];
    };

    last_order
        .items
        .iter()
        .map(|item| {
            let product = inventory.iter().find(|p| p.sku.trim() == item.sku.trim());
            ChallanItem {
                name: product.map(|p| p.name.clone()),
                grade: product.map(|p| p.grade.clone()),
                size: product.map(|p| p.size.clone()),
                qty: item.qty,
            }
        })
        .collect()
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

/// Generate a delivery challan as a markdown table. Never fails: any call
/// or formatting problem collapses into the error sentinel string.
pub async fn generate_challan_markdown(
    client: &Client,
    llm: &LlmSection,
    customer_name: &str,
    items: &[ChallanItem],
) -> String {
    match call_engine(client, llm, customer_name, items).await {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!(error = %e, "Challan generation failed");
            GENERATION_FAILED.to_string()
        }
    }
}

async fn call_engine(
    client: &Client,
    llm: &LlmSection,
    customer_name: &str,
    items: &[ChallanItem],
) -> Result<String, Box<dyn std::error::Error>> {
    let (base_url, model, api_key) = match llm.backend {
        LlmBackend::Ollama => (
            llm.ollama.base_url.clone(),
            llm.ollama.model.clone(),
            "ollama".to_string(),
        ),
        LlmBackend::Remote => (
            llm.remote.base_url.clone(),
            llm.remote.model.clone(),
            std::env::var("LLM_API_KEY")
                .map_err(|_| "LLM_API_KEY env var required for remote backend")?,
        ),
    };

    let prompt = format!(
        "Create a professional delivery challan for a metal-fittings distributor.\n\
         Customer: {customer_name}.\n\
         Items: {}.\n\
         Return ONLY a standard markdown table.",
        serde_json::to_string(items)?
    );

    let request = ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt,
        }],
        temperature: 0.0,
    };

    let url = format!("{base_url}/chat/completions");
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
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
        .map(|c| c.message.content.trim())
        .filter(|c| !c.is_empty())
        .ok_or("Empty response from engine")?;

    Ok(content.to_string())
}
