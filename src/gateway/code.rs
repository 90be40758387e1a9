//! Ad-hoc code generation gateway call
//!
//! The system directive is a contract: it is attached verbatim to every
//! request and is not user-overridable.

use crate::error::{PolymodeError, Result};
use crate::gateway::{upstream_failure, GatewayContext};
use serde::{Deserialize, Serialize};

/// Fixed system directive for code generation
///
/// Constrains output to a single self-contained document with no
/// explanatory prose, so the result can be rendered directly.
pub(crate) const CODE_SYSTEM_DIRECTIVE: &str = "\
You are an expert web developer. Respond with a single, complete, \
self-contained HTML document that fulfills the request. Inline all CSS \
and JavaScript. Do not include explanatory prose, comments about your \
choices, or markdown fences; output only the document.";

#[derive(Debug, Serialize)]
struct CodeRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningConfig>,
}

#[derive(Debug, Serialize)]
struct ReasoningConfig {
    budget_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CodeResponse {
    #[serde(default)]
    text: String,
}

/// Generate a self-contained source document from a prompt
///
/// # Arguments
///
/// * `ctx` - Gateway context
/// * `prompt` - What to build
/// * `thinking` - Request an extended reasoning budget
///
/// # Returns
///
/// The raw source text, with any stray markdown fence stripped.
///
/// # Errors
///
/// Returns `PolymodeError::Generation` if the backend returns empty text.
pub async fn generate_code(ctx: &GatewayContext, prompt: &str, thinking: bool) -> Result<String> {
    let credential = ctx.credential()?;
    let reasoning = thinking.then(|| ReasoningConfig {
        budget_tokens: ctx.config().thinking_budget,
    });
    let request = CodeRequest {
        model: &ctx.config().capable_model,
        system: CODE_SYSTEM_DIRECTIVE,
        prompt,
        reasoning,
    };

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/code/generate"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Code request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let body: CodeResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid code response: {}", e)))?;

    let source = strip_code_fences(&body.text);
    if source.is_empty() {
        return Err(PolymodeError::Generation("backend returned empty source".to_string()).into());
    }
    Ok(source)
}

/// Strip a wrapping markdown fence, if the model added one anyway
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line, then the closing fence.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed.to_string(),
    };
    rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
}
