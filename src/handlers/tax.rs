//! Tax education handler. Retrieval is restricted to the `Tax` category.

use crate::gemini::TextGenerator;
use crate::handlers::knowledge::{answer_with_context, audience_note, ContextPolicy};
use crate::state::SessionState;
use crate::tools::Retriever;
use tracing::info;

pub const TAX_CATEGORY: &str = "Tax";
pub const TAX_MAX_SNIPPETS: usize = 5;
pub const TAX_SNIPPET_CHARS: usize = 900;

pub const INSUFFICIENT_TAX_CONTEXT_ANSWER: &str = "I don't have enough tax reference material to answer that reliably. \
Tax rules depend on location, filing status, income and the current tax year, so please verify with official guidance or a tax professional.";

const TAX_SYSTEM_PROMPT: &str = "You are a Tax Education Agent. You provide educational explanations only. \
Do NOT provide personalized tax advice. Do NOT guess rates/thresholds. \
If the retrieved context doesn't contain enough detail, say so and suggest what to verify.\n\n\
Always use citations like [1], [2] tied to the sources list.\n\n\
Answer format:\n\
### Education-only note\n\
### Direct answer\n\
### Example\n\
### Common pitfalls / edge cases\n\
### Relevant account types (if applicable)\n\
### What to do next (education-only)\n";

pub async fn run(state: &mut SessionState, generator: &dyn TextGenerator, retriever: &dyn Retriever) {
    let question = state.user_message.clone();

    let documents = retriever
        .retrieve(&question, Some(TAX_CATEGORY))
        .await
        .map_err(|e| e.to_string());

    let policy = ContextPolicy {
        max_snippets: TAX_MAX_SNIPPETS,
        snippet_chars: TAX_SNIPPET_CHARS,
        required_category: Some(TAX_CATEGORY),
    };
    let system_prompt = format!("{}{}", TAX_SYSTEM_PROMPT, audience_note(&state.profile));

    let outcome = answer_with_context(
        generator,
        documents,
        &policy,
        &system_prompt,
        |context| {
            format!(
                "User question: {}\n\n\
                 Retrieved context (Tax only):\n{}\n\n\
                 If the user asks for a comparison (e.g., Roth vs Traditional vs Taxable), include a small markdown table.\n\
                 If the question depends on location, filing status, income thresholds, or current-year rules and those are \
                 not present in context, explicitly say what info is missing.\n",
                question, context
            )
        },
        INSUFFICIENT_TAX_CONTEXT_ANSWER,
    )
    .await;

    info!(ok = outcome.ready().is_some(), "Tax answer ready");
    state.tax_answer = Some(outcome);
}
