//! Knowledge QA handler and the retrieval-augmented answer helper it
//! shares with the tax handler

use crate::gemini::TextGenerator;
use crate::models::{Citation, KnowledgeAnswer, Outcome, Profile};
use crate::state::SessionState;
use crate::tools::{Document, Retriever};
use tracing::{debug, info, warn};

pub const QA_MAX_SNIPPETS: usize = 4;
pub const QA_SNIPPET_CHARS: usize = 800;

pub const INSUFFICIENT_CONTEXT_ANSWER: &str = "I couldn't find enough information in the knowledge base to answer that reliably. \
Try rephrasing your question, or ask about a core concept such as diversification, index funds or compound interest.";

const QA_SYSTEM_PROMPT: &str = "You are a helpful finance education assistant. \
Explain clearly for beginners. \
Use the provided context snippets as sources. \
If the context is insufficient, say so and provide safe general guidance.";

/// How retrieved documents become prompt context
pub struct ContextPolicy {
    pub max_snippets: usize,
    pub snippet_chars: usize,
    /// Drop documents outside this category (case-insensitive)
    pub required_category: Option<&'static str>,
}

/// Numbered context blocks and matching citations, ids from 1
pub fn build_context(documents: &[Document], policy: &ContextPolicy) -> (Vec<String>, Vec<Citation>) {
    let mut blocks = Vec::new();
    let mut citations = Vec::new();

    let kept = documents
        .iter()
        .take(policy.max_snippets)
        .filter(|doc| {
            policy
                .required_category
                .map_or(true, |c| doc.category.eq_ignore_ascii_case(c))
        });

    for (index, doc) in kept.enumerate() {
        let id = index + 1;
        let snippet: String = doc.content.chars().take(policy.snippet_chars).collect();

        blocks.push(format!(
            "[{}] Title: {}\nCategory: {}\nSource: {}\n{}",
            id, doc.title, doc.category, doc.source, snippet
        ));
        citations.push(Citation {
            id,
            title: doc.title.clone(),
            source: doc.source.clone(),
            category: Some(doc.category.clone()),
            url: None,
            published: None,
        });
    }

    (blocks, citations)
}

/// Profile hints appended to the system prompt
pub fn audience_note(profile: &Profile) -> String {
    let mut notes = Vec::new();
    if let Some(experience) = profile.experience {
        notes.push(format!("The user describes themselves as {}.", experience));
    }
    if let Some(risk) = profile.risk_tolerance {
        notes.push(format!("Their stated risk tolerance is {}.", risk));
    }

    if notes.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", notes.join(" "))
    }
}

/// Build context from retrieved documents and generate. No usable context
/// short-circuits to `empty_answer` without calling the generator.
pub async fn answer_with_context(
    generator: &dyn TextGenerator,
    documents: Result<Vec<Document>, String>,
    policy: &ContextPolicy,
    system_prompt: &str,
    build_prompt: impl FnOnce(&str) -> String,
    empty_answer: &str,
) -> Outcome<KnowledgeAnswer> {
    let documents = match documents {
        Ok(docs) => docs,
        Err(error) => return Outcome::failed(format!("Knowledge retrieval failed: {}", error)),
    };

    let (blocks, citations) = build_context(&documents, policy);
    if blocks.is_empty() {
        debug!("No retrieved context, returning fixed answer");
        return Outcome::Ready(KnowledgeAnswer {
            answer: empty_answer.to_string(),
            citations: Vec::new(),
        });
    }

    let prompt = build_prompt(&blocks.join("\n\n"));
    match generator.generate(system_prompt, &prompt).await {
        Ok(answer) => Outcome::Ready(KnowledgeAnswer { answer, citations }),
        Err(e) => {
            warn!(error = %e, "Answer generation failed");
            Outcome::failed(format!("Answer generation failed: {}", e))
        }
    }
}

pub async fn run(state: &mut SessionState, generator: &dyn TextGenerator, retriever: &dyn Retriever) {
    let question = state.user_message.clone();
    let category = state.profile.qa_category.clone();

    let documents = retriever
        .retrieve(&question, category.as_deref())
        .await
        .map_err(|e| e.to_string());

    let policy = ContextPolicy {
        max_snippets: QA_MAX_SNIPPETS,
        snippet_chars: QA_SNIPPET_CHARS,
        required_category: None,
    };
    let system_prompt = format!("{}{}", QA_SYSTEM_PROMPT, audience_note(&state.profile));

    let outcome = answer_with_context(
        generator,
        documents,
        &policy,
        &system_prompt,
        |context| {
            format!(
                "Question: {}\n\nContext:\n{}\n\nAnswer with clarity and include citation markers like [1], [2] where used.",
                question, context
            )
        },
        INSUFFICIENT_CONTEXT_ANSWER,
    )
    .await;

    info!(ok = outcome.ready().is_some(), ?category, "Knowledge answer ready");
    state.rag_answer = Some(outcome);
}
