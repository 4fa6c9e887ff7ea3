//! Audit copilot: grounded Q&A over the policy library
//!
//! Answers are grounded against retrieved policy text at the strict gate.
//! When nothing clears the gate the model is told so explicitly, which is
//! what keeps it from inventing policy citations.

use serde::Serialize;
use tracing::info;

use crate::ai::{CompletionClient, CompletionRequest, ContentBlock, EmbeddingClient, Message};
use crate::db::Database;
use crate::error::AppError;
use crate::retrieve::{ChunkMatch, Retriever, GROUNDING_THRESHOLD};

const ANSWER_TOP_K: usize = 5;
const ANSWER_MAX_TOKENS: u32 = 1024;

/// Live assessment state handed to the model as context
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentContext {
    pub assessment_title: String,
    pub standard: String,
    pub visible_controls: Vec<ControlSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub control_code: String,
    pub description: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct CopilotReply {
    pub reply: String,
    pub citations: Vec<ChunkMatch>,
}

pub struct Copilot<'a> {
    db: &'a Database,
    embedder: &'a dyn EmbeddingClient,
    model: &'a dyn CompletionClient,
}

impl<'a> Copilot<'a> {
    pub fn new(
        db: &'a Database,
        embedder: &'a dyn EmbeddingClient,
        model: &'a dyn CompletionClient,
    ) -> Self {
        Self {
            db,
            embedder,
            model,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        context: &AssessmentContext,
    ) -> Result<CopilotReply, AppError> {
        let retriever = Retriever::new(self.db, self.embedder);
        let citations = retriever
            .search(question, GROUNDING_THRESHOLD, ANSWER_TOP_K)
            .await?;

        info!(sources = citations.len(), "answering grounded question");

        let system = build_system_prompt(context, &citations)?;
        let reply = self
            .model
            .complete(CompletionRequest {
                system: Some(system),
                messages: vec![Message::user(vec![ContentBlock::text(question)])],
                max_tokens: ANSWER_MAX_TOKENS,
            })
            .await?;

        Ok(CopilotReply { reply, citations })
    }
}

fn build_system_prompt(
    context: &AssessmentContext,
    citations: &[ChunkMatch],
) -> Result<String, AppError> {
    let controls_json = serde_json::to_string_pretty(&context.visible_controls)
        .map_err(|e| AppError::internal(e.to_string()))?;

    let sources = if citations.is_empty() {
        "No policy excerpts cleared the relevance gate. Say that no policy \
         coverage was found rather than guessing."
            .to_string()
    } else {
        format_sources(citations)
    };

    Ok(format!(
        "You are an expert compliance auditor assisting with an assessment.\n\
         \n\
         Current Context:\n\
         - Assessment: {}\n\
         - Standard: {}\n\
         \n\
         REAL-TIME DATA (control statuses the user sees on screen):\n\
         {}\n\
         \n\
         POLICY EXCERPTS (retrieved from the organization's own documents):\n\
         {}\n\
         \n\
         Your Goal:\n\
         - Answer only from the context and excerpts above.\n\
         - If a control is non-compliant, suggest finding evidence for it.\n\
         - Be concise.",
        context.assessment_title, context.standard, controls_json, sources
    ))
}

fn format_sources(citations: &[ChunkMatch]) -> String {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[Source {} | {}% match]\n{}", i + 1, c.confidence(), c.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
