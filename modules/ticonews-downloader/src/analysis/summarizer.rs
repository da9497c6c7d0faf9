use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;

pub(crate) const SYSTEM_PROMPT: &str = "\
You summarize Costa Rican news in English for foreigners who are still \
learning Spanish. Write a short, casual summary that explains what \
happened: who was involved, what they did, and what it means for people \
living in Costa Rica. Spell out local context a newcomer would not know. \
No headlines, no bullet points, just a few plain sentences.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummaryResponse {
    pub summary: String,
}

pub async fn run(
    session: &mut dyn StructuredSession,
    article: &str,
) -> ai_client::error::Result<SummaryResponse> {
    let prompt = format!("Summarize this article:\n\n{article}");
    ask(session, &prompt).await
}
