use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;

pub(crate) const SYSTEM_PROMPT: &str = "\
You curate the category catalog of a Costa Rican news digest. Propose one \
new category for the article you are given: a short lowercase name (use \
`parent/child` for subtopics, as the existing names do) and a one-sentence \
description of what belongs in it. Follow the naming conventions visible in \
the existing names.";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NamerProposal {
    pub name: String,
    pub description: String,
}

pub async fn run(
    session: &mut dyn StructuredSession,
    article: &str,
    existing_names: &[String],
) -> ai_client::error::Result<NamerProposal> {
    let names = existing_names.join(", ");
    let prompt = format!(
        "Existing category names: {names}\n\nPropose a new category for this article:\n\n{article}"
    );
    ask(session, &prompt).await
}
