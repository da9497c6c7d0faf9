use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;

pub(crate) const SYSTEM_PROMPT: &str = "\
You translate short news summaries. Keep the casual register and the \
meaning exactly; do not add or drop information. Keep proper names and \
place names as they are.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranslationResponse {
    pub translation: String,
}

pub async fn run(
    session: &mut dyn StructuredSession,
    summary: &str,
    lang: &str,
) -> ai_client::error::Result<TranslationResponse> {
    let prompt = format!(
        "Translate this summary into {}:\n\n{summary}",
        language_name(lang)
    );
    ask(session, &prompt).await
}

fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "es" => "Spanish",
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "pt" => "Portuguese",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(language_name("ru"), "Russian");
        assert_eq!(language_name("xx"), "xx");
    }
}
