use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;
use ticonews_store::Relation;

pub(crate) const SYSTEM_PROMPT: &str = "\
You classify Costa Rican news articles for a digest aimed at foreigners \
living in Costa Rica. Decide how the article relates to life in the country:\n\
- direct: events happening in Costa Rica or directly affecting people there\n\
- indirect: foreign or global news with a clear consequence for Costa Rica\n\
- not_applicable: no meaningful connection to life in Costa Rica\n\
Judge only the connection, not the importance of the story.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationTag {
    Direct,
    Indirect,
    NotApplicable,
}

impl RelationTag {
    pub fn to_relation(self) -> Relation {
        match self {
            RelationTag::Direct => Relation::Direct,
            RelationTag::Indirect => Relation::Indirect,
            RelationTag::NotApplicable => Relation::NotApplicable,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClassifierVerdict {
    pub relation: RelationTag,
}

pub async fn run(
    session: &mut dyn StructuredSession,
    article: &str,
) -> ai_client::error::Result<ClassifierVerdict> {
    let prompt = format!("Classify this article:\n\n{article}");
    ask(session, &prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_tags_deserialize_snake_case() {
        let verdict: ClassifierVerdict =
            serde_json::from_value(serde_json::json!({"relation": "not_applicable"})).unwrap();
        assert_eq!(verdict.relation, RelationTag::NotApplicable);
        assert_eq!(verdict.relation.to_relation(), Relation::NotApplicable);
    }

    #[test]
    fn schema_is_a_string_enum() {
        use ai_client::StructuredOutput;
        let schema = serde_json::to_string(&ClassifierVerdict::engine_schema()).unwrap();
        assert!(schema.contains("not_applicable"));
        assert!(schema.contains("direct"));
    }
}
