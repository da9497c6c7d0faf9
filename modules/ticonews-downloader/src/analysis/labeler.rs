use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;
use ticonews_store::SmartCategory;

pub(crate) const SYSTEM_PROMPT: &str = "\
You label Costa Rican news articles with curated topic categories. You are \
given the current category catalog (name and description). Suggest the \
existing categories that fit the article, ranked from best (rank 1) \
downward. If none of them genuinely fits, say so instead of forcing a \
match.";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CategorySuggestion {
    /// Must be a name from the provided catalog.
    pub name: String,
    /// 1 is the best fit.
    pub rank: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LabelerResponse {
    /// True when no existing category fits the article.
    pub no_fit: bool,
    pub suggestions: Vec<CategorySuggestion>,
}

pub async fn run(
    session: &mut dyn StructuredSession,
    article: &str,
    catalog: &[SmartCategory],
) -> ai_client::error::Result<LabelerResponse> {
    let listing = catalog
        .iter()
        .map(|c| format!("- {}: {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt =
        format!("Category catalog:\n{listing}\n\nSuggest categories for this article:\n\n{article}");
    ask(session, &prompt).await
}

/// Best valid suggestion: lowest rank whose name exists in the catalog.
/// Hallucinated names are dropped rather than minted as new categories.
pub fn top_existing<'a>(
    response: &LabelerResponse,
    catalog: &'a [SmartCategory],
) -> Option<&'a SmartCategory> {
    response
        .suggestions
        .iter()
        .filter_map(|s| {
            catalog
                .iter()
                .find(|c| c.name == s.name)
                .map(|c| (s.rank, c))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, category)| category)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<SmartCategory> {
        vec![
            SmartCategory {
                name: "economy".into(),
                description: "Economy".into(),
                ignore: false,
            },
            SmartCategory {
                name: "incidents".into(),
                description: "Incidents".into(),
                ignore: false,
            },
        ]
    }

    fn suggestion(name: &str, rank: u32) -> CategorySuggestion {
        CategorySuggestion {
            name: name.into(),
            rank,
        }
    }

    #[test]
    fn top_existing_picks_lowest_rank() {
        let response = LabelerResponse {
            no_fit: false,
            suggestions: vec![suggestion("incidents", 2), suggestion("economy", 1)],
        };
        assert_eq!(top_existing(&response, &catalog()).unwrap().name, "economy");
    }

    #[test]
    fn hallucinated_names_are_dropped() {
        let response = LabelerResponse {
            no_fit: false,
            suggestions: vec![suggestion("made-up", 1), suggestion("incidents", 2)],
        };
        assert_eq!(
            top_existing(&response, &catalog()).unwrap().name,
            "incidents"
        );
    }

    #[test]
    fn all_invalid_means_no_existing_choice() {
        let response = LabelerResponse {
            no_fit: false,
            suggestions: vec![suggestion("made-up", 1)],
        };
        assert!(top_existing(&response, &catalog()).is_none());
    }
}
