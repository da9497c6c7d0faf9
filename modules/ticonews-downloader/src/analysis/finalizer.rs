use ai_client::StructuredSession;

use super::ask;
use schemars::JsonSchema;
use serde::Deserialize;

pub(crate) const SYSTEM_PROMPT: &str = "\
You make the final category call for a Costa Rican news article. You are \
given two candidate categories. Pick the single one that best matches the \
article and answer with `first` or `second`. Only when genuinely neither \
candidate fits, set no_fit instead.";

/// A candidate as shown to the finalizer.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OptionTag {
    First,
    Second,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FinalizerChoice {
    /// Neither candidate fits the article.
    #[serde(default)]
    pub no_fit: bool,
    pub choice: OptionTag,
}

/// Decide between the labeler's top existing category and the namer's fresh
/// proposal. The two are presented in the order the caller randomized
/// (position-bias guard); the return value recovers the original identity:
/// `true` means the proposal won. A no-fit verdict also resolves to the
/// proposal, so the catalog grows instead of the article being mislabeled.
pub async fn run(
    session: &mut dyn StructuredSession,
    article: &str,
    existing: &CategoryOption,
    proposal: &CategoryOption,
    proposal_first: bool,
) -> ai_client::error::Result<bool> {
    let (first, second) = if proposal_first {
        (proposal, existing)
    } else {
        (existing, proposal)
    };
    let prompt = format!(
        "Candidates:\n\
         first: {} ({})\n\
         second: {} ({})\n\n\
         Article:\n\n{article}",
        first.name, first.description, second.name, second.description
    );
    let choice: FinalizerChoice = ask(session, &prompt).await?;
    Ok(resolve(&choice, proposal_first))
}

fn resolve(choice: &FinalizerChoice, proposal_first: bool) -> bool {
    choice.no_fit || chose_proposal(choice.choice, proposal_first)
}

fn chose_proposal(choice: OptionTag, proposal_first: bool) -> bool {
    match choice {
        OptionTag::First => proposal_first,
        OptionTag::Second => !proposal_first,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_recovers_identity_in_both_orders() {
        assert!(chose_proposal(OptionTag::First, true));
        assert!(!chose_proposal(OptionTag::Second, true));
        assert!(!chose_proposal(OptionTag::First, false));
        assert!(chose_proposal(OptionTag::Second, false));
    }

    #[test]
    fn no_fit_resolves_to_proposal_regardless_of_order() {
        // The no-fit branch must not depend on which position either
        // candidate happened to be shown in.
        for proposal_first in [true, false] {
            for tag in [OptionTag::First, OptionTag::Second] {
                let verdict = FinalizerChoice {
                    no_fit: true,
                    choice: tag,
                };
                assert!(resolve(&verdict, proposal_first));
            }
        }
    }

    #[test]
    fn explicit_choice_still_maps_when_no_fit_is_false() {
        let verdict = FinalizerChoice {
            no_fit: false,
            choice: OptionTag::Second,
        };
        assert!(resolve(&verdict, false));
        assert!(!resolve(&verdict, true));
    }
}
