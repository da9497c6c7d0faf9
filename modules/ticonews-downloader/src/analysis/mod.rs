pub mod classifier;
pub mod finalizer;
pub mod labeler;
pub mod namer;
pub mod summarizer;
pub mod translator;

use std::fmt;

use ai_client::{Claude, EngineError, SessionParams, StructuredOutput, StructuredSession};
use tracing::{debug, warn};

use ticonews_common::config::LlmConfig;
use ticonews_store::smart_categories::UNKNOWN_CATEGORY;
use ticonews_store::{Relation, SmartCategory};

use finalizer::CategoryOption;

const MAX_AGENT_RETRIES: u32 = 2;

// =============================================================================
// Agents
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Classifier,
    Labeler,
    Namer,
    Finalizer,
    Summarizer,
    Translator,
}

impl AgentKind {
    pub fn id(self) -> &'static str {
        match self {
            AgentKind::Classifier => "classifier",
            AgentKind::Labeler => "labeler",
            AgentKind::Namer => "namer",
            AgentKind::Finalizer => "finalizer",
            AgentKind::Summarizer => "summarizer",
            AgentKind::Translator => "translator",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            AgentKind::Classifier => classifier::SYSTEM_PROMPT,
            AgentKind::Labeler => labeler::SYSTEM_PROMPT,
            AgentKind::Namer => namer::SYSTEM_PROMPT,
            AgentKind::Finalizer => finalizer::SYSTEM_PROMPT,
            AgentKind::Summarizer => summarizer::SYSTEM_PROMPT,
            AgentKind::Translator => translator::SYSTEM_PROMPT,
        }
    }
}

/// Opens one fresh session per agent per article. The engine implementation
/// binds each agent to its model, temperature, and token budget; tests
/// substitute scripted sessions.
pub trait SessionFactory: Send + Sync {
    fn open(&self, agent: AgentKind) -> Box<dyn StructuredSession>;

    /// Whether the finalizer sees the fresh proposal before the existing
    /// candidate. Randomized in production against position bias.
    fn proposal_first(&self) -> bool {
        rand::random()
    }
}

/// Production factory over the configured engine.
pub struct EngineSessions {
    engine: Claude,
    llm: LlmConfig,
}

impl EngineSessions {
    pub fn new(engine: Claude, llm: LlmConfig) -> Self {
        Self { engine, llm }
    }
}

impl SessionFactory for EngineSessions {
    fn open(&self, agent: AgentKind) -> Box<dyn StructuredSession> {
        let (role, temperature, max_tokens) = match agent {
            AgentKind::Classifier => (&self.llm.basic, 0.0, 1024),
            AgentKind::Labeler => (&self.llm.basic, 0.2, 2048),
            AgentKind::Namer => (&self.llm.basic, 0.7, 1024),
            AgentKind::Finalizer => (&self.llm.basic, 0.0, 512),
            AgentKind::Summarizer => (&self.llm.light, 0.7, 2048),
            AgentKind::Translator => (&self.llm.light, 0.3, 2048),
        };

        Box::new(self.engine.start_session(SessionParams {
            agent_id: agent.id().to_string(),
            model: role.model.clone(),
            system_prompt: agent.system_prompt().to_string(),
            temperature,
            max_tokens,
            supplementary_model: self
                .llm
                .supplementary
                .as_ref()
                .map(|role| role.model.clone()),
            raw_dir: if self.llm.keep_raw_engine_responses {
                self.llm.raw_engine_responses_dir.clone()
            } else {
                None
            },
        }))
    }
}

/// One prompt with bounded retries. Retryable failures (transient API
/// errors, schema mismatches) are retried against the same session; the
/// session already dropped the failed prompt from history.
pub(crate) async fn ask<T: StructuredOutput>(
    session: &mut dyn StructuredSession,
    prompt: &str,
) -> Result<T, EngineError> {
    let mut tries = 0;
    loop {
        match ai_client::send_structured::<T, _>(&mut *session, prompt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && tries < MAX_AGENT_RETRIES => {
                tries += 1;
                warn!(attempt = tries, error = %e, "Agent call failed, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryChoice {
    Existing(String),
    New { name: String, description: String },
}

impl CategoryChoice {
    pub fn name(&self) -> &str {
        match self {
            CategoryChoice::Existing(name) => name,
            CategoryChoice::New { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryText {
    pub lang: String,
    pub text: String,
}

/// Full outcome of one article's analysis.
#[derive(Debug)]
pub struct Analysis {
    pub relation: Relation,
    pub category: CategoryChoice,
    pub summaries: Vec<SummaryText>,
}

/// A pipeline failure, carrying the classifier's verdict when it got that
/// far so the fallback projection keeps the right relation.
#[derive(Debug)]
pub struct AnalysisError {
    pub stage: AgentKind,
    pub relation: Option<Relation>,
    pub source: EngineError,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage.id(), self.source)
    }
}

impl std::error::Error for AnalysisError {}

/// Run the categorization pipeline (classifier, labeler, namer, finalizer)
/// and, for relevant non-ignored articles, the summarization pipeline
/// (summarizer, translator per language).
pub async fn analyze(
    factory: &dyn SessionFactory,
    article: &str,
    catalog: &[SmartCategory],
    summary_languages: &[String],
) -> Result<Analysis, AnalysisError> {
    let mut session = factory.open(AgentKind::Classifier);
    let verdict = classifier::run(session.as_mut(), article)
        .await
        .map_err(|source| AnalysisError {
            stage: AgentKind::Classifier,
            relation: None,
            source,
        })?;
    let relation = verdict.relation.to_relation();
    debug!(relation = relation.as_str(), "Article classified");

    if !relation.is_relevant() {
        return Ok(Analysis {
            relation,
            category: CategoryChoice::Existing(UNKNOWN_CATEGORY.to_string()),
            summaries: Vec::new(),
        });
    }

    let fail = |stage: AgentKind| {
        move |source| AnalysisError {
            stage,
            relation: Some(relation),
            source,
        }
    };

    // The fallback row is not a real topic; the labeler never sees it.
    let selectable: Vec<SmartCategory> = catalog
        .iter()
        .filter(|c| c.name != UNKNOWN_CATEGORY)
        .cloned()
        .collect();

    let mut session = factory.open(AgentKind::Labeler);
    let labeled = labeler::run(session.as_mut(), article, &selectable)
        .await
        .map_err(fail(AgentKind::Labeler))?;
    let existing_top = labeler::top_existing(&labeled, &selectable).cloned();

    let names: Vec<String> = selectable.iter().map(|c| c.name.clone()).collect();
    let mut session = factory.open(AgentKind::Namer);
    let proposal = namer::run(session.as_mut(), article, &names)
        .await
        .map_err(fail(AgentKind::Namer))?;

    let category = match existing_top {
        None => CategoryChoice::New {
            name: proposal.name,
            description: proposal.description,
        },
        Some(existing) => {
            let mut session = factory.open(AgentKind::Finalizer);
            let chose_new = finalizer::run(
                session.as_mut(),
                article,
                &CategoryOption {
                    name: existing.name.clone(),
                    description: existing.description.clone(),
                },
                &CategoryOption {
                    name: proposal.name.clone(),
                    description: proposal.description.clone(),
                },
                factory.proposal_first(),
            )
            .await
            .map_err(fail(AgentKind::Finalizer))?;

            if chose_new {
                CategoryChoice::New {
                    name: proposal.name,
                    description: proposal.description,
                }
            } else {
                CategoryChoice::Existing(existing.name)
            }
        }
    };
    debug!(category = category.name(), "Category chosen");

    let ignored = match &category {
        CategoryChoice::Existing(name) => catalog
            .iter()
            .find(|c| c.name == *name)
            .map(|c| c.ignore)
            .unwrap_or(false),
        // Freshly minted categories are auto-admitted.
        CategoryChoice::New { .. } => false,
    };

    let mut summaries = Vec::new();
    if !ignored {
        let mut session = factory.open(AgentKind::Summarizer);
        let summary = summarizer::run(session.as_mut(), article)
            .await
            .map_err(fail(AgentKind::Summarizer))?
            .summary;
        summaries.push(SummaryText {
            lang: "en".to_string(),
            text: summary.clone(),
        });

        let mut session = factory.open(AgentKind::Translator);
        for lang in summary_languages {
            if lang == "en" {
                continue;
            }
            let translation = translator::run(session.as_mut(), &summary, lang)
                .await
                .map_err(fail(AgentKind::Translator))?
                .translation;
            summaries.push(SummaryText {
                lang: lang.clone(),
                text: translation,
            });
        }
    }

    Ok(Analysis {
        relation,
        category,
        summaries,
    })
}

// =============================================================================
// Tests
// =============================================================================
