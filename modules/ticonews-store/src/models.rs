use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// One article row as selected for download.
#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Relation to the locus (Costa Rica)
// ---------------------------------------------------------------------------

/// How an article relates to the audience locus, as judged by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Direct,
    Indirect,
    NotApplicable,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Direct => "direct",
            Relation::Indirect => "indirect",
            Relation::NotApplicable => "not_applicable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Relation::Direct),
            "indirect" => Some(Relation::Indirect),
            "not_applicable" => Some(Relation::NotApplicable),
            _ => None,
        }
    }

    /// Only direct and indirect articles are publishable.
    pub fn is_relevant(&self) -> bool {
        matches!(self, Relation::Direct | Relation::Indirect)
    }
}

// ---------------------------------------------------------------------------
// Smart categories
// ---------------------------------------------------------------------------

/// LLM-curated category. `__unknown__` always exists as the fallback for
/// failed analysis and is never deleted.
#[derive(Debug, Clone)]
pub struct SmartCategory {
    pub name: String,
    pub description: String,
    pub ignore: bool,
}

// ---------------------------------------------------------------------------
// Notifier projection
// ---------------------------------------------------------------------------

/// "Ready to publish?" projection of one analyzed article.
#[derive(Debug, Clone)]
pub struct NotifierArticleRow {
    pub article_id: i64,
    pub published_at: DateTime<Utc>,
    pub relation: Relation,
    pub smart_category: String,
    pub skip: bool,
    pub failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_round_trips() {
        for r in [Relation::Direct, Relation::Indirect, Relation::NotApplicable] {
            assert_eq!(Relation::parse(r.as_str()), Some(r));
        }
        assert_eq!(Relation::parse("unrelated"), None);
    }

    #[test]
    fn relevance() {
        assert!(Relation::Direct.is_relevant());
        assert!(Relation::Indirect.is_relevant());
        assert!(!Relation::NotApplicable.is_relevant());
    }
}
