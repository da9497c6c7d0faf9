use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

/// A half-open date interval `[from, to)` with no ingested index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl GapRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from < to).then_some(Self { from, to })
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    /// Days covered, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take_while(move |d| *d < self.to)
    }

    /// Whether two ranges overlap or are adjacent (mergeable on insert).
    fn touches(&self, other: &GapRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

/// Coalesce a new range with every existing range it touches. Returns the
/// merged range and the existing ranges it absorbed. The table invariant
/// (pairwise disjoint, non-empty) holds as long as `existing` satisfied it.
pub fn coalesce(existing: &[GapRange], new: GapRange) -> (GapRange, Vec<GapRange>) {
    let mut merged = new;
    let mut absorbed = Vec::new();
    for range in existing {
        if merged.touches(range) {
            merged.from = merged.from.min(range.from);
            merged.to = merged.to.max(range.to);
            absorbed.push(*range);
        }
    }
    (merged, absorbed)
}

/// Open (and merge) a gap covering `[from, to)` in one transaction.
pub async fn open(pool: &PgPool, from: NaiveDate, to: NaiveDate) -> Result<()> {
    let Some(new) = GapRange::new(from, to) else {
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    let rows: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
        "SELECT from_day, to_day FROM gap_ranges
         WHERE from_day <= $1 AND to_day >= $2
         FOR UPDATE",
    )
    .bind(new.to)
    .bind(new.from)
    .fetch_all(&mut *tx)
    .await?;

    let existing: Vec<GapRange> = rows
        .into_iter()
        .map(|(from, to)| GapRange { from, to })
        .collect();
    let (merged, absorbed) = coalesce(&existing, new);

    for range in &absorbed {
        sqlx::query("DELETE FROM gap_ranges WHERE from_day = $1")
            .bind(range.from)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("INSERT INTO gap_ranges (from_day, to_day) VALUES ($1, $2)")
        .bind(merged.from)
        .bind(merged.to)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(from = %merged.from, to = %merged.to, "Gap range opened");
    Ok(())
}

/// The oldest gap, if any. Backfill always works oldest-first.
pub async fn earliest(pool: &PgPool) -> Result<Option<GapRange>> {
    let row: Option<(NaiveDate, NaiveDate)> =
        sqlx::query_as("SELECT from_day, to_day FROM gap_ranges ORDER BY from_day LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(from, to)| GapRange { from, to }))
}

/// Record that the front days of `gap` up to (but excluding) `new_from` are
/// covered: shrink the range, or delete it once empty.
pub async fn advance(pool: &PgPool, gap: &GapRange, new_from: NaiveDate) -> Result<()> {
    if new_from >= gap.to {
        sqlx::query("DELETE FROM gap_ranges WHERE from_day = $1")
            .bind(gap.from)
            .execute(pool)
            .await?;
        info!(from = %gap.from, to = %gap.to, "Gap range fully covered");
    } else {
        sqlx::query("UPDATE gap_ranges SET from_day = $1 WHERE from_day = $2")
            .bind(new_from)
            .bind(gap.from)
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(from: &str, to: &str) -> GapRange {
        GapRange::new(day(from), day(to)).unwrap()
    }

    #[test]
    fn empty_interval_is_rejected() {
        assert!(GapRange::new(day("2024-06-04"), day("2024-06-04")).is_none());
        assert!(GapRange::new(day("2024-06-05"), day("2024-06-04")).is_none());
    }

    #[test]
    fn days_are_half_open() {
        let days: Vec<NaiveDate> = range("2024-06-02", "2024-06-04").days().collect();
        assert_eq!(days, vec![day("2024-06-02"), day("2024-06-03")]);
    }

    #[test]
    fn coalesce_with_no_neighbors_keeps_range() {
        let existing = vec![range("2024-01-01", "2024-01-05")];
        let (merged, absorbed) = coalesce(&existing, range("2024-03-01", "2024-03-02"));
        assert_eq!(merged, range("2024-03-01", "2024-03-02"));
        assert!(absorbed.is_empty());
    }

    #[test]
    fn coalesce_merges_overlap() {
        let existing = vec![range("2024-06-01", "2024-06-05")];
        let (merged, absorbed) = coalesce(&existing, range("2024-06-03", "2024-06-08"));
        assert_eq!(merged, range("2024-06-01", "2024-06-08"));
        assert_eq!(absorbed, existing);
    }

    #[test]
    fn coalesce_merges_adjacent_ranges() {
        // [1,3) + [3,5) are adjacent: one covered day apart would NOT merge.
        let existing = vec![range("2024-06-01", "2024-06-03")];
        let (merged, absorbed) = coalesce(&existing, range("2024-06-03", "2024-06-05"));
        assert_eq!(merged, range("2024-06-01", "2024-06-05"));
        assert_eq!(absorbed.len(), 1);
    }

    #[test]
    fn coalesce_spans_multiple_ranges() {
        let existing = vec![
            range("2024-06-01", "2024-06-03"),
            range("2024-06-06", "2024-06-08"),
            range("2024-07-01", "2024-07-02"),
        ];
        let (merged, absorbed) = coalesce(&existing, range("2024-06-02", "2024-06-07"));
        assert_eq!(merged, range("2024-06-01", "2024-06-08"));
        assert_eq!(absorbed.len(), 2);
    }

    #[test]
    fn disjoint_ranges_stay_disjoint() {
        let existing = vec![range("2024-06-01", "2024-06-03")];
        let (merged, absorbed) = coalesce(&existing, range("2024-06-04", "2024-06-06"));
        // One fully covered day (06-03) separates them.
        assert_eq!(merged, range("2024-06-04", "2024-06-06"));
        assert!(absorbed.is_empty());
    }
}
