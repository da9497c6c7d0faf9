use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

/// Deterministic path layout over the data directory, with atomic writes.
///
/// The manager never deletes: stale files left by rolled-back transactions
/// are a tolerated footprint and make retries idempotent.
#[derive(Clone)]
pub struct FileManager {
    data_dir: PathBuf,
    timezone: Tz,
}

impl FileManager {
    pub fn new(data_dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            data_dir: data_dir.into(),
            timezone,
        }
    }

    /// `{data_dir}/metadata/YYYY/MM/DD.json`
    pub fn index_path(&self, day: NaiveDate) -> PathBuf {
        self.data_dir
            .join("metadata")
            .join(format!("{:04}", day.year()))
            .join(format!("{:02}", day.month()))
            .join(format!("{:02}.json", day.day()))
    }

    /// `{data_dir}/news/YYYY-MM-DD/HH-MM-{id}.md`
    pub fn article_path(&self, id: i64, published_at: DateTime<Utc>) -> PathBuf {
        let (dir, prefix) = self.news_parts(published_at);
        dir.join(format!("{prefix}-{id}.md"))
    }

    /// `{data_dir}/news/YYYY-MM-DD/HH-MM-{id}-sum.{lang}.txt`
    pub fn summary_path(&self, id: i64, published_at: DateTime<Utc>, lang: &str) -> PathBuf {
        let (dir, prefix) = self.news_parts(published_at);
        dir.join(format!("{prefix}-{id}-sum.{lang}.txt"))
    }

    fn news_parts(&self, published_at: DateTime<Utc>) -> (PathBuf, String) {
        let local = published_at.with_timezone(&self.timezone);
        let dir = self
            .data_dir
            .join("news")
            .join(local.format("%Y-%m-%d").to_string());
        let prefix = format!("{:02}-{:02}", local.hour(), local.minute());
        (dir, prefix)
    }

    /// Create parent directories if needed, then write atomically
    /// (temp file + rename in the same directory).
    pub async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        write_atomic(path, contents.as_bytes()).await
    }

    pub async fn read(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Atomic write usable outside the manager's layout (raw engine dumps).
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?
        .to_string_lossy();
    let tmp = parent.join(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manager(dir: &Path) -> FileManager {
        FileManager::new(dir, chrono_tz::America::Costa_Rica)
    }

    #[test]
    fn index_path_layout() {
        let fm = manager(Path::new("/data"));
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            fm.index_path(day),
            PathBuf::from("/data/metadata/2024/06/01.json")
        );
    }

    #[test]
    fn article_paths_use_source_local_time() {
        let fm = manager(Path::new("/data"));
        // 16:15 UTC = 10:15 in Costa Rica (UTC-6, no DST)
        let published = Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap();
        assert_eq!(
            fm.article_path(12345, published),
            PathBuf::from("/data/news/2024-06-01/10-15-12345.md")
        );
        assert_eq!(
            fm.summary_path(12345, published, "ru"),
            PathBuf::from("/data/news/2024-06-01/10-15-12345-sum.ru.txt")
        );
    }

    #[test]
    fn utc_midnight_rolls_back_a_day_locally() {
        let fm = manager(Path::new("/data"));
        // 02:30 UTC on June 2 = 20:30 June 1 local
        let published = Utc.with_ymd_and_hms(2024, 6, 2, 2, 30, 0).unwrap();
        assert_eq!(
            fm.article_path(7, published),
            PathBuf::from("/data/news/2024-06-01/20-30-7.md")
        );
    }

    #[tokio::test]
    async fn write_creates_dirs_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let fm = manager(tmp.path());
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let path = fm.index_path(day);

        fm.write(&path, "{\"articles\":[]}").await.unwrap();
        assert_eq!(fm.read(&path).await.unwrap(), "{\"articles\":[]}");

        // Overwrite goes through the same temp+rename path.
        fm.write(&path, "{}").await.unwrap();
        assert_eq!(fm.read(&path).await.unwrap(), "{}");
    }
}
