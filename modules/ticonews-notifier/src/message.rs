use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use telegram_client::escape;

/// Render one channel message:
///
/// ```text
/// {summary}
///
/// _{YYYY/MM/DD HH:MM local}_
///
/// {url}
/// #{category}
/// ```
///
/// Everything except the italic markers around the date is escaped for the
/// MarkdownV2 dialect.
pub fn format_message(
    summary: &str,
    published_at: DateTime<Utc>,
    tz: Tz,
    url: &str,
    category: &str,
) -> String {
    let local = published_at.with_timezone(&tz);
    let date = local.format("%Y/%m/%d %H:%M").to_string();
    format!(
        "{}\n\n_{}_\n\n{}\n{}",
        escape(summary),
        escape(&date),
        escape(url),
        escape(&hashtags(category)),
    )
}

/// `parent/child` category paths become two hashtags; hashtag words never
/// contain spaces or dashes.
fn hashtags(category: &str) -> String {
    category
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| format!("#{}", sanitize(part)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Costa_Rica;

    #[test]
    fn template_layout_and_escaping() {
        // 16:15 UTC = 10:15 local
        let published = Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap();
        let text = format_message(
            "Gas got pricier.",
            published,
            Costa_Rica,
            "https://www.crhoy.com/a/101",
            "economy",
        );
        assert_eq!(
            text,
            "Gas got pricier\\.\n\n_2024/06/01 10:15_\n\nhttps://www\\.crhoy\\.com/a/101\n\\#economy"
        );
    }

    #[test]
    fn slash_category_splits_into_two_hashtags() {
        assert_eq!(hashtags("deportes/futbol"), "#deportes #futbol");
        assert_eq!(hashtags("nacionales"), "#nacionales");
    }

    #[test]
    fn hashtag_words_are_sanitized() {
        assert_eq!(hashtags("medio-ambiente"), "#medio_ambiente");
        assert_eq!(hashtags("vida diaria"), "#vida_diaria");
    }

    #[test]
    fn date_renders_in_source_timezone() {
        // 02:30 UTC June 2 = 20:30 June 1 local
        let published = Utc.with_ymd_and_hms(2024, 6, 2, 2, 30, 0).unwrap();
        let text = format_message("S", published, Costa_Rica, "u", "c");
        assert!(text.contains("_2024/06/01 20:30_"));
    }
}
