use anyhow::{bail, Result};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};

/// An article page reduced to its title and markdown body.
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub title: String,
    pub markdown: String,
}

/// Convert a raw article page into clean markdown using Readability
/// extraction. Fails on pages with no extractable main content, which the
/// caller records as a parse failure on the article.
pub fn parse_article(html: &str, url: &str) -> Result<ParsedArticle> {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let markdown = transform_content_input(input, &config);
    let markdown = markdown.trim().to_string();
    if markdown.is_empty() {
        bail!("No extractable content in article page");
    }

    let title = title_from_markdown(&markdown);
    Ok(ParsedArticle { title, markdown })
}

/// Title heuristic: the first heading, or the first non-empty line.
fn title_from_markdown(markdown: &str) -> String {
    for line in markdown.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        return line.trim_start_matches('#').trim().to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_heading() {
        let md = "# Sube el precio de la gasolina\n\nEl texto del articulo.";
        assert_eq!(title_from_markdown(md), "Sube el precio de la gasolina");
    }

    #[test]
    fn title_falls_back_to_first_line() {
        let md = "\n\nPrimera linea.\nSegunda linea.";
        assert_eq!(title_from_markdown(md), "Primera linea.");
    }

    #[test]
    fn empty_page_is_an_error() {
        assert!(parse_article("", "https://www.crhoy.com/a/1").is_err());
    }
}
