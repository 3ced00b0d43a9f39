use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use shelf_core::config::ClassifierConfig;
use shelf_core::{EmbeddingProvider, Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Pages larger than this are cut before parsing
const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: String,
    pub description: String,
    pub content: String,
    pub image_url: Option<String>,
    pub word_count: i64,
    pub confidence: f64,
}

impl ExtractedMetadata {
    fn classification_text(&self) -> String {
        [self.title.as_str(), self.description.as_str(), self.content.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedMetadata>;
}

/// Fetches a page and reads its metadata from OpenGraph tags and markup.
pub struct HtmlMetadataExtractor {
    client: Client,
    classifier: Option<Arc<dyn EmbeddingProvider>>,
    min_confidence: f64,
}

impl HtmlMetadataExtractor {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            classifier: None,
            min_confidence: config.min_confidence,
        })
    }

    /// Reject pages the provider does not classify as articles
    pub fn with_classifier(mut self, classifier: Arc<dyn EmbeddingProvider>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Extraction(format!("HTTP {} fetching {}", status, url)));
        }

        let body = response.bytes().await?;
        let body = &body[..body.len().min(MAX_PAGE_BYTES)];
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

impl fmt::Debug for HtmlMetadataExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlMetadataExtractor")
            .field("client", &"<reqwest::Client>")
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

#[async_trait]
impl MetadataExtractor for HtmlMetadataExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedMetadata> {
        let page_url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        let html = self.fetch(&page_url).await?;
        let mut metadata = parse_html(&html, &page_url)?;

        if metadata.title.is_empty() && metadata.content.is_empty() {
            return Err(Error::Extraction(format!("no readable content at {}", url)));
        }

        if let Some(classifier) = &self.classifier {
            let classification = classifier.classify(&metadata.classification_text()).await?;
            debug!(
                "Classified {}: is_article={}, confidence={:.2}",
                url, classification.is_article, classification.confidence
            );
            if !classification.is_article || classification.confidence < self.min_confidence {
                return Err(Error::Extraction(format!(
                    "content does not look like an article (confidence {:.2})",
                    classification.confidence
                )));
            }
            metadata.confidence = classification.confidence;
        }

        info!("Extracted metadata for {} ({} words)", url, metadata.word_count);
        Ok(metadata)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Extraction(format!("invalid selector '{}': {}", css, e)))
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(document: &Html, css: &str) -> Result<Option<String>> {
    Ok(document
        .select(&selector(css)?)
        .filter_map(|el| el.value().attr("content"))
        .map(clean_text)
        .find(|text| !text.is_empty()))
}

fn first_text(document: &Html, css: &str) -> Result<Option<String>> {
    Ok(document
        .select(&selector(css)?)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .find(|text| !text.is_empty()))
}

fn paragraphs(document: &Html, css: &str) -> Result<Vec<String>> {
    Ok(document
        .select(&selector(css)?)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect())
}

/// Absolute http(s) image URL, relative references resolved against the page
fn resolve_image(raw: &str, base: &Url) -> Option<String> {
    let resolved = base.join(raw).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Read metadata out of an HTML document. `confidence` is left at zero.
pub fn parse_html(html: &str, base: &Url) -> Result<ExtractedMetadata> {
    let document = Html::parse_document(html);

    let title = match meta_content(&document, "meta[property='og:title']")? {
        Some(title) => title,
        None => first_text(&document, "title")?
            .or(first_text(&document, "h1")?)
            .unwrap_or_default(),
    };

    let description = match meta_content(&document, "meta[property='og:description']")? {
        Some(description) => description,
        None => meta_content(&document, "meta[name='description']")?.unwrap_or_default(),
    };

    let image_url = meta_content(&document, "meta[property='og:image']")?
        .and_then(|raw| resolve_image(&raw, base));

    let mut body = paragraphs(&document, "article p")?;
    if body.is_empty() {
        body = paragraphs(&document, "p")?;
    }
    let content = body.join("\n\n");
    let word_count = content.split_whitespace().count() as i64;

    Ok(ExtractedMetadata {
        title,
        description,
        content,
        image_url,
        word_count,
        confidence: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Fallback   Title</title>
            <meta property="og:title" content="Ownership in Practice">
            <meta name="description" content="  How the borrow checker
              shapes APIs ">
            <meta property="og:image" content="/images/cover.png">
          </head>
          <body>
            <p>Navigation text</p>
            <article>
              <h1>Ownership in Practice</h1>
              <p>First   paragraph here.</p>
              <p></p>
              <p>Second paragraph.</p>
            </article>
          </body>
        </html>
    "#;

    #[test]
    fn test_parse_html_prefers_open_graph_and_article_body() {
        let base = Url::parse("https://blog.example.com/posts/ownership").unwrap();
        let metadata = parse_html(PAGE, &base).unwrap();

        assert_eq!(metadata.title, "Ownership in Practice");
        assert_eq!(metadata.description, "How the borrow checker shapes APIs");
        assert_eq!(metadata.image_url.as_deref(), Some("https://blog.example.com/images/cover.png"));
        assert_eq!(metadata.content, "First paragraph here.\n\nSecond paragraph.");
        assert_eq!(metadata.word_count, 5);
    }

    #[test]
    fn test_parse_html_falls_back_to_plain_markup() {
        let html = "<html><head><title> Plain  page </title></head><body><p>Only text.</p></body></html>";
        let base = Url::parse("https://example.com/").unwrap();
        let metadata = parse_html(html, &base).unwrap();

        assert_eq!(metadata.title, "Plain page");
        assert_eq!(metadata.description, "");
        assert_eq!(metadata.image_url, None);
        assert_eq!(metadata.content, "Only text.");
    }

    #[test]
    fn test_non_http_images_are_dropped() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(resolve_image("data:image/png;base64,AAAA", &base), None);
        assert_eq!(
            resolve_image("https://cdn.example.com/a.jpg", &base).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
    }
}
