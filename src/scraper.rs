//! Web scraping module for content extraction.
//!
//! Uses reqwest for fetching and scraper for HTML parsing. Learning-management
//! pages (D2L / Brightspace) are tried first, then generic article layouts,
//! then the whole body.

use lazy_static::lazy_static;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// User-Agent string identifying this scraper
const USER_AGENT: &str = concat!("nibiru/", env!("CARGO_PKG_VERSION"), " (https://github.com/cladam/nibiru)");

/// Default timeout for HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extractions shorter than this probably missed an embedded document.
pub const SHORT_CONTENT_CHARS: usize = 50;

/// PDF viewer text is only appended when it is substantial.
const PDF_MIN_CHARS: usize = 100;

const CONTENT_SELECTORS: [&str; 23] = [
    ".d2l-fileviewer",
    ".d2l-fileviewer-content",
    "[data-testid=\"content-viewer\"]",
    ".d2l-htmlblock",
    ".d2l-htmleditor-container",
    ".d2l-widget-content",
    "#d2l_content",
    ".d2l-page-main",
    ".d2l-content",
    "main",
    "[role=\"main\"]",
    ".main-content",
    ".content",
    "#content",
    ".page-content",
    ".article",
    ".post",
    ".entry-content",
    ".body-content",
    "article",
    ".assignment-content",
    ".course-content",
    ".learning-hub-content",
];

const CONTEXT_SELECTORS: [&str; 10] = [
    ".d2l-navigation-s-item",
    ".d2l-breadcrumbs",
    ".d2l-navigation-s-link",
    ".d2l-page-header",
    ".breadcrumbs",
    ".breadcrumb",
    ".navigation-path",
    ".page-path",
    "[aria-label*=\"breadcrumb\" i]",
    "nav[aria-label*=\"navigation\" i]",
];

const BLOCK_ELEMENTS: [&str; 20] = [
    "p", "div", "section", "article", "main", "li", "ul", "ol", "tr", "table", "h1", "h2", "h3",
    "h4", "h5", "h6", "br", "blockquote", "pre", "dd",
];

lazy_static! {
    static ref CONTENT: Vec<Selector> = parse_all(&CONTENT_SELECTORS);
    static ref CONTEXT: Vec<Selector> = parse_all(&CONTEXT_SELECTORS);
    static ref HIDDEN: Selector =
        Selector::parse("script, style, noscript, nav, header, footer, aside, .sidebar, .menu, .navigation")
            .unwrap();
    static ref COURSE_TITLE: Selector =
        Selector::parse(".d2l-navigation-s-title, .d2l-page-header-title").unwrap();
    static ref PDF_LAYER: Selector = Selector::parse(".textLayer, .pdfViewer, #viewer").unwrap();
    static ref PDF_SPANS: Selector = Selector::parse(".textLayer span").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },
}

/// What a page yields for summarisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Visible text of the main content area
    pub text: String,
    /// Inner HTML of the main content area
    pub html: String,
    pub title: String,
    pub url: String,
    /// Breadcrumb trail, course title appended with " > "
    pub context: String,
}

/// Create a configured HTTP client for scraping
fn create_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Fetch a page and extract its content
pub async fn fetch_content(url: &str) -> Result<ExtractedContent, ScraperError> {
    let client = create_client()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let html = response.text().await?;
    debug!(%url, bytes = html.len(), "page fetched");

    Ok(extract_content(&html, url))
}

/// Extract main text, context and title from an HTML document.
pub fn extract_content(html: &str, url: &str) -> ExtractedContent {
    let document = Html::parse_document(html);

    let main = CONTENT
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| document.select(&BODY).next());

    let (mut text, inner_html) = match main {
        Some(element) => (visible_text(element), element.inner_html()),
        None => (String::new(), String::new()),
    };

    if let Some(pdf) = pdf_text(&document) {
        text.push_str("\n\n[PDF Content]\n");
        text.push_str(&pdf);
    }

    let text = text.trim().to_string();
    if text.chars().count() < SHORT_CONTENT_CHARS {
        warn!(%url, chars = text.chars().count(), "extracted content is very short, the document may not have been captured");
    }

    ExtractedContent {
        text,
        html: inner_html,
        title: extract_title(&document),
        url: url.to_string(),
        context: extract_context(&document),
    }
}

fn extract_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|element| collapse(&element.text().collect::<String>()))
        .unwrap_or_default()
}

fn extract_context(document: &Html) -> String {
    let mut context = CONTEXT
        .iter()
        .find_map(|selector| document.select(selector).next())
        .map(visible_text)
        .unwrap_or_default();

    if let Some(course) = document.select(&COURSE_TITLE).next() {
        let course = collapse(&course.text().collect::<String>());
        if !course.is_empty() {
            if !context.is_empty() {
                context.push_str(" > ");
            }
            context.push_str(&course);
        }
    }

    context.trim().to_string()
}

/// Text from an embedded PDF.js viewer, when there is enough of it.
fn pdf_text(document: &Html) -> Option<String> {
    let spans: Vec<String> = document
        .select(&PDF_SPANS)
        .map(|span| span.text().collect::<String>())
        .collect();
    let from_spans = collapse(&spans.join(" "));
    if from_spans.chars().count() > PDF_MIN_CHARS {
        return Some(from_spans);
    }

    document
        .select(&PDF_LAYER)
        .next()
        .map(visible_text)
        .filter(|text| text.chars().count() > PDF_MIN_CHARS)
}

/// Rendered-ish text: hidden subtrees skipped, block elements on their own lines.
fn visible_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = collapse(line);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if HIDDEN.matches(&child) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d2l_viewer_wins_over_generic_main() {
        let html = r#"<html><head><title> Lab 3 </title></head><body>
            <main><p>generic main text</p></main>
            <div class="d2l-htmlblock"><p>Due: Oct 28.</p><p>Submit a .zip.</p></div>
        </body></html>"#;
        let content = extract_content(html, "https://learn.example.ca/d2l/le/1");
        assert_eq!(content.text, "Due: Oct 28.\nSubmit a .zip.");
        assert_eq!(content.title, "Lab 3");
        assert!(content.html.contains("<p>Due: Oct 28.</p>"));
    }

    #[test]
    fn hidden_elements_are_skipped() {
        let html = r#"<body><article>
            <nav>Home | Courses</nav>
            <script>var x = 1;</script>
            <p>Lecture 9 slides on linked lists</p>
            <div class="sidebar">Upcoming events</div>
            <footer>Copyright</footer>
        </article></body>"#;
        let content = extract_content(html, "");
        assert_eq!(content.text, "Lecture 9 slides on linked lists");
    }

    #[test]
    fn falls_back_to_body() {
        let content = extract_content("<body><p>Just text</p></body>", "");
        assert_eq!(content.text, "Just text");
    }

    #[test]
    fn breadcrumb_and_course_title_form_context() {
        let html = r#"<body>
            <div class="d2l-navigation-s-title">COMP 2510</div>
            <ol class="breadcrumb"><li>Content</li><li>Week 4</li></ol>
            <main><p>body</p></main>
        </body>"#;
        let content = extract_content(html, "");
        assert_eq!(content.context, "Content\nWeek 4 > COMP 2510");
    }

    #[test]
    fn substantial_pdf_text_is_appended() {
        let words = "word ".repeat(30);
        let html = format!(
            r#"<body><main><p>Viewer</p></main><div class="textLayer"><span>{}</span><span>end</span></div></body>"#,
            words
        );
        let content = extract_content(&html, "");
        assert!(content.text.starts_with("Viewer\n\n[PDF Content]\nword word"));
        assert!(content.text.ends_with("end"));
    }

    #[test]
    fn small_pdf_layer_is_ignored() {
        let html = r#"<body><main><p>Viewer</p></main><div class="textLayer"><span>tiny</span></div></body>"#;
        assert_eq!(extract_content(html, "").text, "Viewer");
    }
}
