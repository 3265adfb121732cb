//! Reducing a listing page to its hyperlinks.
//!
//! Classification never looks at markup directly: a page is first turned into a list of
//! [`Link`]s whose hrefs are already resolved against the page URL, so relative (`3/`) and
//! absolute (`https://host/papers/BE/CE/3/`) links are handled the same way downstream.

use scraper::{Html, Selector};

use super::*;

lazy_static! {
  static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
  static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A hyperlink found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
  /// Absolute target of the link.
  pub href: String,
  /// Visible text with whitespace collapsed.
  pub text: String,
}

impl Link {
  /// Creates a link from an already absolute href.
  pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
    Self { href: href.into(), text: text.into() }
  }
}

/// Turns a fetched page into its links.
pub trait LinkExtractor: Send + Sync {
  /// Extracts every link of `body`, resolving hrefs against `page_url`.
  fn extract(&self, page_url: &Url, body: &str) -> Vec<Link>;
}

/// [`LinkExtractor`] for HTML pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
  /// Creates the extractor.
  pub fn new() -> Self { Self }
}

impl LinkExtractor for HtmlLinkExtractor {
  fn extract(&self, page_url: &Url, body: &str) -> Vec<Link> {
    let document = Html::parse_document(body);
    document
      .select(&ANCHOR)
      .filter_map(|anchor| {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() || href.starts_with('#') {
          return None;
        }
        let resolved = match page_url.join(href) {
          Ok(url) if matches!(url.scheme(), "http" | "https") => url,
          Ok(_) => return None,
          Err(e) => {
            trace!("Skipping unresolvable href {href:?} on {page_url}: {e}");
            return None;
          },
        };
        let text = anchor.text().collect::<Vec<_>>().join(" ");
        let text = WHITESPACE.replace_all(text.trim(), " ").into_owned();
        Some(Link { href: resolved.into(), text })
      })
      .collect()
  }
}
