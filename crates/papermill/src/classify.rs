//! Link classification.
//!
//! Each catalog level is recognised by where a link points, not by what its markup looks like.
//! An href is parsed into path segments and compared against the base listing path plus the
//! codes of the current context:
//!
//! | level    | expected path below the base            | extracted          |
//! |----------|-----------------------------------------|--------------------|
//! | branch   | `{code}`                                | code, cleaned name |
//! | semester | `{branch}/{n}`, `n` in `1..=8`          | number             |
//! | subject  | `{branch}/{semester}/{code}`            | code, cleaned name |
//! | paper    | download endpoint with a paper parameter | year label, URL    |
//!
//! Links that do not fit are skipped silently. Duplicates collapse onto their first occurrence.
//!
//! # Examples
//!
//! ```
//! use papermill::{classify::LinkClassifier, links::Link};
//! use url::Url;
//!
//! let classifier = LinkClassifier::new(
//!   Url::parse("https://example.com/papers/BE/").unwrap(),
//!   "/download/",
//!   "paper",
//! );
//! let links = [
//!   Link::new("https://example.com/papers/BE/CE/3/", "Semester 3"),
//!   Link::new("https://example.com/papers/BE/CE/1/", "Semester 1"),
//!   Link::new("https://example.com/papers/BE/CE/9/", "Semester 9"),
//! ];
//! assert_eq!(classifier.semesters(&links, "CE"), vec![1, 3]);
//! ```

use std::collections::{BTreeSet, HashSet};

use super::*;

lazy_static! {
  static ref LEADING_NUMBER: Regex = Regex::new(r"^\d+\s*").unwrap();
  static ref BRANCH_PREFIX: Regex = Regex::new(r"GTU BE\s*").unwrap();
  static ref PAPERS_SUFFIX: Regex = Regex::new(r"\s*Papers$").unwrap();
  static ref SUBJECT_PREFIX: Regex = Regex::new(r"^\d+\s*[/-]\s*").unwrap();
  static ref YEAR_LABEL: Regex = Regex::new(r"\b(Winter|Summer)\s+(\d{4})\b").unwrap();
}

/// Lowest semester number accepted.
pub const FIRST_SEMESTER: u8 = 1;
/// Highest semester number accepted.
pub const LAST_SEMESTER: u8 = 8;

/// A branch found on the root listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLink {
  /// Branch code.
  pub code: String,
  /// Cleaned name.
  pub name: String,
}

/// A subject found on a semester listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectLink {
  /// Subject code.
  pub code: String,
  /// Cleaned name.
  pub name: String,
}

/// A paper found on a subject listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperLink {
  /// Session label such as `"Winter 2025"`.
  pub year_label: String,
  /// Absolute download URL.
  pub source_url: String,
}

/// A catalog level together with the path that leads to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level<'a> {
  /// Branches, listed on the root page.
  Branch,
  /// Semesters of `branch`.
  Semester {
    /// Branch code.
    branch: &'a str,
  },
  /// Subjects of a semester.
  Subject {
    /// Branch code.
    branch:   &'a str,
    /// Semester number.
    semester: u8,
  },
  /// Papers of a subject.
  Paper {
    /// Branch code.
    branch:   &'a str,
    /// Semester number.
    semester: u8,
    /// Subject code.
    subject:  &'a str,
  },
}

/// A typed record extracted from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  /// See [`Level::Branch`].
  Branch(BranchLink),
  /// See [`Level::Semester`].
  Semester(u8),
  /// See [`Level::Subject`].
  Subject(SubjectLink),
  /// See [`Level::Paper`].
  Paper(PaperLink),
}

impl Level<'_> {
  /// Path segments below the base that lead to this level's listing page.
  fn context(&self) -> Vec<String> {
    match *self {
      Level::Branch => vec![],
      Level::Semester { branch } => vec![branch.to_string()],
      Level::Subject { branch, semester } => vec![branch.to_string(), semester.to_string()],
      Level::Paper { branch, semester, subject } =>
        vec![branch.to_string(), semester.to_string(), subject.to_string()],
    }
  }
}

/// Extracts next-level records from the links of a listing page.
#[derive(Debug, Clone)]
pub struct LinkClassifier {
  /// Root listing URL.
  base:          Url,
  /// Non-empty path segments of `base`.
  base_segments: Vec<String>,
  /// Path fragment of the download endpoint.
  download_path: String,
  /// Query parameter holding the paper identifier.
  paper_param:   String,
}

impl LinkClassifier {
  /// Creates a classifier for the catalog rooted at `base`.
  pub fn new(base: Url, download_path: impl Into<String>, paper_param: impl Into<String>) -> Self {
    let base_segments = segments(&base);
    Self {
      base,
      base_segments,
      download_path: download_path.into(),
      paper_param: paper_param.into(),
    }
  }

  /// Creates the classifier described by a [`Config`](crate::Config).
  pub fn from_config(config: &crate::Config) -> Result<Self> {
    Ok(Self::new(Url::parse(&config.base_url)?, &config.download_path, &config.paper_param))
  }

  /// Root listing URL.
  pub fn base(&self) -> &Url { &self.base }

  /// URL of the page listing the records of `level`.
  pub fn listing_url(&self, level: &Level) -> Result<Url> {
    let mut path = level.context().join("/");
    if !path.is_empty() {
      path.push('/');
    }
    Ok(self.base.join(&path)?)
  }

  /// Extracts the records of `level` from `links`.
  pub fn classify(&self, links: &[Link], level: &Level) -> Vec<Record> {
    match *level {
      Level::Branch => self.branches(links).into_iter().map(Record::Branch).collect(),
      Level::Semester { branch } =>
        self.semesters(links, branch).into_iter().map(Record::Semester).collect(),
      Level::Subject { branch, semester } =>
        self.subjects(links, branch, semester).into_iter().map(Record::Subject).collect(),
      Level::Paper { .. } => self.papers(links).into_iter().map(Record::Paper).collect(),
    }
  }

  /// Branches linked from the root listing, first occurrence of each code wins.
  pub fn branches(&self, links: &[Link]) -> Vec<BranchLink> {
    let mut seen = HashSet::new();
    let mut branches = Vec::new();
    for link in links {
      let Some(code) = self.child_segment(&link.href, &[]) else {
        continue;
      };
      let name = clean_branch_name(&link.text);
      if name.is_empty() {
        trace!("Skipping branch link without a name: {}", link.href);
        continue;
      }
      if seen.insert(code.clone()) {
        branches.push(BranchLink { code, name });
      }
    }
    branches
  }

  /// Semester numbers linked from a branch listing, ascending and unique.
  pub fn semesters(&self, links: &[Link], branch: &str) -> Vec<u8> {
    let parent = [branch.to_string()];
    let numbers: BTreeSet<u8> = links
      .iter()
      .filter_map(|link| self.child_segment(&link.href, &parent))
      .filter_map(|segment| parse_semester(&segment))
      .collect();
    numbers.into_iter().collect()
  }

  /// Subjects linked from a semester listing, first occurrence of each code wins.
  pub fn subjects(&self, links: &[Link], branch: &str, semester: u8) -> Vec<SubjectLink> {
    let parent = [branch.to_string(), semester.to_string()];
    let mut seen = HashSet::new();
    let mut subjects = Vec::new();
    for link in links {
      let Some(code) = self.child_segment(&link.href, &parent) else {
        continue;
      };
      let name = clean_subject_name(&link.text);
      if name.is_empty() {
        trace!("Skipping subject link without a name: {}", link.href);
        continue;
      }
      if seen.insert(code.clone()) {
        subjects.push(SubjectLink { code, name });
      }
    }
    subjects
  }

  /// Papers linked from a subject listing, first occurrence of each year label wins.
  pub fn papers(&self, links: &[Link]) -> Vec<PaperLink> {
    let mut seen = HashSet::new();
    let mut papers = Vec::new();
    for link in links {
      if !self.is_download(&link.href) {
        continue;
      }
      let Some(year_label) = year_label(&link.text) else {
        trace!("Skipping download link without a session label: {:?}", link.text);
        continue;
      };
      if seen.insert(year_label.clone()) {
        papers.push(PaperLink { year_label, source_url: link.href.clone() });
      }
    }
    papers
  }

  /// Matches `href` against `base / parent / {child}` and returns the child segment.
  ///
  /// The href must share the base's origin and have exactly one segment more than
  /// `base / parent`; query and fragment are ignored.
  fn child_segment(&self, href: &str, parent: &[String]) -> Option<String> {
    let url = Url::parse(href).ok()?;
    if url.origin() != self.base.origin() {
      return None;
    }
    let path = segments(&url);
    let prefix_len = self.base_segments.len() + parent.len();
    if path.len() != prefix_len + 1 {
      return None;
    }
    let (prefix, child) = path.split_at(prefix_len);
    let expected = self.base_segments.iter().chain(parent);
    if !prefix.iter().zip(expected).all(|(actual, expected)| actual == expected) {
      return None;
    }
    Some(child[0].clone())
  }

  /// Whether `href` targets the download endpoint with a non-empty paper parameter.
  fn is_download(&self, href: &str) -> bool {
    let Ok(url) = Url::parse(href) else {
      return false;
    };
    url.path().contains(&self.download_path)
      && url.query_pairs().any(|(key, value)| key == self.paper_param.as_str() && !value.is_empty())
  }
}

/// Non-empty path segments of `url`.
fn segments(url: &Url) -> Vec<String> {
  url
    .path_segments()
    .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_string).collect())
    .unwrap_or_default()
}

/// Parses a semester segment, accepting only plain digits in the semester range.
fn parse_semester(segment: &str) -> Option<u8> {
  if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  segment.parse().ok().filter(|n| (FIRST_SEMESTER..=LAST_SEMESTER).contains(n))
}

/// Strips the leading number, the `GTU BE` boilerplate and the `Papers` suffix.
pub fn clean_branch_name(text: &str) -> String {
  let name = LEADING_NUMBER.replace(text.trim(), "");
  let name = BRANCH_PREFIX.replace_all(&name, "");
  let name = PAPERS_SUFFIX.replace(&name, "");
  name.trim().to_string()
}

/// Strips a leading `number -` or `number /` token and the `Papers` suffix.
pub fn clean_subject_name(text: &str) -> String {
  let name = SUBJECT_PREFIX.replace(text.trim(), "");
  let name = PAPERS_SUFFIX.replace(&name, "");
  name.trim().to_string()
}

/// Extracts a `"{Season} {year}"` label, normalising the whitespace in between.
pub fn year_label(text: &str) -> Option<String> {
  YEAR_LABEL.captures(text).map(|captures| format!("{} {}", &captures[1], &captures[2]))
}
