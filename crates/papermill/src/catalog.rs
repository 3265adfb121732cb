//! The catalog tree and its local file layout.
//!
//! A [`Catalog`] is an ordered tree of [`Branch`] → [`Semester`] → [`Subject`] → [`Paper`]. It is
//! the exact schema of the persisted index: arrays keep discovery order and are never re-sorted.
//!
//! Where a paper lives on disk depends only on its position in the tree, see
//! [`compute_local_path`].

use super::*;

/// Root of the discovered tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
  /// Fully resolved branches, in discovery order.
  pub branches: Vec<Branch>,
}

/// An engineering branch, identified by its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
  /// Code taken from the branch's path segment.
  pub code:      String,
  /// Cleaned display name.
  pub name:      String,
  /// Semesters with at least one subject, ascending.
  pub semesters: Vec<Semester>,
}

/// A semester of a branch, numbered 1 to 8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
  /// Semester number.
  pub number:   u8,
  /// Subjects with at least one paper, in discovery order.
  pub subjects: Vec<Subject>,
}

/// A subject taught in a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  /// Code taken from the subject's path segment.
  pub code:   String,
  /// Cleaned display name.
  pub name:   String,
  /// Mirrored papers, in discovery order.
  pub papers: Vec<Paper>,
}

/// One exam paper and where it was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
  /// Session label such as `"Winter 2025"`.
  pub year_label: String,
  /// Absolute download URL.
  pub source_url: String,
  /// Path relative to the base directory, see [`compute_local_path`].
  pub local_path: String,
  /// Whether the file is present at `local_path`.
  pub downloaded: bool,
}

/// Relative location of a paper below the base directory.
///
/// The path is `{branch}/{semester}/{subject}/{year_label}.pdf` with spaces of the label
/// replaced by underscores. It always uses `/` separators so the index is identical across
/// platforms.
///
/// ```
/// use papermill::compute_local_path;
///
/// assert_eq!(compute_local_path("CE", 3, "MA301", "Winter 2025"), "CE/3/MA301/Winter_2025.pdf");
/// ```
pub fn compute_local_path(branch: &str, semester: u8, subject: &str, year_label: &str) -> String {
  format!("{branch}/{semester}/{subject}/{}.pdf", year_label.replace(' ', "_"))
}

/// Totals over a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogTotals {
  /// Number of branches.
  pub branches:   usize,
  /// Number of semesters over all branches.
  pub semesters:  usize,
  /// Number of subjects over all semesters.
  pub subjects:   usize,
  /// Number of papers over all subjects.
  pub papers:     usize,
  /// Number of papers marked downloaded.
  pub downloaded: usize,
}

impl Catalog {
  /// Creates an empty catalog.
  pub fn new() -> Self { Self::default() }

  /// Looks up a branch by code.
  pub fn branch(&self, code: &str) -> Option<&Branch> {
    self.branches.iter().find(|branch| branch.code == code)
  }

  /// Counts the nodes of the tree.
  pub fn totals(&self) -> CatalogTotals {
    self.branches.iter().fold(CatalogTotals::default(), |mut totals, branch| {
      let branch_totals = branch.totals();
      totals.branches += 1;
      totals.semesters += branch_totals.semesters;
      totals.subjects += branch_totals.subjects;
      totals.papers += branch_totals.papers;
      totals.downloaded += branch_totals.downloaded;
      totals
    })
  }

  /// Iterates over every paper with the codes of its ancestors.
  pub fn papers(&self) -> impl Iterator<Item = (&Branch, &Semester, &Subject, &Paper)> {
    self.branches.iter().flat_map(|branch| {
      branch.semesters.iter().flat_map(move |semester| {
        semester.subjects.iter().flat_map(move |subject| {
          subject.papers.iter().map(move |paper| (branch, semester, subject, paper))
        })
      })
    })
  }
}

impl Branch {
  /// Counts the nodes below this branch; `branches` is always zero.
  pub fn totals(&self) -> CatalogTotals {
    let mut totals = CatalogTotals { semesters: self.semesters.len(), ..Default::default() };
    for subject in self.semesters.iter().flat_map(|semester| &semester.subjects) {
      totals.subjects += 1;
      totals.papers += subject.papers.len();
      totals.downloaded += subject.papers.iter().filter(|paper| paper.downloaded).count();
    }
    totals
  }
}

impl Display for Branch {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} ({})", self.name, self.code)
  }
}

impl Display for Subject {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} ({})", self.name, self.code)
  }
}
