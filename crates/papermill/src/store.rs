//! Persisting the catalog index.
//!
//! The index is a single pretty-printed UTF-8 JSON document whose schema is exactly
//! [`Catalog`]. Every [`MetadataStore::persist`] rewrites it wholesale through a temporary
//! sibling file and a rename, so readers, and a crawl interrupted mid-write, only ever see the
//! previous or the new snapshot.

use super::*;

/// Reads and writes the catalog index file.
#[derive(Debug, Clone)]
pub struct MetadataStore {
  /// Location of the index.
  path: PathBuf,
}

impl MetadataStore {
  /// Creates a store for the index at `path`.
  pub fn new(path: impl AsRef<Path>) -> Self { Self { path: path.as_ref().to_path_buf() } }

  /// Location of the index.
  pub fn path(&self) -> &Path { &self.path }

  /// Replaces the persisted index with `catalog`.
  pub async fn persist(&self, catalog: &Catalog) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(catalog)?;
    json.push(b'\n');

    if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut staging = self.path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, &json).await?;
    if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
      let _ = tokio::fs::remove_file(&staging).await;
      return Err(e.into());
    }
    debug!(
      "Saved {} branch(es) to {}",
      catalog.branches.len(),
      self.path.display()
    );
    Ok(())
  }

  /// Reads the persisted index, or `None` if there is none yet.
  pub async fn load(&self) -> Result<Option<Catalog>> {
    match tokio::fs::read(&self.path).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn branch(code: &str, name: &str) -> Branch {
    Branch {
      code:      code.into(),
      name:      name.into(),
      semesters: vec![Semester {
        number:   1,
        subjects: vec![Subject {
          code:   "3110005".into(),
          name:   "Basic Electrical Engineering".into(),
          papers: vec![Paper {
            year_label: "Winter 2024".into(),
            source_url: "https://example.com/download/?paper=1".into(),
            local_path: compute_local_path(code, 1, "3110005", "Winter 2024"),
            downloaded: true,
          }],
        }],
      }],
    }
  }

  #[tokio::test]
  async fn test_missing_index_loads_as_none() {
    let dir = tempdir().unwrap();
    let store = MetadataStore::new(dir.path().join("papers_metadata.json"));
    assert!(store.load().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_rewrites_preserve_order() {
    let dir = tempdir().unwrap();
    let store = MetadataStore::new(dir.path().join("nested").join("papers_metadata.json"));

    let mut catalog = Catalog::new();
    catalog.branches.push(branch("IT", "Information Technology"));
    store.persist(&catalog).await.unwrap();
    catalog.branches.push(branch("CE", "Civil Engineering"));
    store.persist(&catalog).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, catalog);
    let codes: Vec<_> = loaded.branches.iter().map(|branch| branch.code.as_str()).collect();
    assert_eq!(codes, ["IT", "CE"]);
    assert!(!dir.path().join("nested").join("papers_metadata.json.tmp").exists());
  }

  #[tokio::test]
  async fn test_pretty_utf8_output() {
    let dir = tempdir().unwrap();
    let store = MetadataStore::new(dir.path().join("index.json"));
    let catalog = Catalog { branches: vec![branch("CE", "Génie Civil")] };
    store.persist(&catalog).await.unwrap();

    let text = std::fs::read_to_string(store.path()).unwrap();
    assert!(text.contains("Génie Civil"));
    assert!(text.starts_with("{\n  \"branches\": ["));
  }

  #[tokio::test]
  async fn test_corrupt_index_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(MetadataStore::new(&path).load().await, Err(MirrorError::Json(_))));
  }
}
