//! Module for the "stats" command: what the index says and what is on disk.

use papermill::catalog::CatalogTotals;

use super::*;

/// Function for the [`Commands::Stats`] in the CLI.
pub async fn stats(args: StatsArgs) -> Result<()> {
  let config = args.config.load()?;
  let catalog = MetadataStore::new(&config.metadata_path).load().await?;
  let (pdf_files, pdf_bytes) = pdfs_on_disk(&config.base_dir)?;

  if args.json {
    let totals = catalog.as_ref().map(|catalog| catalog.totals()).unwrap_or_default();
    let summary = serde_json::json!({
      "index": totals,
      "pdf_files": pdf_files,
      "pdf_bytes": pdf_bytes,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  match &catalog {
    Some(catalog) => {
      println!(
        "{} Index {}",
        style(INFO_PREFIX).cyan(),
        style(config.metadata_path.display()).yellow()
      );
      for branch in &catalog.branches {
        let totals = branch.totals();
        println!(
          "{TREE_BRANCH}{}: {} semesters, {} subjects, {} papers",
          style(branch).white().bold(),
          totals.semesters,
          totals.subjects,
          totals.papers
        );
      }
      print_totals(&catalog.totals());

      let missing = catalog
        .papers()
        .filter(|(.., paper)| !config.base_dir.join(&paper.local_path).is_file())
        .count();
      if missing > 0 {
        println!(
          "{} {missing} indexed papers are missing from {}",
          style(WARNING_PREFIX).yellow(),
          config.base_dir.display()
        );
      }
    },
    None => {
      println!(
        "{} No index found at {}",
        style(WARNING_PREFIX).yellow(),
        style(config.metadata_path.display()).yellow()
      );
    },
  }

  println!(
    "{} {} PDF files on disk in {} ({})",
    style(INFO_PREFIX).cyan(),
    style(pdf_files).yellow(),
    config.base_dir.display(),
    human_size(pdf_bytes)
  );
  Ok(())
}

/// Prints the catalog-wide totals line.
fn print_totals(totals: &CatalogTotals) {
  println!(
    "{TREE_LEAF}{} {} branches, {} semesters, {} subjects, {} papers ({} downloaded)",
    style(SUCCESS_PREFIX).green(),
    totals.branches,
    totals.semesters,
    totals.subjects,
    totals.papers,
    totals.downloaded
  );
}

/// Counts the PDF files below `base_dir` and their combined size.
fn pdfs_on_disk(base_dir: &Path) -> Result<(usize, u64)> {
  if !base_dir.is_dir() {
    return Ok((0, 0));
  }
  let pattern = format!("{}/**/*.pdf", glob::Pattern::escape(&base_dir.to_string_lossy()));
  let mut files = 0;
  let mut bytes = 0;
  for entry in glob::glob(&pattern)? {
    let path = entry?;
    files += 1;
    bytes += std::fs::metadata(&path)?.len();
  }
  Ok((files, bytes))
}

/// Formats a byte count with a binary unit.
fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{bytes} B")
  } else {
    format!("{size:.1} {}", UNITS[unit])
  }
}
