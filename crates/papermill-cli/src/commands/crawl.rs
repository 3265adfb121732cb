//! Module for the "crawl" command: mirroring the whole catalog.

use papermill::CrawlReport;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use super::*;

/// Function for the [`Commands::Crawl`] in the CLI.
pub async fn crawl(args: CrawlArgs) -> Result<()> {
  let mut config = args.config.load()?;
  if let Some(base_url) = args.base_url {
    config = config.with_base_url(base_url);
  }
  if let Some(jobs) = args.jobs {
    config = config.with_concurrency(jobs);
  }
  if let Some(delay_ms) = args.delay_ms {
    config.request_delay_ms = delay_ms;
  }
  if let Some(retries) = args.retries {
    config.retry.max_attempts = retries;
  }
  debug!("Effective configuration: {config:?}");

  println!(
    "{} Mirroring {} into {}",
    style(INFO_PREFIX).cyan(),
    style(&config.base_url).yellow(),
    style(config.base_dir.display()).yellow()
  );

  let (events, progress) = unbounded_channel();
  let traverser = Traverser::from_config(config)?.with_events(events);
  let token = traverser.cancellation_token();
  let index = traverser.store().path().to_path_buf();

  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("received interrupt");
      eprintln!(
        "{} Interrupted, stopping after the current step. Completed branches are kept.",
        style(WARNING_PREFIX).yellow()
      );
      token.cancel();
    }
  });
  let printer = tokio::spawn(print_progress(progress));

  let result = traverser.run().await;
  // Closes the event channel so the printer drains and stops.
  drop(traverser);
  let _ = printer.await;

  match result {
    Ok(report) => {
      print_report(&report, &index);
      Ok(())
    },
    Err(e) => {
      eprintln!("{} {e}", style(ERROR_PREFIX).red());
      Err(e.into())
    },
  }
}

/// Prints one line per progress event until the traverser goes away.
async fn print_progress(mut progress: UnboundedReceiver<CrawlEvent>) {
  while let Some(event) = progress.recv().await {
    match event {
      CrawlEvent::BranchesFound { count } => {
        println!("{} Found {} branches", style(INFO_PREFIX).cyan(), style(count).yellow());
      },
      CrawlEvent::BranchStarted { position, total, code, name } => {
        println!(
          "\n{} [{position}/{total}] {} ({})",
          style(INFO_PREFIX).cyan(),
          style(name).white().bold(),
          style(code).yellow()
        );
      },
      CrawlEvent::SemestersFound { count, .. } => {
        println!("{CONTINUE_PREFIX}{} semesters", style(count).yellow());
      },
      CrawlEvent::SubjectsFound { semester, count, .. } => {
        println!("{TREE_BRANCH}Semester {semester}: {} subjects", style(count).yellow());
      },
      CrawlEvent::PapersFound { subject, name, count } => {
        println!("{CONTINUE_PREFIX}{name} ({subject}): {} papers", style(count).yellow());
      },
      CrawlEvent::Download { local_path, status } => match status {
        DownloadStatus::Saved => {
          println!("{CONTINUE_PREFIX}{} {local_path}", style(SUCCESS_PREFIX).green());
        },
        DownloadStatus::Skipped => {
          println!("{CONTINUE_PREFIX}{}", style(format!("= {local_path} (exists)")).dim());
        },
        DownloadStatus::Failed(reason) => {
          println!("{CONTINUE_PREFIX}{} {local_path}: {reason}", style(ERROR_PREFIX).red());
        },
      },
      CrawlEvent::BranchFinished { code, kept: true } => {
        println!("{TREE_LEAF}{} {code} saved", style(SUCCESS_PREFIX).green());
      },
      CrawlEvent::BranchFinished { code, kept: false } => {
        println!("{TREE_LEAF}{} {code} has no papers, skipped", style(WARNING_PREFIX).yellow());
      },
    }
  }
}

/// Prints the closing summary of a crawl.
fn print_report(report: &CrawlReport, index: &Path) {
  println!();
  if report.cancelled {
    println!(
      "{} Crawl interrupted; the index holds every branch completed before",
      style(WARNING_PREFIX).yellow()
    );
  } else {
    println!("{} Crawl complete", style(SUCCESS_PREFIX).green());
  }
  println!(
    "{TREE_BRANCH}{} branches, {} semesters, {} subjects, {} papers",
    style(report.branches).yellow(),
    style(report.semesters).yellow(),
    style(report.subjects).yellow(),
    style(report.papers).yellow()
  );
  println!(
    "{TREE_BRANCH}{} downloaded, {} already present, {} failed",
    style(report.saved).green(),
    style(report.skipped).cyan(),
    style(report.failed).red()
  );
  if report.pages_failed > 0 {
    println!(
      "{TREE_BRANCH}{} {} listing pages could not be fetched",
      style(WARNING_PREFIX).yellow(),
      report.pages_failed
    );
  }
  if report.checkpoint_failures > 0 {
    println!(
      "{TREE_BRANCH}{} {} index writes failed",
      style(WARNING_PREFIX).yellow(),
      report.checkpoint_failures
    );
  }
  println!("{TREE_LEAF}Index: {}", style(index.display()).yellow());
}
