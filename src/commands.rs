//! CLI command implementations.
//!
//! Each `run_*` function builds what it needs from the config, does the
//! work, and prints a human-readable report to stdout.

use anyhow::{anyhow, Result};
use repo_help_core::models::{MatchResult, Namespace};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::ingest::IngestReport;
use crate::service::RepoHelp;
use crate::store::create_store;

fn parse_namespace(repo: &str) -> Result<Namespace> {
    Namespace::parse(repo).ok_or_else(|| anyhow!("repo must be owner/project, got '{}'", repo))
}

/// Token cancelled on the first Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; finishing files already in progress...");
            child.cancel();
        }
    });
    token
}

/// Open the configured store, creating its schema or collection.
pub async fn run_init(config: &Config) -> Result<()> {
    let store = create_store(&config.store).await?;
    let page = store.list_page(1, 1).await?;
    println!(
        "Store ready ({}, {} entries).",
        config.store.backend, page.total
    );
    Ok(())
}

pub async fn run_ingest(
    config: &Config,
    repo: &str,
    limit: Option<usize>,
    concurrency: Option<usize>,
) -> Result<()> {
    let namespace = parse_namespace(repo)?;
    let mut config = config.clone();
    if let Some(c) = concurrency {
        config.ingest.concurrency = c.max(1);
    }
    let service = RepoHelp::from_config(&config).await?;
    let report = service
        .ingest_namespace(&namespace, limit, ctrl_c_token())
        .await?;
    print_ingest(&namespace, &report);
    Ok(())
}

pub async fn run_query(config: &Config, repo: &str, title: &str, body: &str) -> Result<()> {
    let namespace = parse_namespace(repo)?;
    let service = RepoHelp::from_config(config).await?;
    let results = service.answer(&namespace, title, body).await?;
    print_matches(&results);
    Ok(())
}

pub async fn run_analyze(config: &Config, repo: &str, title: &str, body: &str) -> Result<()> {
    let namespace = parse_namespace(repo)?;
    let service = RepoHelp::from_config(config).await?;
    let analysis = service
        .analyze(&namespace, title, body, ctrl_c_token())
        .await?;
    print_ingest(&namespace, &analysis.ingest);
    println!();
    print_matches(&analysis.results);
    Ok(())
}

pub async fn run_list(config: &Config, page: usize, limit: usize) -> Result<()> {
    let service = RepoHelp::from_config(config).await?;
    let page = service.list_entries(page, limit).await?;

    if page.documents.is_empty() {
        println!("No entries on page {} ({} total).", page.page, page.total);
        return Ok(());
    }

    println!(
        "Page {} ({} per page, {} entries total):",
        page.page, page.limit, page.total
    );
    for doc in &page.documents {
        println!("  {}  [{}] {}", doc.doc_id, doc.namespace, doc.file);
        println!("      {}", first_line(&doc.summary));
    }
    Ok(())
}

fn print_ingest(namespace: &Namespace, report: &IngestReport) {
    println!("Ingest {}:", namespace);
    println!("  stored:    {}", report.stored);
    println!("  skipped:   {}", report.skipped);
    println!("  failed:    {}", report.failed.len());
    for path in &report.failed {
        println!("    - {}", path);
    }
    if !report.cancelled.is_empty() {
        println!("  cancelled: {}", report.cancelled.len());
    }
}

fn print_matches(results: &[MatchResult]) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}  ({})",
            i + 1,
            result.distance,
            result.file,
            result.doc_id
        );
        for line in result.text.lines().take(6) {
            println!("    {}", line);
        }
        if let Some(code) = &result.code {
            println!("    code: {}", first_line(code));
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("")
}
