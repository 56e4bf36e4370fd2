use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use surfer_core::report::{ReportData, ReportFormat, generate_report, save_report};
use surfer_core::surf::{SurfOptions, execute_surf};
use surfer_scanner::{
    CancelToken, ExtractMode, HttpLinkExtractor, LinkExtractor, Surfer, SurferConfig,
    TraversalOutcome,
};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/surfer/config.json";

// Helper functions for traversal handlers

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Try to parse as-is
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.has_host()
    {
        return Some(with_scheme);
    }

    None
}

/// Read a traversal config from a JSON file.
pub fn load_config_file(path: &Path) -> Result<SurferConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// The explicit `--config` file, else the default file if it exists, else defaults.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<SurferConfig> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    let default_path = PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref());
    if default_path.exists() {
        debug!("Loading config from {}", default_path.display());
        load_config_file(&default_path)
    } else {
        Ok(SurferConfig::default())
    }
}

/// Layer command line flags over the config file.
pub fn resolve_config(args: &ArgMatches) -> Result<SurferConfig> {
    let mut config = load_config(args.get_one::<PathBuf>("config"))?;

    if let Some(url) = args.get_one::<String>("url") {
        let url = parse_url_line(url).ok_or_else(|| anyhow!("Invalid URL '{}'", url))?;
        config = config.with_start_url(url);
    }
    if let Some(depth) = args.get_one::<usize>("depth") {
        config = config.with_max_depth(*depth);
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config = config.with_max_concurrency(*threads);
    }

    if config.start_url.is_empty() {
        bail!("No start URL: pass --url or set start_url in the config file");
    }
    config.validate()?;
    Ok(config)
}

fn extract_mode(args: &ArgMatches) -> ExtractMode {
    args.get_one::<String>("mode")
        .and_then(|mode| ExtractMode::from_str(mode))
        .unwrap_or_default()
}

/// A token cancelled by the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "[!] Interrupted, stopping workers...".yellow());
            handle.cancel();
        }
    });
    token
}

fn print_settings(config: &SurferConfig, mode: ExtractMode) {
    println!("\n{} Surfing {}", "~>".bright_cyan().bold(), config.start_url);
    println!("Workers: {}", config.max_concurrency);
    println!("Max depth: {}", config.max_depth);
    println!("Extraction: {:?}\n", mode);
}

pub async fn handle_surf(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let config = resolve_config(sub_matches)?;
    let mode = extract_mode(sub_matches);
    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches.get_one::<PathBuf>("output");

    if !quiet {
        print_settings(&config, mode);
    }

    let mut options = SurfOptions::new(config.clone());
    options.mode = mode;
    options.timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    options.max_links = *sub_matches.get_one::<usize>("max-links").unwrap_or(&50);
    options.show_progress = !quiet;

    let summary = execute_surf(options, cancel_on_ctrl_c(), None)
        .await
        .map_err(|e| anyhow!("Surf failed: {}", e))?;

    match summary.report.outcome {
        TraversalOutcome::Quiesced => {
            if !quiet {
                println!("\n{} Surf complete!\n", "✓".green().bold());
            }
        }
        TraversalOutcome::Cancelled => {
            eprintln!("\n{} Surf cancelled, reporting partial results\n", "!".yellow().bold());
        }
    }

    let data = ReportData::from_summary(&config, &summary);
    let report = generate_report(&data, format).context("Failed to render report")?;

    match output {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("Report saved to {}", path.display());
        }
        None => print!("{}", report),
    }

    Ok(())
}

pub async fn handle_stream(sub_matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(sub_matches)?;
    let as_json = sub_matches.get_flag("json");
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    let max_links = *sub_matches.get_one::<usize>("max-links").unwrap_or(&50);

    let extractor = HttpLinkExtractor::with_timeout(timeout)?
        .with_mode(extract_mode(sub_matches))
        .with_max_links(max_links);
    let surfer = Surfer::new(config, extractor)?.with_cancel_token(cancel_on_ctrl_c());

    let mut stream = surfer.stream();
    while let Some(edge) = stream.next().await {
        if as_json {
            println!("{}", serde_json::to_string(&edge)?);
        } else {
            println!(
                "{} {} {} {}",
                format!("[{}]", edge.source.depth).dimmed(),
                edge.source.url,
                "->".bright_blue(),
                edge.target.url
            );
        }
    }

    let report = stream.finish().await?;
    info!(
        "{:?}: {} link(s), {} page(s) expanded, {} failure(s)",
        report.outcome,
        report.edges_emitted,
        report.nodes_expanded,
        report.failures.len()
    );
    for failure in &report.failures {
        eprintln!("{} {}: {}", "✗".red(), failure.url, failure.reason);
    }

    Ok(())
}

pub async fn handle_meta(sub_matches: &ArgMatches) -> Result<()> {
    let raw = sub_matches
        .get_one::<String>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let url = parse_url_line(raw).ok_or_else(|| anyhow!("Invalid URL '{}'", raw))?;
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);

    let extractor = HttpLinkExtractor::with_timeout(timeout)?;
    let metadata = extractor.extract_metadata(&url).await?;

    if metadata.is_empty() {
        println!("No metadata found on {}", url);
        return Ok(());
    }

    let width = metadata.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, value) in &metadata {
        println!("{:width$}  {}", key.bright_cyan(), value, width = width);
    }
    Ok(())
}
