// Report generation from traversal results

use crate::surf::SurfSummary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use surfer_scanner::{ExtractionFailure, SurferConfig, TraversalOutcome};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub source_depth: usize,
    pub target: String,
    pub target_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub start_url: String,
    pub max_depth: usize,
    pub max_concurrency: usize,
    pub outcome: TraversalOutcome,
    pub duration_ms: u64,
    pub pages_discovered: usize,
    pub pages_expanded: usize,
    pub edges: Vec<EdgeRecord>,
    pub failures: Vec<ExtractionFailure>,
}

impl ReportData {
    pub fn from_summary(config: &SurferConfig, summary: &SurfSummary) -> Self {
        let edges: Vec<EdgeRecord> = summary
            .edges
            .iter()
            .map(|edge| EdgeRecord {
                source: edge.source.url.clone(),
                source_depth: edge.source.depth,
                target: edge.target.url.clone(),
                target_depth: edge.target.depth,
            })
            .collect();

        let mut pages: BTreeSet<&str> = BTreeSet::new();
        pages.insert(config.start_url.as_str());
        for edge in &edges {
            pages.insert(edge.source.as_str());
            pages.insert(edge.target.as_str());
        }
        let pages_discovered = pages.len();

        Self {
            start_url: config.start_url.clone(),
            max_depth: config.max_depth,
            max_concurrency: config.max_concurrency,
            outcome: summary.report.outcome,
            duration_ms: summary.elapsed.as_millis() as u64,
            pages_discovered,
            pages_expanded: summary.report.nodes_expanded,
            edges,
            failures: summary.report.failures.clone(),
        }
    }

    fn outcome_to_string(&self) -> &str {
        match self.outcome {
            TraversalOutcome::Quiesced => "Completed",
            TraversalOutcome::Cancelled => "Cancelled",
        }
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Csv => Ok(generate_csv_report(data)),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                           SURFER LINK GRAPH REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Start URL:    {}\n", data.start_url));
    report.push_str(&format!("Status:       {}\n", data.outcome_to_string()));
    report.push_str(&format!("Max Depth:    {}\n", data.max_depth));
    report.push_str(&format!("Workers:      {}\n", data.max_concurrency));
    report.push_str(&format!("Duration:     {} ms\n", data.duration_ms));
    report.push_str(&format!("Pages Found:  {}\n", data.pages_discovered));
    report.push_str(&format!("Expanded:     {}\n", data.pages_expanded));
    report.push_str(&format!("Links:        {}\n", data.edges.len()));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("LINK TREE\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&generate_link_tree(&data.edges));
    report.push('\n');

    if !data.failures.is_empty() {
        report.push_str(RULE);
        report.push_str("FAILED PAGES\n");
        report.push_str(RULE);
        report.push('\n');
        for failure in &data.failures {
            report.push_str(&format!(
                "  ✗ {} (depth {})\n      {}\n",
                failure.url, failure.depth, failure.reason
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\nGenerated by Surfer\n");
    if data.outcome == TraversalOutcome::Cancelled {
        report.push_str("Traversal was cancelled; the link graph is partial.\n");
    }

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Surfer",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json"
            },
            "traversal": {
                "start_url": data.start_url,
                "max_depth": data.max_depth,
                "max_concurrency": data.max_concurrency,
                "outcome": data.outcome,
                "duration_ms": data.duration_ms
            },
            "summary": {
                "pages_discovered": data.pages_discovered,
                "pages_expanded": data.pages_expanded,
                "total_links": data.edges.len(),
                "failed_pages": data.failures.len()
            },
            "edges": data.edges,
            "failures": data.failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_csv_report(data: &ReportData) -> String {
    let mut report = String::from("source,source_depth,target,target_depth\n");
    for edge in &data.edges {
        report.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&edge.source),
            edge.source_depth,
            csv_field(&edge.target),
            edge.target_depth
        ));
    }
    report
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();
    report.push_str("# Surfer Link Graph Report\n\n");
    report.push_str(&format!("- **Start URL:** {}\n", data.start_url));
    report.push_str(&format!("- **Status:** {}\n", data.outcome_to_string()));
    report.push_str(&format!("- **Max depth:** {}\n", data.max_depth));
    report.push_str(&format!("- **Workers:** {}\n", data.max_concurrency));
    report.push_str(&format!("- **Pages found:** {}\n", data.pages_discovered));
    report.push_str(&format!("- **Links:** {}\n\n", data.edges.len()));

    report.push_str("## Links\n\n");
    report.push_str("| Source | Depth | Target | Depth |\n");
    report.push_str("|--------|-------|--------|-------|\n");
    for edge in &data.edges {
        report.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            markdown_cell(&edge.source),
            edge.source_depth,
            markdown_cell(&edge.target),
            edge.target_depth
        ));
    }

    if !data.failures.is_empty() {
        report.push_str("\n## Failed Pages\n\n");
        for failure in &data.failures {
            report.push_str(&format!(
                "- `{}` (depth {}): {}\n",
                failure.url, failure.depth, failure.reason
            ));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Sources in depth order, each followed by the pages it links to.
pub fn generate_link_tree(edges: &[EdgeRecord]) -> String {
    if edges.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut by_source: BTreeMap<(usize, &str), Vec<&EdgeRecord>> = BTreeMap::new();
    for edge in edges {
        by_source
            .entry((edge.source_depth, edge.source.as_str()))
            .or_default()
            .push(edge);
    }

    let mut tree = String::new();
    for ((depth, source), targets) in by_source {
        tree.push_str(&format!("[{}] {}\n", depth, source));
        for (i, edge) in targets.iter().enumerate() {
            let prefix = if i == targets.len() - 1 {
                "└── "
            } else {
                "├── "
            };
            tree.push_str(&format!("  {}{}\n", prefix, edge.target));
        }
    }

    tree
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
