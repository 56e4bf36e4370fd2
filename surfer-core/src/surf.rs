use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use surfer_scanner::http::DEFAULT_MAX_LINKS;
use surfer_scanner::{
    CancelToken, Edge, ExtractMode, HttpLinkExtractor, Surfer, SurferConfig, TraversalOutcome,
    TraversalReport,
};
use tracing::info;
use url::Url;

/// Options for a single surf over the live web.
#[derive(Debug, Clone)]
pub struct SurfOptions {
    pub config: SurferConfig,
    pub mode: ExtractMode,
    pub timeout_secs: u64,
    pub max_links: usize,
    pub show_progress: bool,
}

impl SurfOptions {
    pub fn new(config: SurferConfig) -> Self {
        Self {
            config,
            mode: ExtractMode::default(),
            timeout_secs: 10,
            max_links: DEFAULT_MAX_LINKS,
            show_progress: false,
        }
    }
}

/// Callback invoked for every edge as soon as it is discovered
pub type EdgeCallback = Arc<dyn Fn(&Edge) + Send + Sync>;

/// Everything a finished surf produced.
#[derive(Debug, Clone)]
pub struct SurfSummary {
    pub edges: Vec<Edge>,
    pub report: TraversalReport,
    pub elapsed: Duration,
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a surf with the given options.
///
/// Edges are handed to `edge_callback` as they stream in and are also
/// collected into the returned summary. Cancelling `cancel` ends the surf
/// early; the partial result is still returned.
pub async fn execute_surf(
    options: SurfOptions,
    cancel: CancelToken,
    edge_callback: Option<EdgeCallback>,
) -> Result<SurfSummary, String> {
    let SurfOptions {
        config,
        mode,
        timeout_secs,
        max_links,
        show_progress,
    } = options;

    let extractor = HttpLinkExtractor::with_timeout(timeout_secs)
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?
        .with_mode(mode)
        .with_max_links(max_links);

    let surfer = Surfer::new(config, extractor)
        .map_err(|e| e.to_string())?
        .with_cancel_token(cancel);

    let progress_bar = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting surf...");
        Some(pb)
    } else {
        None
    };

    let started = Instant::now();
    let mut stream = surfer.stream();
    let mut edges = Vec::new();

    while let Some(edge) = stream.next().await {
        if let Some(ref callback) = edge_callback {
            callback(&edge);
        }
        if let Some(ref pb) = progress_bar {
            pb.set_message(format!(
                "Surfing... {} links found, last: {}",
                edges.len() + 1,
                extract_url_path(&edge.target.url)
            ));
        }
        edges.push(edge);
    }

    let report = stream.finish().await.map_err(|e| e.to_string())?;
    let elapsed = started.elapsed();

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!(
            "Surf {}! {} links, {} pages expanded",
            match report.outcome {
                TraversalOutcome::Quiesced => "complete",
                TraversalOutcome::Cancelled => "cancelled",
            },
            edges.len(),
            report.nodes_expanded
        ));
    }

    info!("Surf finished in {:?}", elapsed);
    Ok(SurfSummary {
        edges,
        report,
        elapsed,
    })
}
