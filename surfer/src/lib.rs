pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_config, load_config_file, parse_url_line, resolve_config};

// Re-export surf functionality from surfer-core
pub use surfer_core::surf::{EdgeCallback, SurfOptions, SurfSummary, execute_surf, extract_url_path};
