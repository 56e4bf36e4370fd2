use commands::command_argument_builder;
use surfer::handlers::{handle_meta, handle_stream, handle_surf};
use surfer_core::print_banner;
use tracing::Level;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("surf", primary_command)) => handle_surf(primary_command, quiet).await,
        Some(("stream", primary_command)) => handle_stream(primary_command).await,
        Some(("meta", primary_command)) => handle_meta(primary_command).await,
        // No subcommand provided, just show the banner
        None => Ok(()),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so edge output on stdout stays clean.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
