use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("surfer")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("surfer")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" ...)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .required(false),
        )
        .subcommand_required(false)
        .subcommand(
            traversal_args(
                command!("surf")
                    .about("Explore the link graph around a URL and report every link found"),
            )
            .arg(
                arg!(-o --"output" <PATH>)
                    .required(false)
                    .help("Save report to file (default: display to screen)")
                    .value_parser(clap::value_parser!(std::path::PathBuf)),
            )
            .arg(
                arg!(-f --"format" <FORMAT>)
                    .required(false)
                    .help("Report format: text, json, csv, markdown")
                    .value_parser(["text", "json", "csv", "markdown"])
                    .default_value("text"),
            ),
        )
        .subcommand(
            traversal_args(
                command!("stream").about("Print each link as soon as it is discovered"),
            )
            .arg(
                arg!(--"json")
                    .required(false)
                    .help("Print one JSON object per link")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
        .subcommand(
            command!("meta")
                .about("Print the title and meta tags of a single page")
                .arg(arg!(-u --"url" <URL>).required(true).help("The page to inspect"))
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
}

/// Arguments shared by every subcommand that runs a traversal.
fn traversal_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(false)
            .help("The URL to start from (may also come from the config file)"),
    )
    .arg(
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("JSON config file (default: ~/.config/surfer/config.json if present)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-d --"depth" <MAX_DEPTH>)
            .required(false)
            .help("Maximum number of hops from the start URL [default: 3]")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-t --"threads" <NUM_WORKERS>)
            .required(false)
            .help("The number of async workers in the worker pool [default: 10]")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-m --"mode" <MODE>)
            .required(false)
            .help("Link extraction: 'anchors' parses <a href>, 'pattern' scans for absolute URLs")
            .value_parser(["anchors", "pattern"])
            .default_value("anchors"),
    )
    .arg(
        arg!(--"max-links" <COUNT>)
            .required(false)
            .help("Maximum links taken from a single page, 0 for no limit")
            .value_parser(clap::value_parser!(usize))
            .default_value("50"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("10"),
    )
}
