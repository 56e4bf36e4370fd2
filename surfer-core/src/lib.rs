pub mod report;
pub mod surf;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
  ___ _  _ _ __ / _| ___ _ __
 / __| | | | '__| |_ / _ \ '__|
 \__ \ |_| | |  |  _|  __/ |
 |___/\__,_|_|  |_|  \___|_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} v{}\n",
        "breadth-first link graph explorer".dimmed(),
        env!("CARGO_PKG_VERSION")
    );
}
