//! Command-line interface and dispatch for catalog-compute.

mod common;
mod compute;

pub use common::{LogLevel, init_logging, validate_component_names};
pub use compute::{ComputeArgs, process_components};

use crate::Result;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "catalog-compute", version, author, long_about = None)]
#[command(about = "Evaluate quality metrics for catalog components and publish the scores")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: ComputeSubcommand,
}

#[derive(Subcommand, Debug)]
enum ComputeSubcommand {
    /// Compute metrics for one or more components and submit the values
    Compute(Box<ComputeArgs>),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        ComputeSubcommand::Compute(compute_args) => process_components(compute_args).await,
    }
}
