//! Print the OpenAPI document as JSON.

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use profile_service::doc::ApiDoc;
use utoipa::OpenApi;

/// Dump the profile service OpenAPI document to stdout.
#[derive(Debug, Parser)]
#[command(name = "openapi-dump")]
struct Args {
    /// Emit indented JSON.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let doc = ApiDoc::openapi();
    let json = if args.pretty {
        doc.to_pretty_json()
    } else {
        doc.to_json()
    }
    .context("failed to serialise OpenAPI document")?;
    println!("{json}");
    Ok(())
}
