// Entrypoint for the CLI application.
// - Keeps `main` small: load settings, build a Graph client and hand it to
//   the upload flow.
// - Configuration problems escape as errors (non-zero exit); everything the
//   flow reports itself exits cleanly.

use anyhow::Context;
use clap::Parser;
use graph_upload::{app, auth::ClientSecretCredential, config::Settings, graph::GraphClient};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Upload one file to the default document library of a SharePoint site.
#[derive(Parser, Debug)]
#[command(name = "graph-upload", version)]
struct Cli {
    /// File to upload (defaults to `sample.txt`).
    path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let settings = Settings::load().context("Failed to load Graph settings")?;

    let credential = ClientSecretCredential::new(
        &settings.tenant_id,
        &settings.client_id,
        &settings.client_secret,
    );
    let mut graph = GraphClient::new(credential).context("Failed to build HTTP client")?;

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();
    app::run(&mut graph, &settings, cli.path.as_deref(), &mut out, color)?;
    out.flush()?;
    Ok(())
}
