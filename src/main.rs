//! CLI entry point for the exporter tool.

use anyhow::Result;

mod app;
mod cli;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    app::runtime::run_exporter().await
}
