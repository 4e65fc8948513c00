//! otlp-bridge CLI entry point.

use otlp_bridge::cli::{self, Cli};
use otlp_bridge::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
