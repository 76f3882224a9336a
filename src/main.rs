//! # fishlog CLI
//!
//! Command-line interface for the catch log.
//!
//! ## Usage
//! ```bash
//! fishlog ingest catch.jpg --location "Lake Minnetonka"
//! fishlog scan ~/Pictures --import --verbose
//! ```

mod cli;

use fishlog::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fishlog::init_tracing();
    cli::run().await
}
