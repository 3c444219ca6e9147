use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use pix_ledger::{bin_utils::Service, config::AppConfig, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let filename = args
        .next()
        .context("Expected an operations file name as the first argument")?;
    let config = match args.next() {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::default(),
    };
    init_logging(&config);

    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config: config.ledger,
        error_printer: Box::new(|line, err| match err {
            pix_ledger::bin_utils::ScriptError::Process(err) => {
                eprintln!("Line {line}: {} ({err})", err.reason())
            }
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run().await
}
