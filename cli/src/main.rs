#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{io::Write as _, time::Duration};

use clap::Parser;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] avalon_http::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(index = 1)]
    url: String,

    /// Overall transfer deadline in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let mut logger = pretty_env_logger::formatted_builder();
    logger.parse_default_env();
    match args.verbose {
        0 => {}
        1 => {
            logger.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            logger.filter_level(log::LevelFilter::Trace);
        }
    }
    logger.init();

    let mut builder = avalon_http::Client::builder();

    if let Some(timeout) = args.timeout {
        builder = builder.timeout(Duration::from_secs(timeout));
    }

    log::info!("fetching url={}", args.url);

    let body = builder.build().fetch(&args.url).await?;

    log::info!("fetched url={} len={}", args.url, body.len());

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;

    Ok(())
}
