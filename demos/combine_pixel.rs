//! Combine one HEALPix pixel from an exposure listing.
//!
//! ```text
//! cargo run --release --example combine_pixel -- <pix> <listing.csv> <outdir> [--redo] [--nside N]
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).
use std::env;
use std::error::Error;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skycombine::params::CombineParams;
use skycombine::reddening::NoReddening;
use skycombine::{combine_pixel, CombineError};

struct Args {
    pix: u64,
    listing: Utf8PathBuf,
    outdir: Utf8PathBuf,
    redo: bool,
    nside: u64,
}

fn usage() -> String {
    "usage: combine_pixel <pix> <listing.csv> <outdir> [--redo] [--nside N]".to_string()
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut positional = Vec::new();
    let mut redo = false;
    let mut nside = CombineParams::default().nside;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--redo" => redo = true,
            "--nside" => nside = it.next().ok_or_else(usage)?.parse()?,
            _ => positional.push(arg),
        }
    }
    let [pix, listing, outdir] = <[String; 3]>::try_from(positional).map_err(|_| usage())?;

    Ok(Args {
        pix: pix.parse()?,
        listing: listing.into(),
        outdir: outdir.into(),
        redo,
        nside,
    })
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let params = CombineParams::builder()
        .nside(args.nside)
        .redo(args.redo)
        .build()?;

    match combine_pixel(args.pix, &args.listing, &args.outdir, &params, &NoReddening) {
        Ok(Some(catalog)) => {
            info!(
                pix = args.pix,
                nobjects = catalog.objects.len(),
                nexposures = catalog.summary.len(),
                "done"
            );
            for row in &catalog.summary {
                info!("{row}");
            }
        }
        Ok(None) => info!(pix = args.pix, "already combined"),
        Err(CombineError::EmptyResult(reason)) => info!(pix = args.pix, %reason, "nothing to write"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
