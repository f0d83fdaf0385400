use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;
use miette::{bail, Context, IntoDiagnostic, Result};
use tracing::{info, warn, Level};

use sigclip::audit::AuditLog;
use sigclip::cli::{Args, Command, CutArgs, RunArgs, TimeoutArgs};
use sigclip::fetcher::{normalize_url, Fetcher};
use sigclip::manifest::Manifest;
use sigclip::outside::{Ffmpeg, Ffprobe, Ytdl};
use sigclip::processor::RowProcessor;
use sigclip::trimmer::Trimmer;
use sigclip::{cutter, logging, runner};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    })?;

    match args.command {
        Command::Run(args) => run_manifest(args),
        Command::Cut(args) => cut_segments(args),
    }
}

/// Process every row of the manifest, appending one audit record per row.
fn run_manifest(args: RunArgs) -> Result<()> {
    std::fs::create_dir_all(&args.out)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;

    let tools = load_external_components(&args.timeouts)?;

    let mut manifest = Manifest::load(&args.manifest)?;
    info!("Loaded manifest with {} rows", manifest.rows.len());
    if let Some(n) = args.sample {
        manifest.sample(n);
        info!("Processing a random sample of {} rows", manifest.rows.len());
    }

    let mut audit = AuditLog::open(&args.log)?;

    let fetcher = Fetcher::new(
        &tools.downloader,
        Duration::from_secs(args.timeouts.http_timeout),
    );
    let trimmer = Trimmer::new(&tools.inspector, &tools.transcoder);
    let processor = RowProcessor::new(&args.out, &fetcher, &trimmer);

    let cancel = AtomicBool::new(false);
    let summary = runner::run(&manifest.rows, &processor, &mut audit, args.jobs, &cancel)?;

    if summary.failed > 0 {
        warn!(
            "{} rows failed; rerunning the same manifest retries only those",
            summary.failed
        );
    }
    info!("All tasks completed, see {} for details", args.log.display());
    Ok(())
}

/// Download one source and cut the requested segments out of it.
fn cut_segments(args: CutArgs) -> Result<()> {
    std::fs::create_dir_all(&args.out)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;

    let tools = load_external_components(&args.timeouts)?;
    let fetcher = Fetcher::new(
        &tools.downloader,
        Duration::from_secs(args.timeouts.http_timeout),
    );
    let trimmer = Trimmer::new(&tools.inspector, &tools.transcoder);

    let Some(url) = normalize_url(&args.url) else {
        bail!("Empty source URL");
    };

    let produced = cutter::cut_segments(
        &fetcher,
        &trimmer,
        &url,
        &args.out,
        &args.stem,
        &args.segments,
    )
    .into_diagnostic()
    .wrap_err("Could not download the source video")?;

    info!("Produced {produced} of {} segments", args.segments.len());
    Ok(())
}

struct ExternalTools {
    downloader: Ytdl,
    inspector: Ffprobe,
    transcoder: Ffmpeg,
}

/// Construct the tool handles concurrently, as each `new` probes an
/// external binary.
fn load_external_components(timeouts: &TimeoutArgs) -> Result<ExternalTools> {
    let tool_timeout = Duration::from_secs(timeouts.tool_timeout);

    std::thread::scope(|scope| {
        let ytdl = scope.spawn(|| Ytdl::new(tool_timeout));
        let ffprobe = scope.spawn(|| Ffprobe::new(tool_timeout));
        let ffmpeg = scope.spawn(|| Ffmpeg::new(tool_timeout));

        Ok(ExternalTools {
            downloader: ytdl
                .join()
                .expect("could not join thread")
                .into_diagnostic()?,
            inspector: ffprobe
                .join()
                .expect("could not join thread")
                .into_diagnostic()?,
            transcoder: ffmpeg
                .join()
                .expect("could not join thread")
                .into_diagnostic()?,
        })
    })
}
