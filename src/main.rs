//! PDF Shrinker CLI
//!
//! Command-line interface for re-encoding the images in a PDF.

use anyhow::Context;
use clap::{ArgAction, Parser};
use shrink_pdf::prompt::Prompter;
use shrink_pdf::{file_ops::shrink_pdf_file, quality_from_percent, Mode, ShrinkOptions};
use std::io;
use std::path::PathBuf;

/// Shrink a PDF by re-encoding its images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_help_flag = true)]
struct Args {
    /// Input PDF file path (prompted for when missing)
    input: Option<PathBuf>,

    /// Output PDF file path (prompted for when missing)
    output: Option<PathBuf>,

    /// Quality from 0 (smallest) to 100 (best)
    #[arg(short, value_name = "QUALITY", allow_negative_numbers = true)]
    q: Option<f32>,

    /// Store images losslessly instead of as JPEG
    #[arg(short = 't', long = "tiff")]
    lossless: bool,

    /// Never prompt; fail when a path is missing
    #[arg(short = 'h', long)]
    headless: bool,

    /// Verbose output (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_target(false)
        .format_timestamp(None)
        .target(env_logger::Target::Stdout)
        .init();

    let mut quality = args.q.map(quality_from_percent);

    let (input, output) = match (args.input, args.output) {
        (Some(input), Some(output)) => (input, output),
        (input, _) if args.headless => {
            if input.is_none() {
                anyhow::bail!("No input file given (required with --headless)");
            }
            anyhow::bail!("No output file given (required with --headless)");
        }
        (Some(input), None) => {
            let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
            let output = prompter.output_path()?;
            (input, output)
        }
        (None, _) => {
            let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
            let input = prompter.input_path()?;
            if quality.is_none() {
                quality = Some(prompter.quality()?);
            }
            let output = prompter.output_path()?;
            (input, output)
        }
    };

    let options = ShrinkOptions {
        quality: quality.unwrap_or(shrink_pdf::DEFAULT_QUALITY),
        mode: if args.lossless {
            Mode::Lossless
        } else {
            Mode::Lossy
        },
        ..Default::default()
    };

    log::debug!(
        "Shrinking {} with quality {} ({:?})",
        input.display(),
        options.quality,
        options.mode
    );

    let report = shrink_pdf_file(&input, &output, &options)
        .with_context(|| format!("Failed to shrink {}", input.display()))?;

    println!(
        "\nDone! Re-encoded {} images on {} pages",
        report.images, report.pages
    );
    println!("Output saved to: {:?}", output);

    Ok(())
}
