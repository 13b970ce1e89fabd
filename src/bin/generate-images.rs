use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image_batch::{
    config,
    generator::{Quality, Size, Style, DEFAULT_MODEL},
    request, BatchFetcher, GenerationOptions, HttpTransfer, ItemOutcome, OpenAiGenerator,
    Progress, Step,
};

const RULE: &str = "=====================================";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory the images are written to.
    #[arg(long, env = "IMAGE_OUTPUT_DIR", default_value = "public/images")]
    output: PathBuf,

    /// JSON file with `[{"filename": ..., "prompt": ...}]` to use instead of the built-in list.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Only generate these filenames.
    #[arg(long = "only", value_name = "FILENAME")]
    only: Vec<String>,

    /// Print the requests and exit.
    #[arg(long)]
    list: bool,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, value_enum, default_value = "1024x1024")]
    size: Size,

    #[arg(long, value_enum, default_value = "standard")]
    quality: Quality,

    #[arg(long, value_enum)]
    style: Option<Style>,

    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let api_key = if args.list {
        None
    } else {
        match config::api_key() {
            Ok(key) => Some(key),
            Err(e) => {
                eprintln!("❌ Error: {}", e);
                std::process::exit(1);
            }
        }
    };

    let requests = match args.manifest {
        Some(ref path) => request::load_manifest(path)?,
        None => request::website_requests()?,
    };
    let requests = request::select(requests, &args.only)?;

    let Some(api_key) = api_key else {
        for request in &requests {
            println!("{}: {}", request.identifier(), request.prompt());
        }
        return Ok(());
    };

    let client = config::openai_client(&api_key, args.api_base.as_deref());
    let options = GenerationOptions {
        model: args.model,
        size: args.size,
        quality: args.quality,
        style: args.style,
    };
    let fetcher = BatchFetcher::new(
        OpenAiGenerator::new(client, options),
        HttpTransfer::new(Duration::from_secs(args.timeout))?,
        &args.output,
    );

    println!("🐝 Image Generation");
    println!("{RULE}");
    println!("📁 Images will be saved to: {}", display_dir(&args.output));
    println!("🖼️  Total images to generate: {}", requests.len());
    println!();

    let result = fetcher.run_with_progress(&requests, print_progress).await?;

    println!("{RULE}");
    println!("✅ Successfully generated: {}", result.succeeded);
    println!("❌ Failed: {}", result.failed);
    println!("📁 Images saved to: {}", display_dir(fetcher.output_dir()));

    if result.succeeded > 0 {
        println!();
        println!("🎉 Next steps:");
        println!("1. Review the generated images");
        println!("2. Run the website to see them in action");
    }

    Ok(())
}

fn print_progress(progress: Progress<'_>) {
    match progress {
        Progress::Generating {
            index,
            total,
            request,
        } => {
            println!("[{index}/{total}] 🎨 Generating {}...", request.identifier());
        }
        Progress::Finished {
            index,
            total,
            request,
            outcome,
        } => {
            let name = request.identifier();
            let line = match outcome {
                ItemOutcome::SkippedExisting => format!("⏭️  Skipping {name} (already exists)"),
                ItemOutcome::Created { .. } => format!("✅ Successfully generated {name}"),
                ItemOutcome::Failed {
                    step: Step::Download | Step::Save,
                    error,
                } => format!("❌ Failed to save {name}: {error:#}"),
                ItemOutcome::Failed { error, .. } => {
                    format!("❌ Error generating {name}: {error:#}")
                }
            };
            println!("[{index}/{total}] {line}");
            println!();
        }
    }
}

fn display_dir(path: &Path) -> String {
    if path.is_absolute() {
        return path.display().to_string();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}
