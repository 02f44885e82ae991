use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use svgshot::dom::Document;
use svgshot::{ImageFormat, MarkupRenderer, OutputKind, Pipeline, RenderArtifact, RenderOptions};

/// Rasterize an SVG file, with its stylesheets applied, to PNG, JPEG or WebP.
#[derive(Parser, Debug)]
#[command(name = "svgshot", version, about)]
struct Args {
    /// SVG markup to capture
    input: PathBuf,

    /// Output format: png, jpeg or webp
    #[arg(long)]
    format: Option<ImageFormat>,

    /// data-url prints to stdout, blob writes bytes to --out
    #[arg(long)]
    output: Option<OutputKind>,

    /// Pixel density multiplier
    #[arg(long)]
    scale: Option<f32>,

    /// Lossy encoder quality in [0, 1]
    #[arg(long)]
    quality: Option<f32>,

    /// Leave out elements matching this selector (repeatable)
    #[arg(long = "ignore", value_name = "SELECTOR")]
    ignore: Vec<String>,

    /// Host stylesheet applied to the document (repeatable)
    #[arg(long, value_name = "FILE")]
    stylesheet: Vec<PathBuf>,

    /// JSON file with render options; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Destination file; defaults to `<input>.<ext>` for blobs
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,

    /// Do not load system fonts
    #[arg(long)]
    no_system_fonts: bool,
}

impl Args {
    fn options(&self) -> anyhow::Result<RenderOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => RenderOptions::default(),
        };
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(output) = self.output {
            options.output = output;
        }
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        options.ignore_all_selectors.extend(self.ignore.iter().cloned());
        options.validate()?;
        Ok(options)
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = args.options()?;
    let markup = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let mut document = Document::new();
    for path in &args.stylesheet {
        let css = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        document.add_stylesheet(&css);
    }

    let config = svgshot::RasterConfig {
        load_system_fonts: !args.no_system_fonts && cfg!(feature = "system-fonts"),
        ..Default::default()
    };
    let pipeline = Pipeline::with_config(MarkupRenderer, document.into_shared(), &config);
    let artifact = pipeline.render_vector_as_image(markup.as_str(), &options).await?;

    match artifact {
        RenderArtifact::DataUrl(url) => match &args.out {
            Some(path) => std::fs::write(path, url)
                .with_context(|| format!("writing {}", path.display()))?,
            None => println!("{}", url),
        },
        RenderArtifact::Blob(blob) => {
            let path = args
                .out
                .clone()
                .unwrap_or_else(|| args.input.with_extension(blob.format.extension()));
            std::fs::write(&path, &blob.bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("Wrote {} bytes to {}", blob.bytes.len(), path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("svgshot: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
