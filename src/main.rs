//! `kan-annotate`: flatten annotation JSON onto a screenshot

use std::path::PathBuf;

use ab_glyph::FontArc;
use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;

use kan_feedback::capture::optimize::optimize_blob_to_jpeg;
use kan_feedback::capture::Blob;
use kan_feedback::{Annotation, AnnotationCanvas, CanvasState, HeadlessPage, Viewport};

#[derive(Parser)]
#[command(name = "kan-annotate", version, about)]
struct Args {
    /// Screenshot to draw on (PNG or JPEG)
    screenshot: PathBuf,

    /// Annotations as a JSON list or a saved `{annotations, pins}` state
    annotations: PathBuf,

    #[arg(short, long, default_value = "annotated.png")]
    output: PathBuf,

    /// Viewport width the annotations were drawn in; defaults to the
    /// screenshot width divided by the pixel ratio
    #[arg(long)]
    viewport_width: Option<f32>,

    #[arg(long)]
    viewport_height: Option<f32>,

    #[arg(long, default_value_t = 1.0)]
    dpr: f32,

    /// TrueType/OpenType font for text callouts and pin numbers
    #[arg(long)]
    font: Option<PathBuf>,

    /// Write the optimized upload JPEG instead of the full-size PNG
    #[arg(long)]
    jpeg: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationInput {
    List(Vec<Annotation>),
    State(CanvasState),
}

impl AnnotationInput {
    fn into_state(self) -> CanvasState {
        match self {
            AnnotationInput::List(annotations) => CanvasState {
                annotations,
                pins: Vec::new(),
            },
            AnnotationInput::State(state) => state,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.dpr <= 0.0 {
        bail!("--dpr must be positive, got {}", args.dpr);
    }

    let screenshot = image::open(&args.screenshot)
        .with_context(|| format!("cannot read {}", args.screenshot.display()))?
        .to_rgba8();

    let json = std::fs::read_to_string(&args.annotations)
        .with_context(|| format!("cannot read {}", args.annotations.display()))?;
    let state = serde_json::from_str::<AnnotationInput>(&json)
        .with_context(|| format!("invalid annotations in {}", args.annotations.display()))?
        .into_state();

    let viewport = Viewport::new(
        args.viewport_width
            .unwrap_or(screenshot.width() as f32 / args.dpr),
        args.viewport_height
            .unwrap_or(screenshot.height() as f32 / args.dpr),
        args.dpr,
    );
    let mut canvas = AnnotationCanvas::new(Box::new(HeadlessPage::new(viewport)))?;
    if let Some(path) = &args.font {
        let bytes =
            std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("{} is not a usable font", path.display()))?;
        canvas.set_font(Some(font));
    }
    canvas.restore_state(&state);
    log::debug!(
        "Flattening {} annotations onto {}x{}",
        state.annotations.len(),
        screenshot.width(),
        screenshot.height()
    );

    let Some(png) = canvas.flatten(&screenshot) else {
        bail!("cannot create a composite surface");
    };
    let output = if args.jpeg {
        optimize_blob_to_jpeg(&Blob::new(png, "image/png")).data
    } else {
        png
    };
    std::fs::write(&args.output, &output)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    println!("Saved to: {}", args.output.display());
    Ok(())
}
