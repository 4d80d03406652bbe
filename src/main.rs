//! resume-export – capture the résumé region of an HTML file and save it as a
//! single-page PDF.
//!
//! Exit codes: 0 when the PDF was saved, 1 on failure, 2 when the document
//! has no element with the region id (nothing is exported).

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use clap::Parser;

use resume_export::assets::LocalAssets;
use resume_export::controller::ConsoleNotifier;
use resume_export::delivery::DirectorySink;
use resume_export::fonts::{FontKey, FontManager};
use resume_export::{
    ExportConfig, ExportController, MarkupRegion, Packager, SourceRegion, TriggerControl,
    TriggerOutcome, Viewport,
};

#[derive(Parser)]
#[command(author, version, about = "Export a résumé region to a single-page PDF")]
struct Cli {
    /// HTML file containing the résumé.
    input: PathBuf,

    /// `id` of the element to capture.
    #[arg(long)]
    region: Option<String>,

    /// Directory to save the PDF into.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Regular-weight TTF/OTF used for measurement and glyphs.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Bold TTF/OTF.
    #[arg(long)]
    bold_font: Option<PathBuf>,

    /// Host viewport width; only used when no fixed logical width is set.
    #[arg(long, default_value_t = 1200.0)]
    viewport_width: f32,

    /// Device pixels per logical pixel.
    #[arg(long)]
    scale: Option<f32>,

    /// Origin the page is served from, e.g. `https://linson.dev`. Remote
    /// images elsewhere count as cross-origin.
    #[arg(long)]
    origin: Option<String>,

    /// Paint cross-origin images blank instead of fetching them.
    #[arg(long)]
    no_cross_origin_images: bool,

    /// Also write the region's display list as JSON.
    #[arg(long)]
    dump_layout: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            print_error_sources(err.as_ref());
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(region) = cli.region {
        config.region_id = region;
    }
    if let Some(dir) = cli.out_dir {
        config.out_dir = dir;
    }
    if let Some(scale) = cli.scale {
        config.capture.scale = scale;
    }
    if cli.no_cross_origin_images {
        config.capture.allow_cross_origin_images = false;
    }

    let html = std::fs::read_to_string(&cli.input)
        .map_err(|e| format!("reading '{}': {e}", cli.input.display()))?;

    let mut fonts = FontManager::new();
    for (key, path) in [
        (FontKey::REGULAR, &cli.font),
        (
            FontKey {
                bold: true,
                italic: false,
            },
            &cli.bold_font,
        ),
    ] {
        if let Some(path) = path {
            load_font(&mut fonts, key, path)?;
        }
    }

    if !fonts.has_real_fonts() {
        log::info!("no font loaded; text is drawn as greeked bars");
    }

    let base_dir = cli
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let region: Option<Arc<dyn SourceRegion>> =
        MarkupRegion::from_html(&html, &config.region_id, Arc::new(LocalAssets::new(base_dir)))
            .map(|r| {
                let r = r.with_fonts(fonts);
                let r = match cli.origin {
                    Some(origin) => r.with_origin(origin),
                    None => r,
                };
                Arc::new(r) as Arc<dyn SourceRegion>
            });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let viewport = Viewport::new(cli.viewport_width, 1.0);

    if let (Some(path), Some(region)) = (&cli.dump_layout, &region) {
        let width = config.capture.fixed_logical_width.unwrap_or(viewport.width);
        let list = runtime.block_on(region.render(width, &config.capture))?;
        std::fs::write(path, list.to_json()?)?;
        log::info!("wrote display list to {}", path.display());
    }

    let trigger = Rc::new(TriggerControl::new());
    let controller = ExportController::new(
        Rc::clone(&trigger),
        region,
        Packager::new(config.packaging.clone()),
        Box::new(DirectorySink::new(&config.out_dir)),
        Rc::new(ConsoleNotifier),
    )
    .with_viewport(viewport)
    .with_capture_options(config.capture.clone());

    let outcome = runtime.block_on(controller.trigger());
    Ok(match outcome {
        TriggerOutcome::Delivered(receipt) => {
            eprintln!("Wrote '{}' ({} bytes)", receipt.location, receipt.bytes);
            0
        }
        TriggerOutcome::NoRegion => {
            eprintln!("No element with id \"{}\"; nothing exported.", config.region_id);
            2
        }
        TriggerOutcome::AlreadyRunning | TriggerOutcome::Failed(_) => 1,
    })
}

fn load_font(fonts: &mut FontManager, key: FontKey, path: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("reading font '{}': {e}", path.display()))?;
    fonts
        .load_font(key, bytes)
        .map_err(|e| format!("parsing font '{}': {e}", path.display()))?;
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {source}");
        error = source;
    }
}
