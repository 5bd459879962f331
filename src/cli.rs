// ============================================================================
// TeeFE CLI: headless compose-and-export
// ============================================================================
//
// Usage examples:
//   TeeFE --output design.png --garment navy --artwork logo.png
//   TeeFE -o out.png --artwork photo.jpg --no-remove-bg --x 120 --y 150 --rotation 15
//   TeeFE --garment maroon                        (no --output: opens the editor)
//
// Runs the same ingestion, scene and export code as the editor, synchronously
// on the current thread.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use egui::{pos2, vec2};
use thiserror::Error;

use crate::assets::AssetError;
use crate::config::AppSettings;
use crate::export::{self, ExportError, Settle};
use crate::garment::{Garment, GarmentKey};
use crate::ingest::{IngestError, IngestOutcome, IngestionPipeline, RawFile};
use crate::ops::remove_bg::{BackgroundRemover, Disabled, RemoveBgClient};
use crate::scene::Scene;

/// TeeFE garment mockup editor.
///
/// Without --output the editor window opens; with it, the design is composed
/// and exported without a GUI.
#[derive(Parser, Debug, Default)]
#[command(
    name = "TeeFE",
    about = "Place artwork on a garment mockup and export it as PNG",
    long_about = "Place artwork on a garment mockup and export it as PNG.\n\n\
                  Example:\n  \
                  TeeFE --output design.png --garment navy --artwork logo.png\n  \
                  TeeFE -o out.png --artwork photo.jpg --x 120 --y 150 --rotation 15"
)]
pub struct CliArgs {
    /// Write the exported PNG here (headless mode).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Garment: black, navy, maroon, darkgrey or white. Anything else means white.
    #[arg(short, long, value_name = "KEY")]
    pub garment: Option<String>,

    /// Artwork image to place on the garment.
    #[arg(short, long, value_name = "IMAGE")]
    pub artwork: Option<PathBuf>,

    /// Skip the background-removal service.
    #[arg(long)]
    pub no_remove_bg: bool,

    /// Artwork top-left x in canvas units.
    #[arg(long, allow_negative_numbers = true)]
    pub x: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<f32>,
    #[arg(long)]
    pub width: Option<f32>,
    #[arg(long)]
    pub height: Option<f32>,
    /// Rotation in degrees, clockwise, about the artwork's top-left.
    #[arg(long, allow_negative_numbers = true)]
    pub rotation: Option<f32>,

    /// Export resolution multiplier (default from settings, normally 3).
    #[arg(long, value_name = "RATIO")]
    pub pixel_ratio: Option<f32>,

    /// Debug logging on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn is_headless(&self) -> bool {
        self.output.is_some()
    }

    fn has_transform_override(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.rotation.is_some()
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Pick the background remover for this run.
pub fn remover_for(settings: &AppSettings, disabled: bool) -> Arc<dyn BackgroundRemover> {
    if disabled || !settings.remove_bg_enabled {
        Arc::new(Disabled)
    } else {
        Arc::new(RemoveBgClient::from_settings(settings))
    }
}

/// Build the scene the arguments describe and export it. Returns the PNG bytes.
pub fn compose(
    args: &CliArgs,
    settings: &AppSettings,
    remover: Arc<dyn BackgroundRemover>,
) -> Result<Vec<u8>, CliError> {
    let key = GarmentKey::parse(args.garment.as_deref());
    let garment = Garment::resolve(key, settings.garment_dir.as_deref());
    let mut scene = Scene::new(garment);

    if let Some(path) = &args.artwork {
        let file = RawFile::read(path)?;
        let mut pipeline = IngestionPipeline::new(remover);
        let report = pipeline.ingest_blocking(&mut scene, file)?;
        match &report.outcome {
            IngestOutcome::BackgroundRemoved => tracing::info!("background removed from {}", report.file_name),
            IngestOutcome::Original { reason } => {
                tracing::info!("using {} as-is: {reason}", report.file_name)
            }
        }
    }

    if args.has_transform_override() {
        match scene.artwork().map(|a| a.transform) {
            Some(t) => {
                let position = pos2(args.x.unwrap_or(t.position.x), args.y.unwrap_or(t.position.y));
                let size = vec2(args.width.unwrap_or(t.size.x), args.height.unwrap_or(t.size.y));
                scene.update_transform(Some(position), Some(size), args.rotation);
            }
            None => tracing::warn!("transform options given without --artwork; ignored"),
        }
    }

    let ratio = args.pixel_ratio.unwrap_or(settings.export_pixel_ratio);
    Ok(export::export_png_at(&mut scene, Settle::Immediate, ratio)?)
}

/// Run headless mode and return an OS exit code.
/// `0` = PNG written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    let Some(output) = args.output.clone() else {
        eprintln!("error: --output is required in headless mode.");
        return ExitCode::FAILURE;
    };
    let settings = AppSettings::load();
    let remover = remover_for(&settings, args.no_remove_bg);

    let start = Instant::now();
    let result = compose(&args, &settings, remover).and_then(|bytes| {
        export::write_file(&output, &bytes)?;
        Ok(bytes.len())
    });

    match result {
        Ok(len) => {
            if args.verbose {
                eprintln!(
                    "wrote {} ({} bytes) in {:.0} ms",
                    output.display(),
                    len,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::remove_bg::RemoveBgError;

    #[test]
    fn output_flag_selects_headless_mode() {
        let args = CliArgs::parse_from(["TeeFE", "-o", "out.png", "--garment", "navy"]);
        assert!(args.is_headless());
        assert_eq!(args.garment.as_deref(), Some("navy"));

        let gui = CliArgs::parse_from(["TeeFE", "--garment", "navy"]);
        assert!(!gui.is_headless());
    }

    #[test]
    fn transform_overrides_parse_negative_values() {
        let args = CliArgs::parse_from(["TeeFE", "-o", "o.png", "--x", "-12.5", "--rotation", "-30"]);
        assert_eq!(args.x, Some(-12.5));
        assert_eq!(args.rotation, Some(-30.0));
        assert!(args.has_transform_override());
    }

    #[test]
    fn garment_only_export_has_canvas_size() {
        let args = CliArgs {
            output: Some(PathBuf::from("unused.png")),
            garment: Some("purple".into()),
            pixel_ratio: Some(1.0),
            ..Default::default()
        };
        let bytes = compose(&args, &AppSettings::default(), Arc::new(Disabled)).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (360, 420));
    }

    #[test]
    fn huge_pixel_ratio_fails_cleanly() {
        let args = CliArgs {
            output: Some(PathBuf::from("unused.png")),
            pixel_ratio: Some(100_000.0),
            ..Default::default()
        };
        assert!(matches!(
            compose(&args, &AppSettings::default(), Arc::new(Disabled)),
            Err(CliError::Export(ExportError::RatioTooLarge(_)))
        ));
    }

    #[test]
    fn missing_artwork_file_is_an_error() {
        let args = CliArgs {
            output: Some(PathBuf::from("unused.png")),
            artwork: Some(PathBuf::from("/no/such/artwork.png")),
            ..Default::default()
        };
        assert!(matches!(
            compose(&args, &AppSettings::default(), Arc::new(Disabled)),
            Err(CliError::Asset(_))
        ));
    }

    #[test]
    fn disabled_settings_pick_the_disabled_remover() {
        let settings = AppSettings {
            remove_bg_enabled: false,
            ..Default::default()
        };
        let remover = remover_for(&settings, false);
        assert!(matches!(
            remover.remove_background(b"x"),
            Err(RemoveBgError::Disabled)
        ));
    }
}
