// ============================================================================
// EXPORT: forced-preview rasterization to PNG
// ============================================================================
//
// An export temporarily flips the scene into preview (no selection), waits
// for the presentation to settle, rasterizes at the pixel ratio and puts the
// flags back exactly as they were. The flags are restored on every path out,
// error paths included.

use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use thiserror::Error;

use crate::render;
use crate::scene::{ArtworkId, Scene};

/// Name proposed to the user for the exported file.
pub const EXPORT_FILE_NAME: &str = "tshirt-design.png";
/// Supersampling multiplier over the logical canvas size.
pub const DEFAULT_PIXEL_RATIO: f32 = 3.0;
/// Largest accepted multiplier (5760 x 6720 pixels).
pub const MAX_PIXEL_RATIO: f32 = 16.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("pixel ratio {0} gives an empty image")]
    EmptySurface(f32),
    #[error("pixel ratio {0} exceeds the maximum of {max}", max = MAX_PIXEL_RATIO)]
    RatioTooLarge(f32),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How long to let the forced preview settle before rasterizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settle {
    Immediate,
    /// Bounded wait, e.g. for a display surface to catch up.
    Delay(Duration),
}

/// Presentation flags captured before an export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentationSnapshot {
    pub previewing: bool,
    pub selected: bool,
    /// Artwork the selection belonged to.
    pub artwork: Option<ArtworkId>,
}

impl PresentationSnapshot {
    /// Capture the flags, then force preview with no selection.
    pub fn force_preview(scene: &mut Scene) -> Self {
        let state = scene.state();
        let snapshot = Self {
            previewing: state.previewing,
            selected: state.selected,
            artwork: scene.artwork().map(|a| a.id),
        };
        scene.set_preview(true);
        scene.set_selected(false);
        snapshot
    }

    /// Put the flags back. The selection only comes back if the artwork is
    /// still the one that was selected.
    pub fn restore(self, scene: &mut Scene) {
        scene.set_preview(self.previewing);
        let same_artwork = self.artwork.is_some() && scene.artwork().map(|a| a.id) == self.artwork;
        if self.selected && !same_artwork {
            tracing::debug!("artwork replaced during export, selection not restored");
        }
        scene.set_selected(self.selected && same_artwork);
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut Cursor::new(&mut buf)).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Accept ratios that give a non-empty image of bounded size.
pub fn check_pixel_ratio(pixel_ratio: f32) -> Result<f32, ExportError> {
    if pixel_ratio.is_nan() || pixel_ratio <= 0.0 {
        return Err(ExportError::EmptySurface(pixel_ratio));
    }
    if pixel_ratio > MAX_PIXEL_RATIO {
        return Err(ExportError::RatioTooLarge(pixel_ratio));
    }
    Ok(pixel_ratio)
}

fn rasterize_png(scene: &Scene, pixel_ratio: f32) -> Result<Vec<u8>, ExportError> {
    let pixel_ratio = check_pixel_ratio(pixel_ratio)?;
    let img = render::render(scene, pixel_ratio);
    tracing::debug!("export rasterized at {}x{}", img.width(), img.height());
    encode_png(&img)
}

/// Export the scene as PNG bytes at `pixel_ratio`, leaving the presentation
/// flags as they were found.
pub fn export_png_at(scene: &mut Scene, settle: Settle, pixel_ratio: f32) -> Result<Vec<u8>, ExportError> {
    tracing::info!("export started (ratio {pixel_ratio})");
    let snapshot = PresentationSnapshot::force_preview(scene);
    if let Settle::Delay(d) = settle {
        std::thread::sleep(d);
    }
    let result = rasterize_png(scene, pixel_ratio);
    snapshot.restore(scene);
    match &result {
        Ok(bytes) => tracing::info!("export finished, {} bytes", bytes.len()),
        Err(e) => tracing::error!("export failed: {e}"),
    }
    result
}

pub fn export_png(scene: &mut Scene, settle: Settle) -> Result<Vec<u8>, ExportError> {
    export_png_at(scene, settle, DEFAULT_PIXEL_RATIO)
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Export spread over UI frames: preview is forced when the session begins,
/// the host reports each frame it presents, and rasterization happens once a
/// forced-preview frame is on screen and the settle bound has passed.
pub struct ExportSession {
    snapshot: PresentationSnapshot,
    started: Instant,
    settle: Duration,
    pixel_ratio: f32,
    presented: u32,
}

impl ExportSession {
    pub fn begin(scene: &mut Scene, settle: Duration, pixel_ratio: f32) -> Self {
        tracing::info!("export session started");
        Self {
            snapshot: PresentationSnapshot::force_preview(scene),
            started: Instant::now(),
            settle,
            pixel_ratio,
            presented: 0,
        }
    }

    /// Called after a frame showing the forced preview was painted.
    pub fn frame_presented(&mut self) {
        self.presented += 1;
    }

    pub fn ready(&self) -> bool {
        self.presented > 0 && self.started.elapsed() >= self.settle
    }

    /// Time left before `ready` can turn true.
    pub fn remaining(&self) -> Duration {
        self.settle.saturating_sub(self.started.elapsed())
    }

    pub fn finish(self, scene: &mut Scene) -> Result<Vec<u8>, ExportError> {
        let result = rasterize_png(scene, self.pixel_ratio);
        self.snapshot.restore(scene);
        match &result {
            Ok(bytes) => tracing::info!("export finished, {} bytes", bytes.len()),
            Err(e) => tracing::error!("export failed: {e}"),
        }
        result
    }

    /// Give up without rasterizing.
    pub fn abort(self, scene: &mut Scene) {
        self.snapshot.restore(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garment::{Garment, GarmentKey};
    use crate::render::tests::purple_pixels;
    use egui::{pos2, vec2};
    use image::Rgba;
    use std::sync::Arc;

    fn scene(selected: bool, previewing: bool) -> Scene {
        let mut s = Scene::new(Garment::builtin(GarmentKey::Navy));
        s.set_artwork(Arc::new(RgbaImage::from_pixel(8, 8, Rgba([250, 220, 0, 255]))));
        s.set_selected(selected);
        s.set_preview(previewing);
        s
    }

    #[test]
    fn export_leaves_flags_untouched() {
        for (selected, previewing) in [(true, false), (false, false), (true, true), (false, true)] {
            let mut s = scene(selected, previewing);
            let before = s.state();
            let cb = s.control_box();
            export_png(&mut s, Settle::Immediate).unwrap();
            assert_eq!(s.state(), before);
            assert_eq!(s.control_box(), cb);
        }
    }

    #[test]
    fn export_is_three_times_canvas_without_chrome() {
        let mut s = scene(true, false);
        s.update_transform(Some(pos2(120.0, 150.0)), Some(vec2(60.0, 60.0)), Some(15.0));
        let bytes = export_png(&mut s, Settle::Delay(Duration::from_millis(1))).unwrap();

        let img = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(img.dimensions(), (1080, 1260));
        assert_eq!(purple_pixels(&img), 0);

        // Same pixels as the preview the user sees.
        s.set_preview(true);
        assert_eq!(img.as_raw(), render::render(&s, 3.0).as_raw());
    }

    #[test]
    fn invalid_ratio_still_restores_flags() {
        let mut s = scene(true, false);
        assert!(matches!(
            export_png_at(&mut s, Settle::Immediate, 0.0),
            Err(ExportError::EmptySurface(_))
        ));
        assert!(s.is_selected());
        assert!(!s.state().previewing);
    }

    #[test]
    fn oversized_ratio_is_refused_before_allocating() {
        let mut s = scene(true, false);
        for ratio in [1.0e5, f32::INFINITY, MAX_PIXEL_RATIO + 0.5] {
            assert!(matches!(
                export_png_at(&mut s, Settle::Immediate, ratio),
                Err(ExportError::RatioTooLarge(_))
            ));
        }
        assert!(s.is_selected());
        assert!(check_pixel_ratio(MAX_PIXEL_RATIO).is_ok());
        assert!(matches!(check_pixel_ratio(f32::NAN), Err(ExportError::EmptySurface(_))));
    }

    #[test]
    fn session_waits_for_a_presented_frame() {
        let mut s = scene(true, false);
        let mut session = ExportSession::begin(&mut s, Duration::ZERO, 1.0);
        assert!(s.state().previewing);
        assert!(!s.state().selected);
        assert!(!session.ready());

        session.frame_presented();
        assert!(session.ready());
        let bytes = session.finish(&mut s).unwrap();
        assert!(!bytes.is_empty());
        assert!(s.is_selected());
        assert!(!s.state().previewing);
    }

    #[test]
    fn artwork_replaced_mid_session_stays_unselected() {
        let mut s = scene(true, false);
        let mut session = ExportSession::begin(&mut s, Duration::ZERO, 1.0);
        let new_id = s.set_artwork(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]))));
        session.frame_presented();
        session.finish(&mut s).unwrap();

        assert_eq!(s.artwork().map(|a| a.id), Some(new_id));
        assert!(!s.state().selected);
        assert!(!s.state().previewing);
        assert!(s.control_box().is_none());
        assert!(!render::compose(&s).has_chrome());
    }

    #[test]
    fn artwork_deleted_mid_session_stays_unselected() {
        let mut s = scene(true, false);
        let session = ExportSession::begin(&mut s, Duration::from_secs(5), 1.0);
        s.delete_artwork();
        session.abort(&mut s);
        assert!(!s.state().selected);
    }

    #[test]
    fn aborted_session_restores_flags() {
        let mut s = scene(true, false);
        let session = ExportSession::begin(&mut s, Duration::from_secs(5), 3.0);
        assert!(!session.ready());
        session.abort(&mut s);
        assert!(s.is_selected());
    }
}
