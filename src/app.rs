use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use egui::{Color32, CursorIcon, Key, Rect, Sense, TextureHandle, TextureOptions, pos2, vec2};

use crate::assets::{AssetLoader, AssetSource};
use crate::cli::remover_for;
use crate::config::AppSettings;
use crate::export::{self, EXPORT_FILE_NAME, ExportSession};
use crate::garment::{Garment, GarmentKey, GarmentSource};
use crate::ingest::{IngestOutcome, IngestionPipeline, RawFile};
use crate::ops::transform::{Handle, PointerAction, Target, TransformController, hit_test, to_canvas};
use crate::render;
use crate::scene::{CANVAS_HEIGHT, CANVAS_WIDTH, Scene};

const BUSY_LABEL: &str = "Removing few pixels...";
const ACCENT: Color32 = Color32::from_rgb(168, 85, 247);

/// Async asset loads the editor waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AssetTag {
    Garment(GarmentKey),
}

pub struct TeeFEApp {
    settings: AppSettings,
    scene: Scene,
    pipeline: IngestionPipeline,
    controller: TransformController,
    loader: AssetLoader<AssetTag>,

    /// Rasterized canvas, tagged with (scene generation, pixels-per-point bits).
    texture: Option<TextureHandle>,
    texture_key: Option<(u64, u32)>,

    export: Option<ExportSession>,
    /// A frame with the forced preview has been painted since the export began.
    export_painted: bool,

    status: Option<String>,
}

impl TeeFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings, garment: Option<String>) -> Self {
        let key = GarmentKey::parse(garment.as_deref());
        let remover = remover_for(&settings, false);
        let mut loader = AssetLoader::new();

        // Built-in mockup right away; a configured bitmap replaces it once decoded.
        if let Some(dir) = &settings.garment_dir {
            loader.request(AssetTag::Garment(key), AssetSource::Path(dir.join(key.resource_name())));
        }
        tracing::info!("editor started with garment {key}");

        Self {
            scene: Scene::new(Garment::builtin(key)),
            pipeline: IngestionPipeline::new(remover),
            controller: TransformController::new(),
            loader,
            texture: None,
            texture_key: None,
            export: None,
            export_painted: false,
            status: None,
            settings,
        }
    }

    fn start_upload(&mut self, file: RawFile) {
        if self.export.is_some() {
            tracing::debug!("upload of {} ignored during export", file.name);
            return;
        }
        self.status = None;
        if let Err(e) = self.pipeline.begin(&mut self.scene, file) {
            self.status = Some(e.to_string());
        }
    }

    fn pick_upload(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &["png", "jpg", "jpeg", "webp", "bmp", "gif"])
            .pick_file()
        else {
            return;
        };
        match RawFile::read(&path) {
            Ok(file) => self.start_upload(file),
            Err(e) => self.status = Some(format!("Upload failed: {e}")),
        }
    }

    fn poll_background(&mut self, ctx: &egui::Context) {
        if let Some(result) = self.pipeline.poll(&mut self.scene) {
            self.controller.cancel(&mut self.scene);
            self.status = match result {
                Ok(report) => {
                    // Fallback uploads report the same status as cutouts.
                    if report.outcome != IngestOutcome::BackgroundRemoved {
                        tracing::debug!("{} shown without background removal", report.file_name);
                    }
                    Some(format!("{} added", report.file_name))
                }
                Err(e) => Some(format!("Upload failed: {e}")),
            };
        }
        if self.pipeline.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        for event in self.loader.poll() {
            let AssetTag::Garment(key) = event.tag;
            match event.result {
                Ok(bitmap) if key == self.scene.garment().key => {
                    let path = self
                        .settings
                        .garment_dir
                        .as_ref()
                        .map(|d| d.join(key.resource_name()))
                        .unwrap_or_default();
                    self.scene
                        .set_garment(Garment::from_bitmap(key, bitmap, GarmentSource::File(path)));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("garment {key}: {e}; keeping built-in mockup"),
            }
        }
        if self.loader.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if self.export.is_some() {
            return;
        }
        let (delete, escape, preview) = ctx.input(|i| {
            (
                i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace),
                i.key_pressed(Key::Escape),
                i.key_pressed(Key::P),
            )
        });
        if delete && self.scene.is_selected() {
            self.controller.cancel(&mut self.scene);
            self.scene.delete_artwork();
        }
        if escape {
            if self.controller.is_active() {
                self.controller.cancel(&mut self.scene);
            } else {
                self.scene.set_selected(false);
            }
        }
        if preview {
            self.toggle_preview();
        }
    }

    fn toggle_preview(&mut self) {
        let previewing = !self.scene.state().previewing;
        self.scene.set_preview(previewing);
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };
        if self.export.is_some() {
            self.status = Some("Wait for the export to finish".to_string());
            return;
        }
        let raw = match (file.bytes, file.path) {
            (Some(bytes), _) => Ok(RawFile::new(file.name, bytes)),
            (None, Some(path)) => RawFile::read(&path),
            (None, None) => return,
        };
        match raw {
            Ok(raw) => self.start_upload(raw),
            Err(e) => self.status = Some(format!("Upload failed: {e}")),
        }
    }

    // -----------------------------------------------------------------------
    //  Export (split over frames)
    // -----------------------------------------------------------------------

    fn begin_export(&mut self) {
        self.controller.cancel(&mut self.scene);
        self.export = Some(ExportSession::begin(
            &mut self.scene,
            Duration::from_millis(self.settings.export_settle_ms),
            self.settings.export_pixel_ratio,
        ));
        self.export_painted = false;
        self.status = Some("Exporting...".to_string());
    }

    fn advance_export(&mut self, ctx: &egui::Context) {
        let Some(session) = self.export.as_mut() else {
            return;
        };
        if self.export_painted {
            session.frame_presented();
        }
        if !session.ready() {
            ctx.request_repaint_after(session.remaining().max(Duration::from_millis(16)));
            return;
        }
        let Some(session) = self.export.take() else {
            return;
        };
        self.status = match session.finish(&mut self.scene) {
            Ok(bytes) => self.save_export(&bytes),
            Err(e) => Some(format!("Export failed: {e}")),
        };
    }

    fn save_export(&self, bytes: &[u8]) -> Option<String> {
        let path: PathBuf = rfd::FileDialog::new()
            .set_file_name(EXPORT_FILE_NAME)
            .add_filter("PNG", &["png"])
            .save_file()?;
        match export::write_file(&path, bytes) {
            Ok(()) => Some(format!("Saved {}", path.display())),
            Err(e) => Some(format!("Export failed: {e}")),
        }
    }

    // -----------------------------------------------------------------------
    //  Canvas
    // -----------------------------------------------------------------------

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let ppp = ctx.pixels_per_point();
        let key = (self.scene.generation(), ppp.to_bits());
        if self.texture.is_some() && self.texture_key == Some(key) {
            return;
        }
        let img = render::render(&self.scene, ppp);
        let color = egui::ColorImage::from_rgba_unmultiplied(
            [img.width() as usize, img.height() as usize],
            img.as_raw(),
        );
        match self.texture.as_mut() {
            Some(tex) => tex.set(color, TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("teefe-canvas", color, TextureOptions::LINEAR)),
        }
        self.texture_key = Some(key);
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        self.refresh_texture(ui.ctx());
        let (response, painter) =
            ui.allocate_painter(vec2(CANVAS_WIDTH, CANVAS_HEIGHT), Sense::click_and_drag());
        let rect = response.rect;
        if let Some(tex) = &self.texture {
            painter.image(
                tex.id(),
                rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        if self.export.is_some() {
            self.export_painted = true;
            return;
        }

        let (pointer, pressed, down, released) = ui.input(|i| {
            (
                i.pointer.interact_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
            )
        });
        if let Some(p) = pointer {
            let cp = to_canvas(p, rect.min, 1.0);
            if pressed && response.hovered() {
                let action = self.controller.pointer_down(&mut self.scene, cp);
                if action == PointerAction::Deleted {
                    self.status = None;
                }
            } else if down && self.controller.is_active() {
                self.controller.pointer_move(&mut self.scene, cp);
            }
            if response.hovered() && !self.scene.state().previewing {
                ui.ctx().set_cursor_icon(cursor_for(hit_test(&self.scene, cp)));
            }
        }
        if released {
            self.controller.pointer_up(&mut self.scene);
        }
    }
}

fn cursor_for(target: Target) -> CursorIcon {
    match target {
        Target::DeleteGlyph => CursorIcon::PointingHand,
        Target::Body => CursorIcon::Move,
        Target::Canvas => CursorIcon::Default,
        Target::Handle(h) => match h {
            Handle::TopLeft | Handle::BottomRight => CursorIcon::ResizeNwSe,
            Handle::TopRight | Handle::BottomLeft => CursorIcon::ResizeNeSw,
            Handle::Left | Handle::Right => CursorIcon::ResizeHorizontal,
            Handle::Top | Handle::Bottom => CursorIcon::ResizeVertical,
            Handle::Rotate => CursorIcon::Grab,
        },
    }
}

impl eframe::App for TeeFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.advance_export(ctx);
        self.poll_background(ctx);
        self.handle_keys(ctx);
        self.handle_dropped_files(ctx);

        let state = self.scene.state();
        let exporting = self.export.is_some();

        egui::SidePanel::left("tools").resizable(false).show(ctx, |ui| {
            ui.add_space(8.0);
            ui.heading("TeeFE");
            ui.label(format!("Garment: {}", self.scene.garment().key));
            ui.separator();
            let upload = ui.add_enabled(!state.uploading && !exporting, egui::Button::new("Upload"));
            if upload.clicked() {
                self.pick_upload();
            }
            if state.uploading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(BUSY_LABEL);
                });
            }
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.as_deref().unwrap_or(""));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                egui::Frame::none()
                    .fill(Color32::WHITE)
                    .rounding(12.0)
                    .inner_margin(16.0)
                    .show(ui, |ui| self.canvas_ui(ui));

                ui.vertical(|ui| {
                    let previewing = self.scene.state().previewing;
                    let label = if previewing { "Exit Preview" } else { "Preview" };
                    let button = egui::Button::new(label).min_size(vec2(48.0, 48.0));
                    let button = if previewing { button.fill(ACCENT) } else { button };
                    if ui.add_enabled(!exporting, button).clicked() {
                        self.toggle_preview();
                    }
                    ui.add_space(8.0);
                    let download = egui::Button::new("Download").min_size(vec2(48.0, 48.0));
                    if ui.add_enabled(!exporting, download).clicked() {
                        self.begin_export();
                        ctx.request_repaint();
                    }
                });
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_map_to_resize_cursors() {
        assert_eq!(cursor_for(Target::Handle(Handle::TopLeft)), CursorIcon::ResizeNwSe);
        assert_eq!(cursor_for(Target::Handle(Handle::Top)), CursorIcon::ResizeVertical);
        assert_eq!(cursor_for(Target::Body), CursorIcon::Move);
    }

    #[test]
    fn garment_tag_carries_key() {
        let tag = AssetTag::Garment(GarmentKey::Navy);
        assert_eq!(tag, AssetTag::Garment(GarmentKey::parse(Some("NAVY"))));
    }
}
