// ============================================================================
// IMAGE INGESTION: upload → background removal → fallback → scene handoff
// ============================================================================
//
// Only one ingestion can be in flight; the `uploading` flag on the scene is the
// gate. The remote call and the decode run on a worker thread. Whatever the
// worker reports (or fails to report) the flag is cleared again in `finish`.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use thiserror::Error;

use crate::assets::{self, AssetError, Bitmap};
use crate::ops::remove_bg::BackgroundRemover;
use crate::scene::{ArtworkId, Scene};

/// One picked file, as raw bytes.
#[derive(Clone, Debug)]
pub struct RawFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("an upload is already in progress")]
    Busy,
    #[error("could not read the image: {0}")]
    Decode(#[source] AssetError),
    #[error("ingestion worker stopped without a result")]
    WorkerLost,
}

/// Which bitmap ended up on the garment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    BackgroundRemoved,
    /// The remote step failed; the file was decoded as-is.
    Original { reason: String },
}

#[derive(Clone, Debug)]
pub struct IngestReport {
    pub file_name: String,
    pub artwork: ArtworkId,
    pub outcome: IngestOutcome,
}

struct Processed {
    bitmap: Bitmap,
    outcome: IngestOutcome,
}

struct Job {
    file_name: String,
    receiver: Receiver<Result<Processed, AssetError>>,
}

pub struct IngestionPipeline {
    remover: Arc<dyn BackgroundRemover>,
    job: Option<Job>,
}

impl IngestionPipeline {
    pub fn new(remover: Arc<dyn BackgroundRemover>) -> Self {
        Self { remover, job: None }
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    /// Start ingesting `file`. Refused while another ingestion is in flight.
    pub fn begin(&mut self, scene: &mut Scene, file: RawFile) -> Result<(), IngestError> {
        if self.job.is_some() || scene.state().uploading {
            tracing::debug!("upload of {} refused: busy", file.name);
            return Err(IngestError::Busy);
        }
        scene.set_uploading(true);
        tracing::info!("ingesting {} ({} bytes)", file.name, file.bytes.len());

        let (tx, rx) = mpsc::channel();
        let remover = Arc::clone(&self.remover);
        let bytes = Arc::clone(&file.bytes);
        std::thread::spawn(move || {
            let _ = tx.send(process(remover.as_ref(), &bytes));
        });

        self.job = Some(Job {
            file_name: file.name,
            receiver: rx,
        });
        Ok(())
    }

    /// Non-blocking completion check, called once per frame.
    pub fn poll(&mut self, scene: &mut Scene) -> Option<Result<IngestReport, IngestError>> {
        let job = self.job.as_ref()?;
        let result = match job.receiver.try_recv() {
            Ok(result) => result.map_err(IngestError::Decode),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(IngestError::WorkerLost),
        };
        Some(self.finish(scene, result))
    }

    /// Block until the in-flight ingestion completes.
    pub fn wait(&mut self, scene: &mut Scene) -> Option<Result<IngestReport, IngestError>> {
        let job = self.job.as_ref()?;
        let result = match job.receiver.recv() {
            Ok(result) => result.map_err(IngestError::Decode),
            Err(_) => Err(IngestError::WorkerLost),
        };
        Some(self.finish(scene, result))
    }

    /// `begin` + `wait` in one call.
    pub fn ingest_blocking(&mut self, scene: &mut Scene, file: RawFile) -> Result<IngestReport, IngestError> {
        self.begin(scene, file)?;
        self.wait(scene).unwrap_or(Err(IngestError::WorkerLost))
    }

    fn finish(
        &mut self,
        scene: &mut Scene,
        result: Result<Processed, IngestError>,
    ) -> Result<IngestReport, IngestError> {
        let file_name = self.job.take().map(|j| j.file_name).unwrap_or_default();
        scene.set_uploading(false);
        match result {
            Ok(processed) => {
                let artwork = scene.set_artwork(processed.bitmap);
                Ok(IngestReport {
                    file_name,
                    artwork,
                    outcome: processed.outcome,
                })
            }
            Err(e) => {
                tracing::error!("ingestion of {file_name} failed: {e}");
                Err(e)
            }
        }
    }
}

/// Remote removal first; any failure there degrades to decoding the original.
fn process(remover: &dyn BackgroundRemover, bytes: &[u8]) -> Result<Processed, AssetError> {
    let reason = match remover.remove_background(bytes) {
        Ok(processed) => match assets::decode_bitmap(&processed) {
            Ok(bitmap) => {
                tracing::info!("background removed");
                return Ok(Processed {
                    bitmap,
                    outcome: IngestOutcome::BackgroundRemoved,
                });
            }
            Err(e) => format!("undecodable service response: {e}"),
        },
        Err(e) => e.to_string(),
    };
    tracing::warn!("background removal failed ({reason}); using the original image");
    let bitmap = assets::decode_bitmap(bytes)?;
    Ok(Processed {
        bitmap,
        outcome: IngestOutcome::Original { reason },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::png_bytes;
    use crate::garment::{Garment, GarmentKey};
    use crate::ops::remove_bg::RemoveBgError;

    struct ServerError;
    impl BackgroundRemover for ServerError {
        fn remove_background(&self, _: &[u8]) -> Result<Vec<u8>, RemoveBgError> {
            Err(RemoveBgError::Status {
                code: 500,
                body: "internal error".into(),
            })
        }
    }

    struct Cutout(Vec<u8>);
    impl BackgroundRemover for Cutout {
        fn remove_background(&self, _: &[u8]) -> Result<Vec<u8>, RemoveBgError> {
            Ok(self.0.clone())
        }
    }

    struct Crashes;
    impl BackgroundRemover for Crashes {
        fn remove_background(&self, _: &[u8]) -> Result<Vec<u8>, RemoveBgError> {
            panic!("remover crashed");
        }
    }

    fn scene() -> Scene {
        Scene::new(Garment::builtin(GarmentKey::White))
    }

    #[test]
    fn remote_failure_falls_back_to_the_original_bitmap() {
        let bytes = png_bytes(6, 3, [200, 10, 10, 255]);
        let direct = assets::decode_bitmap(&bytes).unwrap();

        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(ServerError));
        let report = pipeline
            .ingest_blocking(&mut s, RawFile::new("f.png", bytes))
            .unwrap();

        assert!(matches!(report.outcome, IngestOutcome::Original { .. }));
        assert!(!s.state().uploading);
        let art = s.artwork().unwrap();
        assert_eq!(art.id, report.artwork);
        assert_eq!(art.bitmap.as_raw(), direct.as_raw());
    }

    #[test]
    fn successful_removal_uses_the_service_bitmap() {
        let processed = png_bytes(2, 2, [0, 0, 0, 0]);
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(Cutout(processed)));
        let report = pipeline
            .ingest_blocking(&mut s, RawFile::new("f.png", png_bytes(5, 5, [1, 1, 1, 255])))
            .unwrap();

        assert_eq!(report.outcome, IngestOutcome::BackgroundRemoved);
        assert_eq!(s.artwork().unwrap().bitmap.dimensions(), (2, 2));
    }

    #[test]
    fn garbage_from_the_service_falls_back() {
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(Cutout(b"<html>".to_vec())));
        let report = pipeline
            .ingest_blocking(&mut s, RawFile::new("f.png", png_bytes(5, 4, [1, 1, 1, 255])))
            .unwrap();

        assert!(matches!(report.outcome, IngestOutcome::Original { .. }));
        assert_eq!(s.artwork().unwrap().bitmap.dimensions(), (5, 4));
    }

    #[test]
    fn total_failure_clears_uploading_and_leaves_no_artwork() {
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(ServerError));
        let err = pipeline
            .ingest_blocking(&mut s, RawFile::new("notes.txt", b"hello".to_vec()))
            .unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert!(!s.state().uploading);
        assert!(s.artwork().is_none());
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn second_upload_is_refused_while_one_is_pending() {
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(ServerError));
        pipeline
            .begin(&mut s, RawFile::new("a.png", png_bytes(2, 2, [1, 2, 3, 255])))
            .unwrap();
        assert!(s.state().uploading);
        assert!(matches!(
            pipeline.begin(&mut s, RawFile::new("b.png", png_bytes(2, 2, [1, 2, 3, 255]))),
            Err(IngestError::Busy)
        ));

        pipeline.wait(&mut s).unwrap().unwrap();
        assert!(!s.state().uploading);
        // Same file again is fine once the first one is done.
        assert!(pipeline
            .begin(&mut s, RawFile::new("a.png", png_bytes(2, 2, [1, 2, 3, 255])))
            .is_ok());
        pipeline.wait(&mut s);
    }

    #[test]
    fn crashed_worker_still_clears_uploading() {
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(Crashes));
        let err = pipeline
            .ingest_blocking(&mut s, RawFile::new("a.png", png_bytes(2, 2, [1, 2, 3, 255])))
            .unwrap_err();
        assert!(matches!(err, IngestError::WorkerLost));
        assert!(!s.state().uploading);
    }

    #[test]
    fn poll_without_a_job_is_quiet() {
        let mut s = scene();
        let mut pipeline = IngestionPipeline::new(Arc::new(ServerError));
        assert!(pipeline.poll(&mut s).is_none());
        assert!(pipeline.wait(&mut s).is_none());
    }
}
