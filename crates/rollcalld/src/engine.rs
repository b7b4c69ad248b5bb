use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_core::{
    extract_embedding, AttendanceRecord, CosineMatcher, Detector, DetectorError, MatchResult,
    Matcher, RegisteredFace, RgbFrame,
};
use rollcall_store::{AttendanceLog, FaceRegistry, KvStore, StoreError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("a name is required before registering")]
    EmptyName,
    #[error("no face detected in the captured frame")]
    NoFaceDetected,
    #[error("face not recognized (best similarity {similarity:.3})")]
    NoMatchFound { similarity: f32 },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from the service surface to the engine thread.
enum EngineRequest {
    Register {
        name: String,
        frame: RgbFrame,
        reply: oneshot::Sender<Result<RegisteredFace, EngineError>>,
    },
    Mark {
        frame: RgbFrame,
        reply: oneshot::Sender<Result<AttendanceRecord, EngineError>>,
    },
    ListFaces {
        reply: oneshot::Sender<Result<Vec<RegisteredFace>, EngineError>>,
    },
    ListRecords {
        reply: oneshot::Sender<Result<Vec<AttendanceRecord>, EngineError>>,
    },
    Export {
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Register a face: detect, extract, append to the registry.
    pub async fn register(
        &self,
        name: String,
        frame: RgbFrame,
    ) -> Result<RegisteredFace, EngineError> {
        self.request(|reply| EngineRequest::Register { name, frame, reply })
            .await
    }

    /// Mark attendance: detect, extract, match, append to the log.
    pub async fn mark(&self, frame: RgbFrame) -> Result<AttendanceRecord, EngineError> {
        self.request(|reply| EngineRequest::Mark { frame, reply }).await
    }

    pub async fn list_faces(&self) -> Result<Vec<RegisteredFace>, EngineError> {
        self.request(|reply| EngineRequest::ListFaces { reply }).await
    }

    pub async fn list_records(&self) -> Result<Vec<AttendanceRecord>, EngineError> {
        self.request(|reply| EngineRequest::ListRecords { reply }).await
    }

    pub async fn export(&self) -> Result<String, EngineError> {
        self.request(|reply| EngineRequest::Export { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The detector and both repositories are constructed by the caller and
/// moved into the thread, which owns them for the process lifetime.
/// Requests are processed one at a time, so there is never more than
/// one capture flow in flight.
pub fn spawn_engine<D, S>(
    mut detector: D,
    registry: FaceRegistry<S>,
    log: AttendanceLog<S>,
    similarity_threshold: f32,
) -> EngineHandle
where
    D: Detector + Send + 'static,
    S: KvStore + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Register { name, frame, reply } => {
                        let result = run_register(&mut detector, &registry, &name, &frame);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Mark { frame, reply } => {
                        let result = run_mark(
                            &mut detector,
                            &registry,
                            &log,
                            &frame,
                            similarity_threshold,
                        );
                        let _ = reply.send(result);
                    }
                    EngineRequest::ListFaces { reply } => {
                        let _ = reply.send(registry.list().map_err(EngineError::from));
                    }
                    EngineRequest::ListRecords { reply } => {
                        let _ = reply.send(log.list().map_err(EngineError::from));
                    }
                    EngineRequest::Export { reply } => {
                        let _ = reply.send(log.export_text().map_err(EngineError::from));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

/// Registration flow: validate the name, locate the face, store the
/// embedding under a fresh id.
fn run_register<D: Detector, S: KvStore>(
    detector: &mut D,
    registry: &FaceRegistry<S>,
    name: &str,
    frame: &RgbFrame,
) -> Result<RegisteredFace, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::EmptyName);
    }

    let bbox = detector.detect(frame)?.ok_or(EngineError::NoFaceDetected)?;
    let embedding = extract_embedding(frame, &bbox);

    let face = RegisteredFace {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        embedding,
        registered_at: chrono::Local::now().to_rfc3339(),
    };
    registry.append(face.clone())?;

    tracing::info!(id = %face.id, name = %face.name, dims = face.embedding.len(), "face registered");
    Ok(face)
}

/// Attendance flow: locate the face, match against the registry, append
/// a record for the matched name.
fn run_mark<D: Detector, S: KvStore>(
    detector: &mut D,
    registry: &FaceRegistry<S>,
    log: &AttendanceLog<S>,
    frame: &RgbFrame,
    threshold: f32,
) -> Result<AttendanceRecord, EngineError> {
    let bbox = detector.detect(frame)?.ok_or(EngineError::NoFaceDetected)?;
    let embedding = extract_embedding(frame, &bbox);

    let gallery = registry.list()?;
    let result = CosineMatcher.compare(&embedding, &gallery, threshold);

    match result {
        MatchResult {
            matched: true,
            name: Some(name),
            similarity,
            ..
        } => {
            let record = AttendanceRecord {
                id: uuid::Uuid::new_v4().to_string(),
                name,
                timestamp: chrono::Local::now().to_rfc3339(),
            };
            log.append(record.clone())?;
            tracing::info!(name = %record.name, similarity, "attendance marked");
            Ok(record)
        }
        MatchResult { similarity, .. } => {
            tracing::debug!(similarity, gallery = gallery.len(), "no match above threshold");
            Err(EngineError::NoMatchFound { similarity })
        }
    }
}
