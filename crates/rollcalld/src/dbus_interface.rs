use zbus::interface;

use rollcall_core::RgbFrame;

use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.freedesktop.Rollcall1
/// Object path: /org/freedesktop/Rollcall1
///
/// Image arguments are encoded image bytes (PNG, JPEG, anything the
/// `image` crate decodes); the daemon decodes them into frames before
/// handing them to the engine.
pub struct RollcallService {
    engine: EngineHandle,
}

impl RollcallService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.freedesktop.Rollcall1")]
impl RollcallService {
    /// Register a face under the given name from a captured frame.
    /// Returns a JSON summary of the new registry entry.
    async fn register_face(&self, name: &str, image: Vec<u8>) -> zbus::fdo::Result<String> {
        tracing::info!(name, bytes = image.len(), "register requested");
        let frame = decode_frame(&image)?;
        let face = self
            .engine
            .register(name.to_string(), frame)
            .await
            .map_err(to_fdo)?;
        Ok(serde_json::json!({
            "id": face.id,
            "name": face.name,
            "registeredAt": face.registered_at,
        })
        .to_string())
    }

    /// Match a captured frame against the registry and record attendance.
    /// Returns the new attendance record as JSON.
    async fn mark_attendance(&self, image: Vec<u8>) -> zbus::fdo::Result<String> {
        tracing::info!(bytes = image.len(), "mark requested");
        let frame = decode_frame(&image)?;
        let record = self.engine.mark(frame).await.map_err(to_fdo)?;
        serde_json::to_string(&record).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// List registered faces as a JSON array (embeddings included).
    async fn list_faces(&self) -> zbus::fdo::Result<String> {
        let faces = self.engine.list_faces().await.map_err(to_fdo)?;
        serde_json::to_string(&faces).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// List attendance records as a JSON array, in append order.
    async fn list_records(&self) -> zbus::fdo::Result<String> {
        let records = self.engine.list_records().await.map_err(to_fdo)?;
        serde_json::to_string(&records).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Render the attendance log as the plain-text report.
    async fn export_log(&self) -> zbus::fdo::Result<String> {
        self.engine.export().await.map_err(to_fdo)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let faces = self.engine.list_faces().await.map_err(to_fdo)?;
        let records = self.engine.list_records().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "registeredFaces": faces.len(),
            "attendanceRecords": records.len(),
        })
        .to_string())
    }
}

fn decode_frame(bytes: &[u8]) -> zbus::fdo::Result<RgbFrame> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("image decode: {e}")))?;
    Ok(RgbFrame::from_image(&img))
}

/// Domain errors surface with their user message; infrastructure errors
/// are additionally logged before crossing the bus.
fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    match &err {
        EngineError::Detector(inner) => {
            tracing::error!(error = %inner, "detector failure");
        }
        EngineError::Store(inner) => {
            tracing::error!(error = %inner, "store failure");
        }
        _ => {}
    }
    zbus::fdo::Error::Failed(err.to_string())
}
