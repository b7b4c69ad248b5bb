use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the DETR ONNX model file.
    pub model_path: PathBuf,
    /// Path to the JSON store document.
    pub store_path: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let model_path = std::env::var("ROLLCALL_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models/detr-resnet-50.onnx"));

        let store_path = std::env::var("ROLLCALL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.json"));

        Self {
            model_path,
            store_path,
            similarity_threshold: env_f32("ROLLCALL_SIMILARITY_THRESHOLD", 0.7),
        }
    }

    pub fn model_path_str(&self) -> String {
        self.model_path.to_string_lossy().into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
