//! rollcall-core — Face location and matching engine.
//!
//! Locates a face region with a DETR object-detection model running via
//! ONNX Runtime, summarizes the region as a down-sampled pixel-color
//! embedding, and matches it against a gallery by cosine similarity.

pub mod detector;
pub mod extractor;
pub mod types;

pub use detector::{Detector, DetectorError, OnnxDetector};
pub use extractor::extract_embedding;
pub use types::{
    AttendanceRecord, BoundingBox, CosineMatcher, Detection, Embedding, FrameError, MatchResult,
    Matcher, RegisteredFace, RgbFrame,
};
