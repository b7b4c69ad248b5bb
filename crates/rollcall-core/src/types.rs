use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("pixel buffer length mismatch: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unsupported channel count: {0} (expected 3 or 4)")]
    UnsupportedChannels(u8),
}

/// An in-memory interleaved pixel frame, 3 (RGB) or 4 (RGBA) bytes per pixel.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl RgbFrame {
    /// Wrap an interleaved RGB buffer (3 bytes per pixel).
    pub fn from_rgb8(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(data, width, height, 3)
    }

    /// Wrap an interleaved RGBA buffer (4 bytes per pixel). The alpha
    /// channel is carried but never sampled.
    pub fn from_rgba8(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(data, width, height, 4)
    }

    fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, FrameError> {
        if channels != 3 && channels != 4 {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Convert a decoded image into an RGB frame.
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
            channels: 3,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Sample one channel of the pixel at (x, y). Callers must stay in bounds.
    pub(crate) fn channel_at(&self, x: usize, y: usize, channel: usize) -> u8 {
        let stride = self.channels as usize;
        self.data[(y * self.width as usize + x) * stride + channel]
    }

    /// Extract the region covered by `bbox`, clamped to the frame bounds.
    ///
    /// A box entirely outside the frame yields an empty 0×0 crop.
    pub fn crop(&self, bbox: &BoundingBox) -> RgbFrame {
        let x0 = (bbox.xmin.floor().max(0.0) as u32).min(self.width);
        let y0 = (bbox.ymin.floor().max(0.0) as u32).min(self.height);
        let x1 = (bbox.xmax.floor().max(0.0) as u32).min(self.width);
        let y1 = (bbox.ymax.floor().max(0.0) as u32).min(self.height);

        let width = x1.saturating_sub(x0);
        let height = y1.saturating_sub(y0);
        let stride = self.channels as usize;

        let mut data = Vec::with_capacity(width as usize * height as usize * stride);
        for y in y0..y0 + height {
            let row_start = (y as usize * self.width as usize + x0 as usize) * stride;
            let row_end = row_start + width as usize * stride;
            data.extend_from_slice(&self.data[row_start..row_end]);
        }

        RgbFrame {
            data,
            width,
            height,
            channels: self.channels,
        }
    }
}

/// Axis-aligned region in pixel coordinates, xmin < xmax and ymin < ymax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// One object reported by the detection model.
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

/// Down-sampled pixel-color feature vector, every value in [0, 1].
///
/// Serializes as a bare array; the length depends on the crop size, so
/// two embeddings are only comparable when their lengths agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity in [-1, 1].
    ///
    /// Length-mismatched vectors score 0.0: embeddings captured against
    /// different crop sizes can never match. A zero-magnitude vector also
    /// scores 0.0 rather than producing NaN.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// A registered identity: display name plus the embedding captured at
/// registration time. Field names follow the persisted wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredFace {
    pub id: String,
    pub name: String,
    pub embedding: Embedding,
    pub registered_at: String,
}

/// One attendance event, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub name: String,
    pub timestamp: String,
}

/// Result of matching a probe embedding against the registry.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Best cosine similarity seen across the whole gallery [-1, 1],
    /// reported even when nothing cleared the threshold.
    pub similarity: f32,
    pub face_id: Option<String>,
    pub name: Option<String>,
}

/// Strategy for comparing a probe embedding against the registered gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[RegisteredFace], threshold: f32)
        -> MatchResult;
}

/// Nearest-neighbor classifier with a rejection threshold.
///
/// Linear scan over the gallery in insertion order. A match requires the
/// score to strictly exceed the threshold; equal scores keep the
/// first-encountered entry, so results are deterministic for a fixed
/// gallery.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[RegisteredFace],
        threshold: f32,
    ) -> MatchResult {
        let mut best_seen = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;
        let mut best_score = threshold;

        for (i, face) in gallery.iter().enumerate() {
            let score = probe.similarity(&face.embedding);
            if score > best_seen {
                best_seen = score;
            }
            // Strict inequality on both bounds: below-or-at threshold never
            // matches, and ties keep the earlier entry.
            if score > best_score {
                best_score = score;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) => MatchResult {
                matched: true,
                similarity: best_score,
                face_id: Some(gallery[idx].id.clone()),
                name: Some(gallery[idx].name.clone()),
            },
            None => MatchResult {
                matched: false,
                similarity: if best_seen == f32::NEG_INFINITY {
                    0.0
                } else {
                    best_seen
                },
                face_id: None,
                name: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(id: &str, name: &str, values: Vec<f32>) -> RegisteredFace {
        RegisteredFace {
            id: id.into(),
            name: name.into(),
            embedding: Embedding::new(values),
            registered_at: "2024-03-01T09:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_similarity_identical() {
        let a = Embedding::new(vec![0.2, 0.4, 0.6]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_length_mismatch_is_zero() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_similarity_zero_vector_is_zero() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
        assert_eq!(b.similarity(&a), 0.0);
    }

    #[test]
    fn test_matcher_exact_embedding_matches() {
        let gallery = vec![face("1", "ada", vec![0.5, 0.25, 0.75])];
        let probe = Embedding::new(vec![0.5, 0.25, 0.75]);
        let result = CosineMatcher.compare(&probe, &gallery, 0.7);
        assert!(result.matched);
        assert_eq!(result.name.as_deref(), Some("ada"));
        assert!((result.similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_matcher_below_threshold_no_match() {
        let gallery = vec![face("1", "ada", vec![1.0, 0.0, 0.0])];
        let probe = Embedding::new(vec![0.0, 1.0, 0.0]);
        let result = CosineMatcher.compare(&probe, &gallery, 0.7);
        assert!(!result.matched);
        assert!(result.face_id.is_none());
        assert!(result.similarity.abs() < 1e-6);
    }

    #[test]
    fn test_matcher_at_threshold_no_match() {
        // Identical vectors score exactly 1.0; a threshold of 1.0 must
        // reject because the comparison is strict.
        let gallery = vec![face("1", "ada", vec![0.3, 0.6])];
        let probe = Embedding::new(vec![0.3, 0.6]);
        let result = CosineMatcher.compare(&probe, &gallery, 1.0);
        assert!(!result.matched);
    }

    #[test]
    fn test_matcher_tie_keeps_first_entry() {
        let gallery = vec![
            face("1", "first", vec![1.0, 0.0]),
            face("2", "second", vec![2.0, 0.0]), // same direction, same score
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = CosineMatcher.compare(&probe, &gallery, 0.5);
        assert!(result.matched);
        assert_eq!(result.face_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_matcher_picks_best_not_first_clearing() {
        let gallery = vec![
            face("1", "close", vec![0.9, 0.4359]), // clears 0.7 but not best
            face("2", "exact", vec![1.0, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = CosineMatcher.compare(&probe, &gallery, 0.7);
        assert!(result.matched);
        assert_eq!(result.face_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_matcher_zero_probe_never_matches() {
        let gallery = vec![face("1", "ada", vec![1.0, 0.0])];
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = CosineMatcher.compare(&probe, &gallery, 0.0);
        // Similarity is defined as 0.0, which does not strictly exceed 0.0.
        assert!(!result.matched);
    }

    #[test]
    fn test_matcher_empty_gallery() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = CosineMatcher.compare(&probe, &[], 0.7);
        assert!(!result.matched);
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_matcher_deterministic() {
        let gallery = vec![
            face("1", "ada", vec![0.8, 0.2, 0.1]),
            face("2", "grace", vec![0.1, 0.9, 0.3]),
        ];
        let probe = Embedding::new(vec![0.79, 0.21, 0.1]);
        let first = CosineMatcher.compare(&probe, &gallery, 0.7);
        for _ in 0..10 {
            let again = CosineMatcher.compare(&probe, &gallery, 0.7);
            assert_eq!(first.matched, again.matched);
            assert_eq!(first.face_id, again.face_id);
            assert_eq!(first.similarity, again.similarity);
        }
    }

    #[test]
    fn test_registered_face_wire_format() {
        let f = face("42", "ada", vec![0.5]);
        let json = serde_json::to_value(&f).unwrap();
        // Persisted field names are camelCase and the embedding is a bare array.
        assert!(json.get("registeredAt").is_some());
        assert_eq!(json["embedding"], serde_json::json!([0.5]));
    }

    #[test]
    fn test_frame_length_validation() {
        assert!(RgbFrame::from_rgb8(vec![0; 12], 2, 2).is_ok());
        assert!(RgbFrame::from_rgb8(vec![0; 11], 2, 2).is_err());
        assert!(RgbFrame::from_rgba8(vec![0; 16], 2, 2).is_ok());
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = RgbFrame::from_rgb8(vec![7; 4 * 4 * 3], 4, 4).unwrap();
        let bbox = BoundingBox {
            xmin: -10.0,
            ymin: -10.0,
            xmax: 100.0,
            ymax: 100.0,
        };
        let crop = frame.crop(&bbox);
        assert_eq!((crop.width, crop.height), (4, 4));
        assert_eq!(crop.data, frame.data);
    }

    #[test]
    fn test_crop_outside_frame_is_empty() {
        let frame = RgbFrame::from_rgb8(vec![0; 4 * 4 * 3], 4, 4).unwrap();
        let bbox = BoundingBox {
            xmin: 50.0,
            ymin: 50.0,
            xmax: 60.0,
            ymax: 60.0,
        };
        let crop = frame.crop(&bbox);
        assert_eq!(crop.pixel_count(), 0);
        assert!(crop.data.is_empty());
    }

    #[test]
    fn test_crop_extracts_region() {
        // 4x2 frame with per-pixel values 0..8 in the red channel.
        let mut data = Vec::new();
        for px in 0u8..8 {
            data.extend_from_slice(&[px, 0, 0]);
        }
        let frame = RgbFrame::from_rgb8(data, 4, 2).unwrap();
        let bbox = BoundingBox {
            xmin: 1.0,
            ymin: 0.0,
            xmax: 3.0,
            ymax: 2.0,
        };
        let crop = frame.crop(&bbox);
        assert_eq!((crop.width, crop.height), (2, 2));
        let reds: Vec<u8> = crop.data.chunks(3).map(|px| px[0]).collect();
        assert_eq!(reds, vec![1, 2, 5, 6]);
    }
}
