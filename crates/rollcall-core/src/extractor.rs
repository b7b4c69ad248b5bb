//! Pixel-color embedding extraction.
//!
//! The embedding is a deliberately naive summary of the face region:
//! every 4th pixel of the flattened crop contributes its three color
//! channels, normalized to [0, 1]. It is not a learned representation;
//! its only job is to be deterministic and cheap to compare.

use crate::types::{BoundingBox, Embedding, RgbFrame};

/// Keep one pixel out of every four, in raster-scan order over the crop.
/// The stride is over the flattened pixel sequence, not spatial.
const SAMPLE_STRIDE: usize = 4;
const CHANNEL_MAX: f32 = 255.0;

/// Summarize the boxed region of `frame` as a feature vector.
///
/// Output length is 3 × ceil(region_pixel_count / 4); a box that clamps
/// to nothing yields an empty embedding, which can never match anything.
/// Purely a function of the cropped pixels.
pub fn extract_embedding(frame: &RgbFrame, bbox: &BoundingBox) -> Embedding {
    let crop = frame.crop(bbox);
    let pixels = crop.pixel_count();
    let stride = crop.channels as usize;

    let mut values = Vec::with_capacity(3 * pixels.div_ceil(SAMPLE_STRIDE));
    for px in (0..pixels).step_by(SAMPLE_STRIDE) {
        let offset = px * stride;
        // R, G, B; a fourth (alpha) byte is skipped.
        values.push(crop.data[offset] as f32 / CHANNEL_MAX);
        values.push(crop.data[offset + 1] as f32 / CHANNEL_MAX);
        values.push(crop.data[offset + 2] as f32 / CHANNEL_MAX);
    }

    tracing::trace!(
        pixels,
        dims = values.len(),
        "extracted embedding from crop"
    );

    Embedding::new(values)
}
