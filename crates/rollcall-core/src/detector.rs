//! DETR object detector via ONNX Runtime.
//!
//! Runs a DETR (DEtection TRansformer) model and keeps only
//! person-labeled detections: the face region is taken to be the first
//! qualifying detection in the model's native query order.

use crate::types::{BoundingBox, Detection, RgbFrame};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const DETR_INPUT_SIZE: usize = 640;
/// 91 COCO classes plus the trailing "no object" slot.
const DETR_CLASS_COUNT: usize = 92;
const DETR_NO_OBJECT: usize = 91;
const DETR_CONFIDENCE_THRESHOLD: f32 = 0.5;
const PERSON_LABEL: &str = "person";
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// COCO-91 label table. Index 0 and the gaps are unused slots in the
/// original annotation scheme.
const COCO_LABELS: [&str; 91] = [
    "N/A", "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "N/A", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "N/A", "backpack",
    "umbrella", "N/A", "N/A", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard",
    "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "N/A", "wine glass", "cup", "fork", "knife", "spoon", "bowl",
    "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut",
    "cake", "chair", "couch", "potted plant", "bed", "N/A", "dining table", "N/A", "N/A",
    "toilet", "N/A", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave",
    "oven", "toaster", "sink", "refrigerator", "N/A", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — export detr-resnet-50 to ONNX and place it there")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Abstract face locator: zero or one region believed to contain a face.
///
/// Production uses [`OnnxDetector`]; tests substitute a scripted double.
pub trait Detector {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Option<BoundingBox>, DetectorError>;
}

/// Output tensor indices: (logits, boxes).
type OutputIndices = (usize, usize);

/// DETR-based person detector.
pub struct OnnxDetector {
    session: Session,
    /// (logits, pred_boxes) output positions, discovered by name at load
    /// time with a positional fallback.
    output_indices: OutputIndices,
}

impl OnnxDetector {
    /// Load the DETR ONNX model from the given path.
    ///
    /// Loading is expensive; the composition root constructs one detector
    /// and keeps it alive for the process lifetime.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded DETR model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "DETR model requires 2 outputs (logits, pred_boxes), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "DETR output tensor mapping");

        Ok(Self {
            session,
            output_indices,
        })
    }

    /// Run detection, returning every detection above the confidence
    /// threshold in the model's native query order.
    ///
    /// No NMS and no confidence sort: the downstream policy is "first
    /// qualifying region wins", so the native order is the contract.
    pub fn detect_objects(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>, DetectorError> {
        let input = preprocess(frame);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (logits_idx, boxes_idx) = self.output_indices;

        let (_, logits) = outputs[logits_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("logits: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("pred_boxes: {e}")))?;

        if logits.len() % DETR_CLASS_COUNT != 0 {
            return Err(DetectorError::InferenceFailed(format!(
                "logits length {} is not a multiple of {DETR_CLASS_COUNT} classes",
                logits.len()
            )));
        }
        let queries = logits.len() / DETR_CLASS_COUNT;
        if boxes.len() < queries * 4 {
            return Err(DetectorError::InferenceFailed(format!(
                "pred_boxes length {} too short for {queries} queries",
                boxes.len()
            )));
        }

        let detections = decode_queries(
            logits,
            boxes,
            queries,
            frame.width,
            frame.height,
            DETR_CONFIDENCE_THRESHOLD,
        );

        tracing::debug!(
            queries,
            kept = detections.len(),
            "DETR decode complete"
        );

        Ok(detections)
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Option<BoundingBox>, DetectorError> {
        let detections = self.detect_objects(frame)?;
        Ok(first_person(detections))
    }
}

/// Keep the first person-labeled detection in native output order.
fn first_person(detections: Vec<Detection>) -> Option<BoundingBox> {
    detections
        .into_iter()
        .find(|d| d.label == PERSON_LABEL)
        .map(|d| d.bbox)
}

/// Discover output tensor ordering by name.
///
/// DETR exports commonly name the tensors "logits" and "pred_boxes";
/// generic exports fall back to positional ordering [0]=logits,
/// [1]=pred_boxes.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let logits = names.iter().position(|n| n == "logits");
    let boxes = names.iter().position(|n| n == "pred_boxes");

    match (logits, boxes) {
        (Some(l), Some(b)) => {
            tracing::info!("DETR: using name-based output tensor mapping");
            (l, b)
        }
        _ => {
            tracing::info!(
                ?names,
                "DETR: output names not recognized, using positional mapping [0]=logits, [1]=pred_boxes"
            );
            (0, 1)
        }
    }
}

/// Decode per-query class scores and boxes into thresholded detections.
fn decode_queries(
    logits: &[f32],
    boxes: &[f32],
    queries: usize,
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<Detection> {
    let mut detections = Vec::new();

    for q in 0..queries {
        let class_logits = &logits[q * DETR_CLASS_COUNT..(q + 1) * DETR_CLASS_COUNT];
        let probs = softmax(class_logits);

        // Best real class; the no-object slot only absorbs probability mass.
        let mut best_class = 0usize;
        let mut best_prob = f32::NEG_INFINITY;
        for (class, &prob) in probs.iter().enumerate().take(DETR_NO_OBJECT) {
            if prob > best_prob {
                best_prob = prob;
                best_class = class;
            }
        }

        if best_prob <= threshold {
            continue;
        }

        let bbox = decode_box(&boxes[q * 4..q * 4 + 4], frame_width, frame_height);
        detections.push(Detection {
            label: COCO_LABELS[best_class].to_string(),
            score: best_prob,
            bbox,
        });
    }

    detections
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Convert a normalized (cx, cy, w, h) box to absolute pixel xyxy,
/// clamped to the frame.
fn decode_box(cxcywh: &[f32], frame_width: u32, frame_height: u32) -> BoundingBox {
    let (cx, cy, w, h) = (cxcywh[0], cxcywh[1], cxcywh[2], cxcywh[3]);
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    BoundingBox {
        xmin: ((cx - w / 2.0) * fw).clamp(0.0, fw),
        ymin: ((cy - h / 2.0) * fh).clamp(0.0, fh),
        xmax: ((cx + w / 2.0) * fw).clamp(0.0, fw),
        ymax: ((cy + h / 2.0) * fh).clamp(0.0, fh),
    }
}

/// Preprocess a frame into a normalized NCHW float tensor.
///
/// Stretch-resizes to the fixed DETR input with bilinear interpolation;
/// box outputs are normalized to the input, so they map back to the
/// original frame by its own dimensions.
fn preprocess(frame: &RgbFrame) -> Array4<f32> {
    let src_w = frame.width as usize;
    let src_h = frame.height as usize;
    let size = DETR_INPUT_SIZE;

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    if src_w == 0 || src_h == 0 {
        return tensor;
    }

    let scale_x = src_w as f32 / size as f32;
    let scale_y = src_h as f32 / size as f32;

    for y in 0..size {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for channel in 0..3 {
                let tl = frame.channel_at(x0, y0, channel) as f32;
                let tr = frame.channel_at(x1, y0, channel) as f32;
                let bl = frame.channel_at(x0, y1, channel) as f32;
                let br = frame.channel_at(x1, y1, channel) as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                tensor[[0, channel, y, x]] =
                    (val / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
            }
        }
    }

    tensor
}
