#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops::FilterType, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

type YoloPlan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// The model is loaded lazily in `warm_up`, so a missing or broken model file
/// surfaces as a detector-load failure when the HUD starts rather than at
/// construction.
pub struct TractBackend {
    model_path: PathBuf,
    labels_path: PathBuf,
    input_size: u32,
    score_threshold: f32,
    nms_threshold: f32,
    model: Option<YoloPlan>,
    labels: Vec<String>,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(model_path: P, labels_path: L, input_size: u32) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            labels_path: labels_path.as_ref().to_path_buf(),
            input_size,
            score_threshold: 0.25,
            nms_threshold: 0.45,
            model: None,
            labels: Vec::new(),
        }
    }

    /// Override the raw objectness cut applied before NMS.
    ///
    /// This is a pre-filter only; the HUD applies its own confidence policy after.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_nms(mut self, threshold: f32) -> Self {
        self.nms_threshold = threshold;
        self
    }

    fn load(&self) -> Result<YoloPlan> {
        let size = self.input_size as usize;
        tract_onnx::onnx()
            .model_for_path(&self.model_path)
            .with_context(|| format!("failed to load ONNX model from {}", self.model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let frame = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))?;
        let resized = image::imageops::resize(&frame, self.input_size, self.input_size, FilterType::Triangle);
        let size = self.input_size as usize;
        let raw = resized.as_raw();
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            raw[(y * size + x) * 3 + channel] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }
        self.labels = load_labels(&self.labels_path)?;
        self.model = Some(self.load()?);
        log::info!(
            "TractBackend: loaded {} ({} labels, input {}px)",
            self.model_path.display(),
            self.labels.len(),
            self.input_size
        );
        Ok(())
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("tract model not loaded; call warm_up first"))?;
        let outputs = model.run(tvec!(input.into())).context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let dims = output.shape().to_vec();
        let (rows, cols) = match dims.len() {
            3 => (dims[1], dims[2]),
            2 => (dims[0], dims[1]),
            _ => bail!("unexpected model output shape {:?}", dims),
        };
        let data: Vec<f32> = output.iter().copied().collect();

        let scale = (
            width as f32 / self.input_size as f32,
            height as f32 / self.input_size as f32,
        );
        let detections = parse_yolo(&data, rows, cols, scale, &self.labels, self.score_threshold);
        Ok(apply_nms(detections, self.nms_threshold))
    }
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels from {}", path.display()))?;
    let labels: Vec<String> = raw
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if labels.is_empty() {
        bail!("labels file {} is empty", path.display());
    }
    Ok(labels)
}

/// Decode YOLOv5-style rows: cx, cy, w, h, objectness, class scores...
pub(crate) fn parse_yolo(
    data: &[f32],
    rows: usize,
    cols: usize,
    scale: (f32, f32),
    labels: &[String],
    score_threshold: f32,
) -> Vec<Detection> {
    let mut detections = Vec::new();
    if cols <= 5 {
        return detections;
    }
    for row in 0..rows {
        let base = row * cols;
        if base + cols > data.len() {
            break;
        }
        let objectness = data[base + 4];
        if objectness < score_threshold {
            continue;
        }
        let (class_id, class_score) = data[base + 5..base + cols]
            .iter()
            .enumerate()
            .fold((0usize, 0f32), |acc, (idx, val)| if *val > acc.1 { (idx, *val) } else { acc });
        let score = objectness * class_score;
        if score < score_threshold {
            continue;
        }
        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"));
        let (cx, cy, w, h) = (data[base], data[base + 1], data[base + 2], data[base + 3]);
        let bbox = BoundingBox::new(
            (cx - w / 2.0) * scale.0,
            (cy - h / 2.0) * scale.1,
            w * scale.0,
            h * scale.1,
        );
        detections.push(Detection::new(label, score, bbox));
    }
    detections
}

pub(crate) fn apply_nms(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        let overlaps = kept
            .iter()
            .any(|picked| picked.label == det.label && picked.bbox.iou(&det.bbox) >= threshold);
        if !overlaps {
            kept.push(det);
        }
    }
    kept
}
