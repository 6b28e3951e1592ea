//! Inference Engine
//!
//! One forward pass over one preprocessed image, arg-max over the raw class
//! scores, index mapped to the crop's label.

use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Tensor};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::preprocess::{preprocess, IMAGE_SIZE};
use crate::model::LoadedModel;
use crate::registry::CropProfile;
use crate::utils::error::{CropDocError, Result};

/// Number of ranked classes kept on a [`Prediction`]
pub const TOP_K: usize = 5;

/// One class with its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Crop whose model produced this prediction
    pub crop_id: String,

    /// Winning label, always one of the crop's labels
    pub predicted_label: String,

    /// Index of the winning label
    pub class_index: usize,

    /// Softmax probability of the winning label
    pub confidence: f32,

    /// Softmax over all classes, in label order
    pub probabilities: Vec<f32>,

    /// Best classes, most probable first
    pub top_k: Vec<ClassScore>,

    /// Forward pass time in milliseconds
    pub inference_time_ms: f64,
}

impl Prediction {
    /// Build a prediction from a raw score vector
    ///
    /// Fails if the score count differs from the label count or a score is NaN.
    pub fn from_scores(profile: &CropProfile, scores: &[f32], elapsed: Duration) -> Result<Self> {
        if scores.len() != profile.num_classes() {
            return Err(CropDocError::Inference(format!(
                "{} model produced {} scores for {} labels",
                profile.crop_id,
                scores.len(),
                profile.num_classes()
            )));
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Err(CropDocError::Inference(format!(
                "{} model produced NaN scores",
                profile.crop_id
            )));
        }

        let class_index = argmax_first(scores)
            .ok_or_else(|| CropDocError::Inference("empty score vector".to_string()))?;
        let probabilities = softmax(scores);

        Ok(Self {
            crop_id: profile.crop_id.clone(),
            predicted_label: profile.labels[class_index].clone(),
            class_index,
            confidence: probabilities[class_index],
            top_k: top_k(&probabilities, &profile.labels, TOP_K),
            probabilities,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Crop: {}\n", self.crop_id));
        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.predicted_label, self.class_index
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("\nTop predictions:\n");
        for (rank, score) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} - {:.2}%\n",
                rank + 1,
                score.label,
                score.probability * 100.0
            ));
        }

        output
    }
}

/// Index of the largest value; ties go to the lowest index
pub fn argmax_first(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// The `k` most probable classes, ties kept in label order
pub fn top_k(probabilities: &[f32], labels: &[String], k: usize) -> Vec<ClassScore> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    // Stable sort keeps index order among equal probabilities
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    indexed
        .into_iter()
        .take(k)
        .filter_map(|(index, probability)| {
            labels.get(index).map(|label| ClassScore {
                index,
                label: label.clone(),
                probability,
            })
        })
        .collect()
}

/// Run one forward pass on a preprocessed `[1, 3, 224, 224]` tensor
pub fn predict<B: Backend>(model: &LoadedModel<B>, input: Tensor<B, 4>) -> Result<Prediction> {
    let dims = input.dims();
    if dims != [1, 3, IMAGE_SIZE, IMAGE_SIZE] {
        return Err(CropDocError::InvalidInput(format!(
            "expected input shape [1, 3, {size}, {size}], got {:?}",
            dims,
            size = IMAGE_SIZE
        )));
    }

    let network = model.network();
    let start = Instant::now();
    let scores = network
        .forward(input)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CropDocError::Inference(format!("{:?}", e)))?;
    let elapsed = start.elapsed();

    let prediction = Prediction::from_scores(model.profile(), &scores, elapsed)?;
    debug!(
        "{}: {} ({:.1}%) in {:.1} ms",
        prediction.crop_id,
        prediction.predicted_label,
        prediction.confidence * 100.0,
        prediction.inference_time_ms
    );
    Ok(prediction)
}

/// Preprocess `image` on the model's device and predict
pub fn predict_image<B: Backend>(model: &LoadedModel<B>, image: &DynamicImage) -> Result<Prediction> {
    let input = preprocess::<B>(image, model.device());
    predict(model, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBuilder, ResNetConfig};
    use crate::registry::HeadType;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn profile() -> CropProfile {
        CropProfile::new(
            "Rice",
            "rice.mpk",
            labels(&["Bacterialblight", "Brownspot", "Leafsmut"]),
            HeadType::DeepSmall,
        )
    }

    #[test]
    fn test_argmax_tie_goes_to_first_index() {
        assert_eq!(argmax_first(&[0.1, 0.7, 0.2, 0.7]), Some(1));
        assert_eq!(argmax_first(&[3.0, 3.0, 3.0]), Some(0));
        assert_eq!(argmax_first(&[-1.0]), Some(0));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn test_tied_scores_pick_lower_label() {
        let prediction =
            Prediction::from_scores(&profile(), &[0.5, 2.0, 2.0], Duration::ZERO).unwrap();

        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.predicted_label, "Brownspot");
        // Tied classes keep label order in the ranking
        assert_eq!(prediction.top_k[0].label, "Brownspot");
        assert_eq!(prediction.top_k[1].label, "Leafsmut");
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 1.0, 1.0, 1.0]);
        assert!(probs.iter().all(|p| (p - 0.25).abs() < 1e-6));

        let probs = softmax(&[1000.0, 0.0]);
        assert!((probs[0] - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_top_k_is_truncated_and_sorted() {
        let ranked = top_k(&[0.1, 0.6, 0.3], &labels(&["a", "b", "c"]), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 1);
        assert_eq!(ranked[1].label, "c");
    }

    #[test]
    fn test_score_count_mismatch() {
        let err = Prediction::from_scores(&profile(), &[1.0, 2.0], Duration::ZERO).unwrap_err();
        assert!(matches!(err, CropDocError::Inference(_)));

        let err = Prediction::from_scores(&profile(), &[1.0, f32::NAN, 0.0], Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, CropDocError::Inference(_)));
    }

    #[test]
    fn test_predict_rejects_wrong_shape_and_closes_over_labels() {
        let dir = TempDir::new().unwrap();
        let builder =
            ModelBuilder::<TestBackend>::new(ResNetConfig::new([1, 1, 1, 1]), dir.path(), Default::default());
        builder.write_random_weights(&profile()).unwrap();
        let model = builder.build(&profile()).unwrap();

        let wrong = Tensor::<TestBackend, 4>::zeros([1, 3, 128, 128], model.device());
        assert!(matches!(
            predict(&model, wrong),
            Err(CropDocError::InvalidInput(_))
        ));

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([90, 140, 60])));
        let prediction = predict_image(&model, &image).unwrap();
        assert!(model.profile().has_label(&prediction.predicted_label));
        assert_eq!(prediction.probabilities.len(), 3);
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);

        // Same image, same model, same answer
        let again = predict_image(&model, &image).unwrap();
        assert_eq!(again.class_index, prediction.class_index);
    }
}
