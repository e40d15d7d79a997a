mod common;

use std::sync::Arc;

use common::{descriptions, ready, solid_image, BrokenModel, ColorModel};
use imagetruth::{score, DescriptionSet, ModelState, ScoreError, ScoreResult};

const RED: [u8; 3] = [200, 20, 20];

#[test]
fn test_best_description_is_one_of_the_inputs() {
    let model = ready(Arc::new(ColorModel::default()));
    let sets = [
        descriptions("A red apple", "A car parked in a garage", "An orange fruit on a tree"),
        descriptions("a dog", "a cat", "a bird"),
        descriptions("blue sky", "red barn", "green grass"),
    ];

    for set in sets {
        let set = DescriptionSet::new(set).unwrap();
        let result = score(&model, &solid_image(RED), &set).unwrap();

        assert!(set.as_slice().contains(&result.best_description));
        assert!((0.0..=1.0).contains(&result.confidence));
        let sum: f32 = result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_red_apple_ranks_first() {
    let model = ready(Arc::new(ColorModel::default()));
    let set = DescriptionSet::new(descriptions(
        "A red apple",
        "A car parked in a garage",
        "An orange fruit on a tree",
    ))
    .unwrap();

    let result = score(&model, &solid_image(RED), &set).unwrap();

    assert_eq!(result.best_description, "A red apple");
    assert_eq!(result.best_index, Some(0));
    assert!(result.confidence > 0.5);
    assert!(result.probabilities[0] > result.probabilities[1]);
    assert!(result.probabilities[0] > result.probabilities[2]);
}

#[test]
fn test_identical_descriptions_split_evenly() {
    let model = ready(Arc::new(ColorModel::default()));
    let set = DescriptionSet::new(descriptions("A red apple", "A red apple", "A red apple")).unwrap();

    let result = score(&model, &solid_image(RED), &set).unwrap();

    assert_eq!(result.best_description, "A red apple");
    assert_eq!(result.best_index, Some(0));
    for p in &result.probabilities {
        assert!((p - 1.0 / 3.0).abs() < 1e-4);
    }
}

#[test]
fn test_empty_description_never_reaches_the_model() {
    let err = DescriptionSet::new(descriptions("A red apple", "", "An orange")).unwrap_err();
    assert_eq!(err, ScoreError::EmptyDescription { index: 1 });
    assert!(err.is_expected());
}

#[test]
fn test_unavailable_model_returns_sentinel() {
    let model = ModelState::unavailable("model weights not found at models/clip-vit-b-32.pt");
    let set = DescriptionSet::new(descriptions("a", "b", "c")).unwrap();

    for _ in 0..3 {
        let err = score(&model, &solid_image(RED), &set).unwrap_err();
        let sentinel = ScoreResult::sentinel(&err);
        assert_eq!(sentinel.best_description, "Model not loaded");
        assert_eq!(sentinel.confidence, 0.0);
    }
}

#[test]
fn test_inference_failure_is_recoverable() {
    let broken = ready(Arc::new(BrokenModel));
    let set = DescriptionSet::new(descriptions("A red apple", "a car", "a tree")).unwrap();

    let err = score(&broken, &solid_image(RED), &set).unwrap_err();
    assert!(!err.is_expected());
    assert_eq!(ScoreResult::sentinel(&err).best_description, "Error in prediction");

    let working = ready(Arc::new(ColorModel::default()));
    let result = score(&working, &solid_image(RED), &set).unwrap();
    assert_eq!(result.best_description, "A red apple");
}

#[test]
fn test_model_invoked_once_per_score() {
    let color = Arc::new(ColorModel::default());
    let model = ready(color.clone());
    let set = DescriptionSet::new(descriptions("red", "green", "blue")).unwrap();

    score(&model, &solid_image([10, 10, 240]), &set).unwrap();
    let result = score(&model, &solid_image([10, 240, 10]), &set).unwrap();

    assert_eq!(color.calls(), 2);
    assert_eq!(result.best_description, "green");
}
