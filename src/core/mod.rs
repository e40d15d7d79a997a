//! Core functionality: model loading, image and text preprocessing, scoring

/// libtorch-backed CLIP encoder.
#[cfg(feature = "embeddings")]
pub mod clip;
/// Model provider and the process-wide model handle.
pub mod model;
/// Image preprocessing into the encoder's input layout.
pub mod preprocess;
/// Softmax ranking of descriptions against an image.
pub mod scoring;
/// CLIP BPE tokenization.
pub mod tokenizer;
/// Decoding and validation of uploaded images.
pub mod upload;
