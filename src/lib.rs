//! Reconocimiento de gestos IMU (6 ejes) por emparejamiento con plantillas.
//!
//! Las grabaciones de referencia se remuestrean y z-normalizan, se comparan
//! con la consulta mediante DTW con banda y correlación cruzada con búsqueda
//! de lag, y las puntuaciones por etiqueta pasan por una compuerta de rechazo
//! con umbrales calibrados dejando uno fuera.

pub mod calibration;
pub mod config;
pub mod csv_loader;
pub mod dtw;
pub mod error;
pub mod evaluate;
pub mod fusion;
pub mod gesture_classifier;
pub mod manifest;
pub mod model;
pub mod pair_metrics;
pub mod pool;
pub mod preprocess;
pub mod rejection;
pub mod report;
pub mod types;
pub mod xcorr;

pub use calibration::{calibrate_thresholds, quantile, ThresholdMap};
pub use config::{EvalParams, MatcherParams};
pub use error::{MatchError, MatchResult};
pub use fusion::{fuse_scores, LabelScoreMap, LabelScores, ScoreMode};
pub use gesture_classifier::{Classification, GestureClassifier};
pub use model::ModelArtifact;
pub use pool::{PoolView, ReferencePool};
pub use rejection::{ClassificationResult, RejectReason, RejectionGate};
pub use types::{FeatureVector, LabeledSequence, PairMetric, Sequence};
