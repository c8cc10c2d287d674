use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Muestra IMU de 6 canales: [ax, ay, az, gx, gy, gz]
pub type FeatureVector = [f64; NUM_CHANNELS];

/// Secuencia ordenada de muestras (longitud >= 1 una vez preparada)
pub type Sequence = Vec<FeatureVector>;

/// Constantes del sistema
pub const NUM_CHANNELS: usize = 6; // ax, ay, az, gx, gy, gz
pub const FEATURE_COLUMNS: [&str; NUM_CHANNELS] = ["ax", "ay", "az", "gx", "gy", "gz"];

/// Normaliza una etiqueta: sin espacios laterales y en minúsculas
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Grabación etiquetada ya preparada (remuestreada y opcionalmente z-normalizada)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSequence {
    pub label: String,
    /// Identificador de origen (ruta del CSV)
    #[serde(rename = "path")]
    pub source: PathBuf,
    #[serde(rename = "seq")]
    pub sequence: Sequence,
}

impl LabeledSequence {
    pub fn new(label: &str, source: impl Into<PathBuf>, sequence: Sequence) -> Self {
        Self {
            label: normalize_label(label),
            source: source.into(),
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Métricas de una referencia frente a la consulta
#[derive(Debug, Clone, PartialEq)]
pub struct PairMetric {
    pub label: String,
    pub source: PathBuf,
    /// Distancia DTW (>= 0)
    pub dtw: f64,
    /// Correlación normalizada en [-1, 1]; -1 si no hubo alineación válida
    pub xcorr: f64,
    pub lag: i64,
}
