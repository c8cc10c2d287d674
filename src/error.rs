use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Secuencia vacía: {source_id:?}")]
    EmptySequence { source_id: Option<PathBuf> },

    #[error("El conjunto de referencias está vacío")]
    EmptyReferencePool,

    #[error("Selección vacía: {reason}")]
    EmptySelection { reason: String },

    #[error("La etiqueta '{label}' tiene {count} muestras; se necesitan al menos 2 para dividir")]
    InsufficientSamples { label: String, count: usize },

    #[error("Parámetro inválido {name}={value}: se esperaba {expected}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Modo de puntuación desconocido: '{0}' (dtw, xcorr, hybrid)")]
    UnknownScoreMode(String),

    #[error("Versión de modelo no soportada: {0}")]
    UnsupportedModelVersion(u32),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MatchError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, expected: &'static str) -> Self {
        MatchError::InvalidParameter {
            name,
            value: value.to_string(),
            expected,
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
