use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};
use crate::fusion::ScoreMode;

/// Parámetros del emparejador y de la compuerta de rechazo.
/// Se guardan tal cual dentro del artefacto de modelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherParams {
    /// Puntos tras el remuestreo (<= 0: sin remuestreo) (default: 180)
    pub max_points: i64,
    /// Z-normalización por canal (default: true)
    pub use_znorm: bool,
    /// Fracción de la longitud usada como banda Sakoe-Chiba; 0 = matriz completa (default: 0.2)
    pub window_frac: f64,
    /// Vecinos promediados dentro de cada etiqueta (default: 3)
    pub per_label_k: usize,
    /// Modo de fusión de puntuaciones (default: hybrid)
    pub score_mode: ScoreMode,
    /// Peso de la penalización por correlación en modo híbrido (default: 0.35)
    pub hybrid_alpha: f64,
    /// Lag máximo como fracción de la secuencia más larga (default: 0.15)
    pub xcorr_max_lag_frac: f64,
    /// Solape mínimo como fracción de la secuencia más corta (default: 0.50)
    pub xcorr_min_overlap_frac: f64,
    /// Cuantil de las autopuntuaciones usado como umbral (default: 1.0)
    pub reject_quantile: f64,
    /// Escala aplicada al umbral; mayor = menos estricto (default: 1.10)
    pub reject_scale: f64,
    /// Razón mínima segundo/mejor para aceptar (default: 1.03)
    pub reject_margin: f64,
    /// Holgura sobre el umbral calibrado (default: 1.03)
    pub reject_threshold_grace: f64,
    /// Etiqueta emitida al rechazar (default: "unknown")
    pub unknown_label: String,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            max_points: 180,
            use_znorm: true,
            window_frac: 0.2,
            per_label_k: 3,
            score_mode: ScoreMode::Hybrid,
            hybrid_alpha: 0.35,
            xcorr_max_lag_frac: 0.15,
            xcorr_min_overlap_frac: 0.50,
            reject_quantile: 1.0,
            reject_scale: 1.10,
            reject_margin: 1.03,
            reject_threshold_grace: 1.03,
            unknown_label: "unknown".to_string(),
        }
    }
}

impl MatcherParams {
    /// Comprueba el dominio de cada parámetro
    pub fn validate(&self) -> MatchResult<()> {
        if !(self.window_frac >= 0.0) {
            return Err(MatchError::invalid("window_frac", self.window_frac, ">= 0"));
        }
        if self.per_label_k == 0 {
            return Err(MatchError::invalid("per_label_k", self.per_label_k, "> 0"));
        }
        if !(self.hybrid_alpha >= 0.0) {
            return Err(MatchError::invalid("hybrid_alpha", self.hybrid_alpha, ">= 0"));
        }
        if !(self.xcorr_max_lag_frac >= 0.0) {
            return Err(MatchError::invalid(
                "xcorr_max_lag_frac",
                self.xcorr_max_lag_frac,
                ">= 0",
            ));
        }
        if !(self.xcorr_min_overlap_frac > 0.0 && self.xcorr_min_overlap_frac <= 1.0) {
            return Err(MatchError::invalid(
                "xcorr_min_overlap_frac",
                self.xcorr_min_overlap_frac,
                "(0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.reject_quantile) {
            return Err(MatchError::invalid(
                "reject_quantile",
                self.reject_quantile,
                "[0, 1]",
            ));
        }
        if !(self.reject_scale > 0.0) {
            return Err(MatchError::invalid("reject_scale", self.reject_scale, "> 0"));
        }
        if !(self.reject_margin >= 0.0) {
            return Err(MatchError::invalid("reject_margin", self.reject_margin, ">= 0"));
        }
        if !(self.reject_threshold_grace >= 1.0) {
            return Err(MatchError::invalid(
                "reject_threshold_grace",
                self.reject_threshold_grace,
                ">= 1",
            ));
        }
        Ok(())
    }
}

/// Parámetros de la evaluación con partición estratificada
#[derive(Debug, Clone, PartialEq)]
pub struct EvalParams {
    /// K del k-NN sobre distancias DTW (default: 1)
    pub k: usize,
    /// Fracción de cada etiqueta reservada para test (default: 0.3)
    pub test_ratio: f64,
    /// Semilla del barajado (default: 7)
    pub seed: u64,
    /// Banda DTW como fracción de la longitud (default: 0.2)
    pub window_frac: f64,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            k: 1,
            test_ratio: 0.3,
            seed: 7,
            window_frac: 0.2,
        }
    }
}

impl EvalParams {
    pub fn validate(&self) -> MatchResult<()> {
        if self.k == 0 {
            return Err(MatchError::invalid("k", self.k, "> 0"));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(MatchError::invalid("test_ratio", self.test_ratio, "(0, 1)"));
        }
        if !(self.window_frac >= 0.0) {
            return Err(MatchError::invalid("window_frac", self.window_frac, ">= 0"));
        }
        Ok(())
    }
}
