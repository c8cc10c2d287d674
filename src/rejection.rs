use std::fmt;

use crate::calibration::ThresholdMap;
use crate::fusion::LabelScoreMap;

/// Suelo para la mejor puntuación al calcular la razón segundo/mejor
const BEST_SCORE_FLOOR: f64 = 1e-9;

/// Motivo de rechazo
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// No había ninguna puntuación por etiqueta
    NoLabelScores,
    /// La mejor puntuación supera el umbral calibrado (con holgura)
    AboveThreshold { best_score: f64, soft_threshold: f64 },
    /// La segunda etiqueta no está lo bastante lejos de la mejor
    MarginTooSmall { ratio: f64, margin: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoLabelScores => write!(f, "no_label_scores"),
            RejectReason::AboveThreshold {
                best_score,
                soft_threshold,
            } => write!(
                f,
                "best_score_above_threshold({:.2}>{:.2})",
                best_score, soft_threshold
            ),
            RejectReason::MarginTooSmall { ratio, margin } => {
                write!(f, "margin_too_small({:.3}<{:.3})", ratio, margin)
            }
        }
    }
}

/// Resultado de la compuerta: etiqueta (o la de desconocido) y motivo
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub reject_reason: Option<RejectReason>,
}

impl ClassificationResult {
    pub fn is_rejected(&self) -> bool {
        self.reject_reason.is_some()
    }
}

/// Configuración de la compuerta de rechazo
#[derive(Debug, Clone, Copy)]
pub struct RejectionGate<'a> {
    /// `None` desactiva la comprobación de umbral
    pub thresholds: Option<&'a ThresholdMap>,
    pub margin: f64,
    pub threshold_grace: f64,
    pub unknown_label: &'a str,
}

impl RejectionGate<'_> {
    /// Elige la etiqueta de menor puntuación y aplica, en este orden, la
    /// comprobación de umbral y la de margen frente a la segunda.
    pub fn decide(&self, scores: &LabelScoreMap) -> ClassificationResult {
        let unknown = |reason| ClassificationResult {
            label: self.unknown_label.to_string(),
            reject_reason: Some(reason),
        };

        let mut ranked: Vec<(&String, f64)> = scores.iter().map(|(l, &s)| (l, s)).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let Some(&(best_label, best_score)) = ranked.first() else {
            return unknown(RejectReason::NoLabelScores);
        };
        let second_score = ranked.get(1).map_or(f64::INFINITY, |r| r.1);

        if let Some(threshold) = self.thresholds.and_then(|t| t.get(best_label)) {
            let soft_threshold = threshold * self.threshold_grace.max(1.0);
            if best_score > soft_threshold {
                return unknown(RejectReason::AboveThreshold {
                    best_score,
                    soft_threshold,
                });
            }
        }

        if self.margin > 0.0 && second_score.is_finite() {
            let ratio = second_score / best_score.max(BEST_SCORE_FLOOR);
            if ratio < self.margin {
                return unknown(RejectReason::MarginTooSmall {
                    ratio,
                    margin: self.margin,
                });
            }
        }

        ClassificationResult {
            label: best_label.clone(),
            reject_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> LabelScoreMap {
        pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()
    }

    fn gate<'a>(thresholds: Option<&'a ThresholdMap>) -> RejectionGate<'a> {
        RejectionGate {
            thresholds,
            margin: 1.03,
            threshold_grace: 1.03,
            unknown_label: "unknown",
        }
    }

    #[test]
    fn test_empty_scores_rejected() {
        let result = gate(None).decide(&LabelScoreMap::new());
        assert_eq!(result.label, "unknown");
        assert_eq!(result.reject_reason, Some(RejectReason::NoLabelScores));
        assert_eq!(result.reject_reason.unwrap().to_string(), "no_label_scores");
    }

    #[test]
    fn test_accepts_clear_winner() {
        let result = gate(None).decide(&scores(&[("wave", 1.0), ("tap", 2.0)]));
        assert_eq!(result.label, "wave");
        assert!(!result.is_rejected());
    }

    #[test]
    fn test_single_label_skips_margin() {
        let result = gate(None).decide(&scores(&[("wave", 5.0)]));
        assert_eq!(result.label, "wave");
    }

    #[test]
    fn test_threshold_with_grace() {
        let thresholds: ThresholdMap = scores(&[("wave", 1.0)]);
        // 1.02 <= 1.03 -> dentro de la holgura
        let result = gate(Some(&thresholds)).decide(&scores(&[("wave", 1.02), ("tap", 3.0)]));
        assert_eq!(result.label, "wave");

        let result = gate(Some(&thresholds)).decide(&scores(&[("wave", 1.2), ("tap", 3.0)]));
        assert_eq!(result.label, "unknown");
        let reason = result.reject_reason.unwrap();
        assert!(matches!(reason, RejectReason::AboveThreshold { .. }));
        assert_eq!(reason.to_string(), "best_score_above_threshold(1.20>1.03)");
    }

    #[test]
    fn test_margin_rejection() {
        let result = gate(None).decide(&scores(&[("wave", 1.0), ("tap", 1.01)]));
        assert_eq!(result.label, "unknown");
        assert_eq!(
            result.reject_reason.unwrap().to_string(),
            "margin_too_small(1.010<1.030)"
        );
    }

    #[test]
    fn test_threshold_checked_before_margin() {
        let thresholds: ThresholdMap = scores(&[("wave", 0.5)]);
        let result = gate(Some(&thresholds)).decide(&scores(&[("wave", 1.0), ("tap", 1.01)]));
        assert!(matches!(
            result.reject_reason,
            Some(RejectReason::AboveThreshold { .. })
        ));
    }

    #[test]
    fn test_zero_margin_disables_check() {
        let g = RejectionGate {
            margin: 0.0,
            ..gate(None)
        };
        let result = g.decide(&scores(&[("wave", 1.0), ("tap", 1.0)]));
        assert_eq!(result.label, "tap");
    }

    #[test]
    fn test_label_without_threshold_not_gated() {
        let thresholds: ThresholdMap = scores(&[("tap", 0.1)]);
        let result = gate(Some(&thresholds)).decide(&scores(&[("wave", 10.0), ("tap", 20.0)]));
        assert_eq!(result.label, "wave");
    }
}
