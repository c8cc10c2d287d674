use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::types::PairMetric;

/// Etiqueta -> puntuación (menor = mejor)
pub type LabelScoreMap = BTreeMap<String, f64>;

/// Suelo para la mejor distancia DTW al normalizar en modo híbrido
const BEST_DTW_FLOOR: f64 = 1e-9;

/// Modo de fusión de las métricas por etiqueta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ScoreMode {
    /// Media de las k mejores distancias DTW
    Dtw,
    /// 1 - correlación media de las k mejores, llevada a [0, 1]
    Xcorr,
    /// DTW relativa a la mejor etiqueta + alpha * penalización de correlación
    Hybrid,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::Dtw => "dtw",
            ScoreMode::Xcorr => "xcorr",
            ScoreMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dtw" => Ok(ScoreMode::Dtw),
            "xcorr" => Ok(ScoreMode::Xcorr),
            "hybrid" => Ok(ScoreMode::Hybrid),
            other => Err(MatchError::UnknownScoreMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for ScoreMode {
    type Error = MatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lleva una correlación de [-1, 1] a [0, 1]
pub fn normalize01(corr: f64) -> f64 {
    (corr.clamp(-1.0, 1.0) + 1.0) * 0.5
}

/// Puntuaciones por etiqueta: la final y sus dos componentes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelScores {
    pub final_scores: LabelScoreMap,
    pub dtw_scores: LabelScoreMap,
    pub xcorr_scores: LabelScoreMap,
}

/// Agrega las métricas por etiqueta con las `per_label_k` mejores
/// distancias y correlaciones, y fusiona según `mode`.
pub fn fuse_scores(
    metrics: &[PairMetric],
    per_label_k: usize,
    mode: ScoreMode,
    hybrid_alpha: f64,
) -> LabelScores {
    let mut grouped: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for m in metrics {
        let entry = grouped.entry(m.label.as_str()).or_default();
        entry.0.push(m.dtw);
        entry.1.push(m.xcorr);
    }

    let mut dtw_scores = LabelScoreMap::new();
    let mut xcorr_scores = LabelScoreMap::new();
    for (label, (mut dtws, mut corrs)) in grouped {
        let k = per_label_k.min(dtws.len()).max(1);
        dtws.sort_by(|a, b| a.total_cmp(b));
        corrs.sort_by(|a, b| b.total_cmp(a));
        dtw_scores.insert(label.to_string(), dtws.iter().take(k).sum::<f64>() / k as f64);
        xcorr_scores.insert(label.to_string(), corrs.iter().take(k).sum::<f64>() / k as f64);
    }

    let final_scores = match mode {
        ScoreMode::Dtw => dtw_scores.clone(),
        ScoreMode::Xcorr => xcorr_scores
            .iter()
            .map(|(label, &corr)| (label.clone(), 1.0 - normalize01(corr)))
            .collect(),
        ScoreMode::Hybrid => {
            let best_dtw = dtw_scores
                .values()
                .copied()
                .fold(f64::INFINITY, f64::min);
            let best_dtw = if best_dtw.is_finite() { best_dtw } else { 1.0 };
            let best_dtw = best_dtw.max(BEST_DTW_FLOOR);
            dtw_scores
                .iter()
                .map(|(label, &dtw)| {
                    let corr = xcorr_scores.get(label).copied().unwrap_or(-1.0);
                    let penalty = 1.0 - normalize01(corr);
                    (label.clone(), dtw / best_dtw + hybrid_alpha * penalty)
                })
                .collect()
        }
    };

    LabelScores {
        final_scores,
        dtw_scores,
        xcorr_scores,
    }
}
