use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::MatcherParams;
use crate::error::{MatchError, MatchResult};
use crate::pool::ReferencePool;

/// Etiqueta -> umbral de rechazo calibrado (mismas unidades que el modo de puntuación)
pub type ThresholdMap = BTreeMap<String, f64>;

/// Cuantil por rango más cercano sobre la lista ordenada:
/// índice `round((n - 1) * q)` con `q` acotado a [0, 1].
pub fn quantile(values: &[f64], q: f64) -> MatchResult<f64> {
    if values.is_empty() {
        return Err(MatchError::EmptySelection {
            reason: "no se puede calcular el cuantil de una lista vacía".to_string(),
        });
    }
    let q = q.clamp(0.0, 1.0);
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * q).round_ties_even() as usize;
    Ok(sorted[idx.min(sorted.len() - 1)])
}

/// Autopuntuación dejando uno fuera: la referencia `idx` se puntúa contra el
/// resto del pool y se devuelve la puntuación de su propia etiqueta.
pub fn leave_one_out_score(
    pool: &ReferencePool,
    idx: usize,
    params: &MatcherParams,
) -> Option<f64> {
    let item = &pool.items()[idx];
    let view = pool.excluding(item.source());
    let (scores, _metrics) = view.score(&item.sequence, params);
    scores.final_scores.get(&item.label).copied()
}

/// Calibra un umbral por etiqueta: `quantile(autopuntuaciones, q) * scale`.
///
/// Las pruebas dejando uno fuera se reparten con rayon y conservan el orden
/// del pool. Las etiquetas sin ninguna autopuntuación se omiten (sin umbral,
/// sin rechazo para ellas).
pub fn calibrate_thresholds(
    pool: &ReferencePool,
    params: &MatcherParams,
) -> MatchResult<ThresholdMap> {
    params.validate()?;

    let self_scores: Vec<Option<f64>> = (0..pool.len())
        .into_par_iter()
        .map(|idx| leave_one_out_score(pool, idx, params))
        .collect();

    let mut by_label: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (item, score) in pool.items().iter().zip(&self_scores) {
        let entry = by_label.entry(item.label.as_str()).or_default();
        if let Some(score) = score {
            entry.push(*score);
        }
    }

    let mut thresholds = ThresholdMap::new();
    for (label, scores) in by_label {
        if scores.is_empty() {
            warn!("Etiqueta '{}' sin autopuntuaciones: se omite su umbral", label);
            continue;
        }
        let threshold = quantile(&scores, params.reject_quantile)? * params.reject_scale;
        debug!(
            "Umbral '{}': {:.4} ({} autopuntuaciones)",
            label,
            threshold,
            scores.len()
        );
        thresholds.insert(label.to_string(), threshold);
    }

    info!(
        "Calibración completada: {} umbrales sobre {} referencias ({})",
        thresholds.len(),
        pool.len(),
        params.score_mode
    );
    Ok(thresholds)
}
