use std::fmt::Write as _;
use std::path::PathBuf;

use crate::evaluate::EvalReport;
use crate::fusion::ScoreMode;
use crate::gesture_classifier::{Classification, GestureClassifier};

/// Informe de texto de una clasificación: predicción, motivo de rechazo,
/// tabla de puntuaciones (final | dtw | xcorr) y los `top_k` vecinos.
pub fn format_classification(c: &Classification, mode: ScoreMode, top_k: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "prediction={}", c.result.label);
    if let Some(reason) = &c.result.reject_reason {
        let _ = writeln!(out, "reject_reason={}", reason);
    }
    let _ = writeln!(out, "score_mode={}", mode);

    let _ = writeln!(out, "label_scores (final | dtw | xcorr):");
    let mut ranked: Vec<(&String, f64)> = c
        .scores
        .final_scores
        .iter()
        .map(|(l, &s)| (l, s))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (label, score) in ranked {
        let dtw = c.scores.dtw_scores.get(label).copied().unwrap_or(f64::NAN);
        let xcorr = c.scores.xcorr_scores.get(label).copied().unwrap_or(f64::NAN);
        let _ = writeln!(out, "- {}: {:.4} | {:.4} | {:.4}", label, score, dtw, xcorr);
    }

    let _ = writeln!(out, "top_neighbors:");
    let k = top_k.clamp(1, c.neighbours.len().max(1));
    for (rank, m) in c.neighbours.iter().take(k).enumerate() {
        let _ = writeln!(
            out,
            "{}. label={} dist={:.4} xcorr={:.4} lag={} ref={}",
            rank + 1,
            m.label,
            m.dtw,
            m.xcorr,
            m.lag,
            m.source.display()
        );
    }
    out
}

/// Informe de evaluación: exactitud, macro-F1 y matriz de confusión
pub fn format_evaluation(report: &EvalReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "accuracy={:.4}", report.accuracy);
    let _ = writeln!(out, "macro_f1={:.4}", report.macro_f1);
    for (label, f1) in &report.per_label_f1 {
        let _ = writeln!(out, "  f1[{}]={:.4}", label, f1);
    }
    let _ = writeln!(out, "confusion_matrix:");
    out.push_str(&report.confusion.render());
    out
}

/// Resultado de reproducir varios CSV contra un mismo clasificador
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub report: String,
    pub files: usize,
    pub rejected: usize,
    pub failed: Vec<(PathBuf, anyhow::Error)>,
}

/// Clasifica cada CSV y acumula el informe; los fallos no detienen el
/// recorrido pero quedan en `failed`.
pub fn replay_csvs(classifier: &GestureClassifier, paths: &[PathBuf], top_k: usize) -> ReplaySummary {
    let mut summary = ReplaySummary {
        files: paths.len(),
        ..Default::default()
    };
    for path in paths {
        let _ = writeln!(summary.report, "\n== {}", path.display());
        match classifier.classify_csv(path) {
            Ok(outcome) => {
                if outcome.result.is_rejected() {
                    summary.rejected += 1;
                }
                summary.report.push_str(&format_classification(
                    &outcome,
                    classifier.params().score_mode,
                    top_k,
                ));
            }
            Err(e) => {
                let _ = writeln!(summary.report, "error: {:#}", e);
                summary.failed.push((path.clone(), e));
            }
        }
    }
    summary
}
