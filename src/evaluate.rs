use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::config::EvalParams;
use crate::dtw::dtw_distance;
use crate::error::{MatchError, MatchResult};
use crate::pair_metrics::dtw_window;
use crate::preprocess::round_half_even;
use crate::types::{FeatureVector, LabeledSequence};

/// Vecino de un k-NN: (distancia DTW, etiqueta, origen)
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour {
    pub distance: f64,
    pub label: String,
    pub source: PathBuf,
}

/// Particiones train/test
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<LabeledSequence>,
    pub test: Vec<LabeledSequence>,
}

/// Divide cada etiqueta por separado tras un barajado con semilla.
/// `n_test = clamp(round(r * test_ratio), 1, r - 1)` para `r` muestras.
pub fn split_stratified(
    items: &[LabeledSequence],
    test_ratio: f64,
    seed: u64,
) -> MatchResult<Split> {
    let mut grouped: BTreeMap<&str, Vec<&LabeledSequence>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.label.as_str()).or_default().push(item);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (label, mut rows) in grouped {
        let r = rows.len();
        if r < 2 {
            return Err(MatchError::InsufficientSamples {
                label: label.to_string(),
                count: r,
            });
        }
        rows.shuffle(&mut rng);
        let n_test = (round_half_even(r as f64 * test_ratio).max(1) as usize).min(r - 1);
        test.extend(rows[..n_test].iter().map(|x| (*x).clone()));
        train.extend(rows[n_test..].iter().map(|x| (*x).clone()));
    }
    Ok(Split { train, test })
}

/// k-NN por mayoría sobre distancias DTW crudas.
/// Empates de votos: gana la etiqueta lexicográficamente menor.
pub fn classify_knn(
    query: &[FeatureVector],
    train: &[LabeledSequence],
    k: usize,
    window_frac: f64,
) -> Option<(String, Vec<Neighbour>)> {
    let mut dists: Vec<Neighbour> = train
        .iter()
        .map(|item| Neighbour {
            distance: dtw_distance(
                query,
                &item.sequence,
                dtw_window(query.len(), item.len(), window_frac),
            ),
            label: item.label.clone(),
            source: item.source.clone(),
        })
        .collect();
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    dists.truncate(k.clamp(1, dists.len()));

    let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
    for n in &dists {
        *votes.entry(n.label.as_str()).or_insert(0) += 1;
    }
    // BTreeMap recorre en orden: con `>` estricto se queda la menor en empate
    let mut winner: Option<(&str, usize)> = None;
    for (label, count) in votes {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((label, count));
        }
    }
    let label = winner.map(|(l, _)| l.to_string())?;
    Some((label, dists))
}

/// Matriz de confusión: verdad -> predicción -> cuenta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: BTreeMap<(String, String), usize>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[String], y_pred: &[String]) -> Self {
        let labels: BTreeSet<String> = y_true.iter().chain(y_pred).cloned().collect();
        let mut counts = BTreeMap::new();
        for (t, p) in y_true.iter().zip(y_pred) {
            *counts.entry((t.clone(), p.clone())).or_insert(0) += 1;
        }
        Self {
            labels: labels.into_iter().collect(),
            counts,
        }
    }

    pub fn get(&self, truth: &str, predicted: &str) -> usize {
        self.counts
            .get(&(truth.to_string(), predicted.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Tabla de texto con cabecera `truth\pred`
    pub fn render(&self) -> String {
        let longest = self.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = 10.max(longest + 2);
        let mut out = String::new();
        let _ = write!(out, "{:<width$}", "truth\\pred", width = width);
        for l in &self.labels {
            let _ = write!(out, "{:<width$}", l, width = width);
        }
        out.push('\n');
        for t in &self.labels {
            let _ = write!(out, "{:<width$}", t, width = width);
            for p in &self.labels {
                let _ = write!(out, "{:<width$}", self.get(t, p), width = width);
            }
            out.push('\n');
        }
        out
    }
}

/// Resultado de una evaluación
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: f64,
    pub per_label_f1: BTreeMap<String, f64>,
    pub macro_f1: f64,
    pub confusion: ConfusionMatrix,
}

/// Exactitud, F1 por etiqueta y macro-F1
pub fn score_predictions(
    y_true: &[String],
    y_pred: &[String],
) -> (f64, BTreeMap<String, f64>, f64) {
    let total = y_true.len();
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };

    let labels: BTreeSet<&String> = y_true.iter().chain(y_pred).collect();
    let mut per_label = BTreeMap::new();
    for label in labels {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (t, p) in y_true.iter().zip(y_pred) {
            match (t == label, p == label) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_label.insert(label.clone(), f1);
    }
    let macro_f1 = if per_label.is_empty() {
        0.0
    } else {
        per_label.values().sum::<f64>() / per_label.len() as f64
    };
    (accuracy, per_label, macro_f1)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Partición estratificada + k-NN sobre DTW + métricas
pub fn evaluate(items: &[LabeledSequence], params: &EvalParams) -> MatchResult<EvalReport> {
    params.validate()?;
    if items.is_empty() {
        return Err(MatchError::EmptySelection {
            reason: "no hay muestras para evaluar".to_string(),
        });
    }

    let split = split_stratified(items, params.test_ratio, params.seed)?;
    debug!(
        "train={} test={} k={}",
        split.train.len(),
        split.test.len(),
        params.k
    );

    let mut y_true = Vec::with_capacity(split.test.len());
    let mut y_pred = Vec::with_capacity(split.test.len());
    for item in &split.test {
        let (pred, _neighbours) =
            classify_knn(&item.sequence, &split.train, params.k, params.window_frac).ok_or_else(
                || MatchError::EmptySelection {
                    reason: "partición de entrenamiento vacía".to_string(),
                },
            )?;
        y_true.push(item.label.clone());
        y_pred.push(pred);
    }

    let (accuracy, per_label_f1, macro_f1) = score_predictions(&y_true, &y_pred);
    Ok(EvalReport {
        train_size: split.train.len(),
        test_size: split.test.len(),
        accuracy,
        per_label_f1,
        macro_f1,
        confusion: ConfusionMatrix::from_predictions(&y_true, &y_pred),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_items(label: &str, value: f64, count: usize) -> Vec<LabeledSequence> {
        (0..count)
            .map(|i| {
                let v = value + i as f64 * 0.01;
                LabeledSequence::new(label, format!("{}_{:02}.csv", label, i), vec![[v; 6]; 15])
            })
            .collect()
    }

    fn two_label_pool() -> Vec<LabeledSequence> {
        let mut items = constant_items("low", 0.0, 10);
        items.extend(constant_items("high", 10.0, 10));
        items
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let items = two_label_pool();
        let a = split_stratified(&items, 0.3, 7).unwrap();
        let b = split_stratified(&items, 0.3, 7).unwrap();
        assert_eq!(a.test.len(), 6);
        assert_eq!(a.train.len(), 14);
        let sources = |v: &[LabeledSequence]| v.iter().map(|x| x.source.clone()).collect::<Vec<_>>();
        assert_eq!(sources(&a.test[..]), sources(&b.test[..]));
        assert_eq!(sources(&a.train[..]), sources(&b.train[..]));
        for label in ["low", "high"] {
            assert_eq!(a.test.iter().filter(|x| x.label == label).count(), 3);
        }
    }

    #[test]
    fn test_split_clamps_test_count() {
        let items = constant_items("a", 0.0, 2);
        let split = split_stratified(&items, 0.9, 1).unwrap();
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.train.len(), 1);

        let split = split_stratified(&constant_items("a", 0.0, 3), 0.01, 1).unwrap();
        assert_eq!(split.test.len(), 1);
    }

    #[test]
    fn test_split_requires_two_samples() {
        let mut items = constant_items("a", 0.0, 4);
        items.extend(constant_items("b", 1.0, 1));
        match split_stratified(&items, 0.3, 7) {
            Err(MatchError::InsufficientSamples { label, count }) => {
                assert_eq!(label, "b");
                assert_eq!(count, 1);
            }
            other => panic!("se esperaba InsufficientSamples, obtenido {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_knn_tie_prefers_smaller_label() {
        let train = vec![
            LabeledSequence::new("zeta", "z.csv", vec![[1.0; 6]; 5]),
            LabeledSequence::new("alfa", "a.csv", vec![[-1.0; 6]; 5]),
        ];
        let query = vec![[0.0; 6]; 5];
        let (label, neighbours) = classify_knn(&query, &train, 2, 0.2).unwrap();
        assert_eq!(label, "alfa");
        assert_eq!(neighbours.len(), 2);
    }

    #[test]
    fn test_knn_majority() {
        let train = vec![
            LabeledSequence::new("a", "a1", vec![[0.0; 6]; 5]),
            LabeledSequence::new("b", "b1", vec![[0.1; 6]; 5]),
            LabeledSequence::new("b", "b2", vec![[0.2; 6]; 5]),
            LabeledSequence::new("a", "a2", vec![[5.0; 6]; 5]),
        ];
        let query = vec![[0.0; 6]; 5];
        assert_eq!(classify_knn(&query, &train, 1, 0.2).unwrap().0, "a");
        assert_eq!(classify_knn(&query, &train, 3, 0.2).unwrap().0, "b");
        assert!(classify_knn(&query, &[], 3, 0.2).is_none());
    }

    #[test]
    fn test_perfectly_separable_evaluation() {
        let report = evaluate(&two_label_pool(), &EvalParams::default()).unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_f1, 1.0);
        assert_eq!(report.test_size, 6);
        assert_eq!(report.confusion.get("low", "low"), 3);
        assert_eq!(report.confusion.get("low", "high"), 0);
    }

    #[test]
    fn test_metrics_with_errors() {
        let y_true: Vec<String> = ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        let y_pred: Vec<String> = ["a", "b", "b", "c"].iter().map(|s| s.to_string()).collect();
        let (acc, per_label, macro_f1) = score_predictions(&y_true, &y_pred);
        assert_eq!(acc, 0.5);
        // a: p=1, r=0.5 -> 2/3 ; b: p=0.5, r=0.5 -> 0.5 ; c: 0
        assert!((per_label["a"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((per_label["b"] - 0.5).abs() < 1e-12);
        assert_eq!(per_label["c"], 0.0);
        assert!((macro_f1 - (2.0 / 3.0 + 0.5) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_render() {
        let y_true: Vec<String> = vec!["idle".into(), "swipe_left".into()];
        let y_pred: Vec<String> = vec!["idle".into(), "idle".into()];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred);
        let text = cm.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("truth\\pred  idle"));
        assert_eq!(cm.get("swipe_left", "idle"), 1);
        assert_eq!(lines[2].split_whitespace().collect::<Vec<_>>(), vec!["swipe_left", "1", "0"]);
    }

    #[test]
    fn test_confusion_render_width_counts_chars() {
        // "acción_izquierda": 16 caracteres, 17 bytes -> ancho 18
        let y_true: Vec<String> = vec!["acción_izquierda".into(), "idle".into()];
        let y_pred: Vec<String> = vec!["acción_izquierda".into(), "idle".into()];
        let text = ConfusionMatrix::from_predictions(&y_true, &y_pred).render();
        for line in text.lines() {
            assert_eq!(line.chars().count(), 3 * 18, "{:?}", line);
        }
    }
}
