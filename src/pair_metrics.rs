use crate::dtw::dtw_distance;
use crate::preprocess::round_half_even;
use crate::types::{FeatureVector, LabeledSequence, PairMetric};
use crate::xcorr::{best_lag, LagMatch};

/// Solape mínimo absoluto para la correlación cruzada
const MIN_OVERLAP_FLOOR: i64 = 4;

/// Fracciones que convierten longitudes en banda DTW, lag y solape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSettings {
    pub window_frac: f64,
    pub xcorr_max_lag_frac: f64,
    pub xcorr_min_overlap_frac: f64,
}

impl PairSettings {
    pub fn dtw_window(&self, query_len: usize, ref_len: usize) -> i64 {
        dtw_window(query_len, ref_len, self.window_frac)
    }

    pub fn max_lag(&self, query_len: usize, ref_len: usize) -> i64 {
        round_half_even(query_len.max(ref_len) as f64 * self.xcorr_max_lag_frac)
    }

    pub fn min_overlap(&self, query_len: usize, ref_len: usize) -> i64 {
        round_half_even(query_len.min(ref_len) as f64 * self.xcorr_min_overlap_frac)
            .max(MIN_OVERLAP_FLOOR)
    }
}

/// Banda DTW para un par de secuencias
pub fn dtw_window(query_len: usize, ref_len: usize, window_frac: f64) -> i64 {
    round_half_even(query_len.max(ref_len) as f64 * window_frac)
}

/// Calcula (DTW, correlación, lag) de la consulta contra cada referencia,
/// ordenado por distancia DTW ascendente.
pub fn compute_pair_metrics<'a, I>(
    query: &[FeatureVector],
    references: I,
    settings: &PairSettings,
) -> Vec<PairMetric>
where
    I: IntoIterator<Item = &'a LabeledSequence>,
{
    let mut out: Vec<PairMetric> = references
        .into_iter()
        .map(|item| {
            let (q, r) = (query.len(), item.len());
            let dtw = dtw_distance(query, &item.sequence, settings.dtw_window(q, r));
            let lag_match = best_lag(
                query,
                &item.sequence,
                settings.max_lag(q, r),
                settings.min_overlap(q, r),
            )
            .unwrap_or(LagMatch::NO_ALIGNMENT);

            PairMetric {
                label: item.label.clone(),
                source: item.source.clone(),
                dtw,
                xcorr: lag_match.corr,
                lag: lag_match.lag,
            }
        })
        .collect();

    // sort estable: en empate se conserva el orden del pool
    out.sort_by(|a, b| a.dtw.total_cmp(&b.dtw));
    out
}
