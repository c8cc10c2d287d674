use std::collections::BTreeSet;
use std::path::Path;

use crate::config::MatcherParams;
use crate::error::{MatchError, MatchResult};
use crate::fusion::{fuse_scores, LabelScores};
use crate::pair_metrics::{compute_pair_metrics, PairSettings};
use crate::types::{FeatureVector, LabeledSequence, PairMetric};

/// Conjunto de referencias preparadas, de solo lectura una vez cargado
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferencePool {
    items: Vec<LabeledSequence>,
}

impl ReferencePool {
    pub fn new(items: Vec<LabeledSequence>) -> MatchResult<Self> {
        if items.is_empty() {
            return Err(MatchError::EmptyReferencePool);
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[LabeledSequence] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Etiquetas presentes, ordenadas
    pub fn labels(&self) -> BTreeSet<String> {
        self.items.iter().map(|x| x.label.clone()).collect()
    }

    /// Vista completa del pool
    pub fn view(&self) -> PoolView<'_> {
        PoolView {
            items: &self.items,
            excluded: None,
        }
    }

    /// Vista sin las referencias cuyo origen coincide con `source`.
    /// La exclusión es por identidad de origen, nunca por etiqueta.
    pub fn excluding<'a>(&'a self, source: &'a Path) -> PoolView<'a> {
        PoolView {
            items: &self.items,
            excluded: Some(source),
        }
    }
}

/// Vista filtrada del pool sin copiar ni mutar las referencias
#[derive(Debug, Clone, Copy)]
pub struct PoolView<'a> {
    items: &'a [LabeledSequence],
    excluded: Option<&'a Path>,
}

impl<'a> PoolView<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a LabeledSequence> + '_ {
        let excluded = self.excluded;
        self.items
            .iter()
            .filter(move |item| excluded.map_or(true, |src| item.source != src))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Métricas por referencia y puntuaciones fusionadas para una consulta
    pub fn score(
        &self,
        query: &[FeatureVector],
        params: &MatcherParams,
    ) -> (LabelScores, Vec<PairMetric>) {
        let settings = PairSettings {
            window_frac: params.window_frac,
            xcorr_max_lag_frac: params.xcorr_max_lag_frac,
            xcorr_min_overlap_frac: params.xcorr_min_overlap_frac,
        };
        let metrics = compute_pair_metrics(query, self.iter(), &settings);
        let scores = fuse_scores(
            &metrics,
            params.per_label_k,
            params.score_mode,
            params.hybrid_alpha,
        );
        (scores, metrics)
    }
}
