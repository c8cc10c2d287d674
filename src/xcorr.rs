use crate::types::{FeatureVector, NUM_CHANNELS};

/// Mejor desplazamiento encontrado por la búsqueda de lag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagMatch {
    /// Correlación media por muestra y canal, en [-1, 1]
    pub corr: f64,
    /// Desplazamiento de `a` respecto a `b` (positivo: `a` adelantada)
    pub lag: i64,
}

impl LagMatch {
    /// Valor que se reporta cuando ningún lag cumple el solape mínimo.
    /// No es una anticorrelación real: equivale a "sin señal".
    pub const NO_ALIGNMENT: LagMatch = LagMatch { corr: -1.0, lag: 0 };
}

/// Busca el lag en `[-max_lag, max_lag]` que maximiza la correlación
/// normalizada entre `a` y `b`.
///
/// Los lags se recorren en orden ascendente y solo se acepta una correlación
/// estrictamente mayor, así que en empate gana el lag más negativo.
/// Devuelve `None` si ningún lag alcanza `min_overlap` muestras de solape.
pub fn best_lag(
    a: &[FeatureVector],
    b: &[FeatureVector],
    max_lag: i64,
    min_overlap: i64,
) -> Option<LagMatch> {
    let n = a.len() as i64;
    let m = b.len() as i64;
    let max_lag = max_lag.max(0);
    let min_overlap = min_overlap.max(1);

    let mut best = LagMatch::NO_ALIGNMENT;
    let mut any_valid = false;
    for lag in -max_lag..=max_lag {
        let (a0, b0, overlap) = if lag >= 0 {
            (lag, 0, (n - lag).min(m))
        } else {
            (0, -lag, n.min(m + lag))
        };
        if overlap < min_overlap {
            continue;
        }

        let a_slice = &a[a0 as usize..(a0 + overlap) as usize];
        let b_slice = &b[b0 as usize..(b0 + overlap) as usize];
        let dot: f64 = a_slice
            .iter()
            .zip(b_slice)
            .map(|(pa, pb)| pa.iter().zip(pb).map(|(x, y)| x * y).sum::<f64>())
            .sum();
        let corr = (dot / (overlap as f64 * NUM_CHANNELS as f64)).clamp(-1.0, 1.0);

        any_valid = true;
        if corr > best.corr {
            best = LagMatch { corr, lag };
        }
    }

    any_valid.then_some(best)
}
