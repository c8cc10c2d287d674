use crate::error::{MatchError, MatchResult};
use crate::types::{FeatureVector, Sequence, NUM_CHANNELS};

/// Desviación mínima antes de considerar un canal constante
const STD_EPS: f64 = 1e-12;

/// Redondeo al par más cercano, igual que el usado al grabar los umbrales
pub(crate) fn round_half_even(x: f64) -> i64 {
    x.round_ties_even() as i64
}

/// Remuestrea a `max_points` puntos conservando siempre el primero y el último.
/// Con `max_points <= 0` o una secuencia más corta, devuelve la entrada intacta.
pub fn resample(seq: &[FeatureVector], max_points: i64) -> Sequence {
    let n = seq.len();
    if max_points <= 0 || n as i64 <= max_points {
        return seq.to_vec();
    }
    if max_points == 1 {
        return vec![seq[0]];
    }

    let points = max_points as usize;
    let step = (n - 1) as f64 / (points - 1) as f64;
    (0..points)
        .map(|i| {
            let idx = round_half_even(i as f64 * step).clamp(0, n as i64 - 1) as usize;
            seq[idx]
        })
        .collect()
}

/// Z-normaliza cada canal por separado (media 0, desviación 1).
/// Un canal constante se centra pero no se escala.
pub fn znormalize(seq: &[FeatureVector]) -> Sequence {
    if seq.is_empty() {
        return Vec::new();
    }

    let inv_n = 1.0 / seq.len() as f64;
    let mut means = [0.0f64; NUM_CHANNELS];
    for point in seq {
        for (c, x) in point.iter().enumerate() {
            means[c] += x;
        }
    }
    means.iter_mut().for_each(|m| *m *= inv_n);

    let mut vars = [0.0f64; NUM_CHANNELS];
    for point in seq {
        for (c, x) in point.iter().enumerate() {
            let d = x - means[c];
            vars[c] += d * d;
        }
    }

    let mut stds = [1.0f64; NUM_CHANNELS];
    for c in 0..NUM_CHANNELS {
        let std = (vars[c] * inv_n).sqrt();
        if std > STD_EPS {
            stds[c] = std;
        }
    }

    seq.iter()
        .map(|point| {
            let mut out = [0.0f64; NUM_CHANNELS];
            for c in 0..NUM_CHANNELS {
                out[c] = (point[c] - means[c]) / stds[c];
            }
            out
        })
        .collect()
}

/// Remuestrea y, si se pide, z-normaliza (en ese orden)
pub fn prepare(seq: &[FeatureVector], max_points: i64, use_znorm: bool) -> MatchResult<Sequence> {
    if seq.is_empty() {
        return Err(MatchError::EmptySequence { source_id: None });
    }
    let resampled = resample(seq, max_points);
    if use_znorm {
        Ok(znormalize(&resampled))
    } else {
        Ok(resampled)
    }
}
