use crate::types::FeatureVector;

/// Distancia euclídea al cuadrado sobre los 6 canales
#[inline]
pub fn point_cost(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Ancho de banda efectivo: `window <= 0` significa sin límite, y nunca
/// menor que |n - m| para que exista un camino válido.
fn effective_window(n: usize, m: usize, window: i64) -> usize {
    let window = if window <= 0 {
        n.max(m)
    } else {
        window as usize
    };
    window.max(n.abs_diff(m))
}

/// DTW con banda Sakoe-Chiba entre `a` (n) y `b` (m).
///
/// Se mantienen solo dos filas de coste (memoria O(m)); en la fila `i` se
/// calculan las columnas `[max(1, i - w), min(m, i + w)]` y el resto queda
/// en infinito. Devuelve `cost[n][m]`.
pub fn dtw_distance(a: &[FeatureVector], b: &[FeatureVector], window: i64) -> f64 {
    let n = a.len();
    let m = b.len();
    let w = effective_window(n, m, window);

    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for i in 1..=n {
        let start = i.saturating_sub(w).max(1);
        let end = (i + w).min(m);

        // La fila siguiente solo lee [start - 1, end + 1] de esta; fuera de
        // ese rango pueden quedar valores de dos filas atrás que nunca se leen.
        curr[start - 1] = f64::INFINITY;
        if end < m {
            curr[end + 1] = f64::INFINITY;
        }
        for j in start..=end {
            let best_prev = curr[j - 1].min(prev[j]).min(prev[j - 1]);
            curr[j] = point_cost(&a[i - 1], &b[j - 1]) + best_prev;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}
