/// Norm substituted for zero-norm reference vectors so cosine scores stay
/// finite.
pub const ZERO_NORM_EPSILON: f64 = 1e-6;

/// Returns the L2 norm of `v`, accumulated in f64.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// Cosine similarity of two equal-length vectors with precomputed norms.
///
/// `query_norm` must be non-zero and `ref_norm` comes from
/// `reference_norm`. Uses f64 intermediate precision. The result is NaN
/// only when an input holds non-finite values.
pub(crate) fn cosine(query: &[f32], query_norm: f64, reference: &[f32], ref_norm: f64) -> f32 {
    (dot(query, reference) / (query_norm * ref_norm)) as f32
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as f64) * (y as f64))
        .sum()
}

/// Norm used for a stored row: zero-norm rows are scored against
/// [`ZERO_NORM_EPSILON`] instead of failing.
pub(crate) fn reference_norm(v: &[f32]) -> f64 {
    let norm = l2_norm(v);
    if norm == 0.0 { ZERO_NORM_EPSILON } else { norm }
}
