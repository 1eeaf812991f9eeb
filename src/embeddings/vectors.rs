//! Vector operations for embeddings.
//!
//! Unlike a general-purpose linear algebra helper, these never fail: a dimension
//! mismatch or a zero-magnitude vector yields a similarity of `0.0`.

pub type Vector = Vec<f32>;

/// `None` when dimensions differ.
pub fn dot_product(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize in place. A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x /= mag;
    }
}

pub fn normalize_vector(v: &[f32]) -> Vector {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}

/// Cosine similarity in `[-1, 1]`; `0.0` for mismatched dimensions or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let Some(dot) = dot_product(a, b) else {
        return 0.0;
    };
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
