/// Numerically stable softmax of `logits / temperature`. The row max is
/// subtracted before exponentiating. An empty input yields an empty output.
///
/// Callers are responsible for supplying a positive temperature; the model
/// resolves non-positive requests to its stored default before calling in.
pub fn softmax_with_temperature(logits: &[f32], temperature: f32) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max_val = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut exp_values = Vec::with_capacity(logits.len());
    let mut sum = 0.0f32;
    for &v in logits {
        let e = ((v - max_val) / temperature).exp();
        exp_values.push(e);
        sum += e;
    }

    for e in exp_values.iter_mut() {
        *e /= sum;
    }
    exp_values
}

/// Index of the maximum value; first index wins on ties. Returns `None`
/// for an empty slice.
pub fn argmax(values: &[f32]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    Some(best)
}
