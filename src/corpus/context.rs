//! Sentence-clipped sliding context windows.
//!
//! A window for token i covers up to k values before and after it within the
//! same sentence, plus the token's own value wrapped in `«…»`. Windows never
//! cross sentence boundaries; positions past an edge are simply absent.

/// Append one window string per value in `values` (one sentence) to `out`.
pub fn sentence_windows(values: &[&str], half_width: usize, out: &mut Vec<String>) {
    for i in 0..values.len() {
        let lo = i.saturating_sub(half_width);
        let hi = (i + half_width + 1).min(values.len());
        let mut parts = Vec::with_capacity(hi - lo);
        for (j, value) in values.iter().enumerate().take(hi).skip(lo) {
            if j == i {
                parts.push(format!("«{value}»"));
            } else {
                parts.push((*value).to_string());
            }
        }
        out.push(parts.join(" "));
    }
}

/// Split a window string back into (left neighbors, target, right neighbors).
/// Returns `None` when no `«…»` target is present.
pub fn split_window(window: &str) -> Option<(Vec<&str>, &str, Vec<&str>)> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut target = None;
    for part in window.split_whitespace() {
        match part.strip_prefix('«').and_then(|p| p.strip_suffix('»')) {
            Some(t) => target = Some(t),
            None if target.is_none() => left.push(part),
            None => right.push(part),
        }
    }
    target.map(|t| (left, t, right))
}
