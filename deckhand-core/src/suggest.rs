//! "Did you mean" suggestions for unknown names.

/// Minimum similarity (0..=1) for a candidate to be suggested.
const SIMILARITY_CUTOFF: f64 = 0.3;

/// Return the candidate most similar to `name`, if any is close enough.
///
/// Comparison is case-insensitive. Similarity is the matching-blocks ratio
/// `2 * M / (len(a) + len(b))`, where `M` counts characters in the longest
/// common block and, recursively, in the blocks to its left and right.
pub fn closest_match<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle: Vec<char> = name.to_uppercase().chars().collect();
    let mut best: Option<(f64, &str)> = None;

    for candidate in candidates {
        let hay: Vec<char> = candidate.to_uppercase().chars().collect();
        let score = similarity(&needle, &hay);
        if score >= SIMILARITY_CUTOFF && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, c)| c.to_string())
}

fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * matching_chars(a, b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Earliest longest common substring as `(start in a, start in b, len)`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = curr[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}
