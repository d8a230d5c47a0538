//! Approximate string matching for parameter and type-suffix identification.
//!
//! The default scorer is the Ratcliff/Obershelp "gestalt" ratio: twice the
//! number of characters in recursively-found longest common blocks, divided by
//! the total length of both strings. Matching policy is injected through
//! [`SimilarityScorer`] so callers and tests can swap it out.

use std::collections::HashMap;

use crate::types::DEFAULT_SIMILARITY_CUTOFF;

// ---------------------------------------------------------------------------
// Scorer interface
// ---------------------------------------------------------------------------

/// A similarity policy: a score in `[0, 1]` and the threshold a candidate
/// must reach to count as a match.
pub trait SimilarityScorer: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;

    fn cutoff(&self) -> f64;

    /// The single closest candidate scoring at least [`cutoff`](Self::cutoff).
    /// Ties go to the lexicographically greatest candidate.
    fn closest<'a>(&self, word: &str, candidates: &[&'a str]) -> Option<&'a str> {
        let cutoff = self.cutoff();
        candidates
            .iter()
            .map(|&c| (self.similarity(c, word), c))
            .filter(|(score, _)| *score >= cutoff)
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, c)| c)
    }
}

/// Ratcliff/Obershelp similarity with a configurable cutoff.
#[derive(Debug, Clone, Copy)]
pub struct GestaltScorer {
    pub cutoff: f64,
}

impl GestaltScorer {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }
}

impl Default for GestaltScorer {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_CUTOFF)
    }
}

impl SimilarityScorer for GestaltScorer {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        gestalt_ratio(a, b)
    }

    fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

// ---------------------------------------------------------------------------
// Gestalt pattern matching
// ---------------------------------------------------------------------------

/// `2 * M / T` where `M` is the total size of the matching blocks and `T` the
/// combined length. Two empty strings are identical.
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks, found by taking the longest common
/// block and recursing into the unmatched pieces on either side.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        positions.entry(c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, &positions, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Longest block `a[i..i+k] == b[j..j+k]` within the given bounds. Among
/// equally long blocks the one starting earliest in `a`, then in `b`, wins.
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run length of the match ending at b[j], for the previous row of a
    let mut run: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_run = HashMap::new();
        if let Some(js) = positions.get(ch) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 { run.get(&(j - 1)).copied().unwrap_or(0) } else { 0 } + 1;
                next_run.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        run = next_run;
    }
    (best_i, best_j, best_size)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
