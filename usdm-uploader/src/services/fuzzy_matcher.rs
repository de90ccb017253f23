//! Fuzzy name matching against the OSB concept library
//!
//! Single best candidate above a similarity cutoff, over lower-cased strings.
//! The metric is pluggable; the default is `strsim::normalized_levenshtein`.

use std::sync::Arc;

/// Default similarity cutoff
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// String similarity in `[0.0, 1.0]`, 1.0 meaning identical
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Normalized Levenshtein edit-distance ratio
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl Similarity for NormalizedLevenshtein {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }
}

/// Sørensen–Dice bigram coefficient
#[derive(Debug, Clone, Copy, Default)]
pub struct SorensenDice;

impl Similarity for SorensenDice {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::sorensen_dice(a, b)
    }
}

/// Which candidate wins when several share the best score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    First,
    Last,
}

/// Best-single-candidate matcher
#[derive(Clone)]
pub struct FuzzyMatcher {
    cutoff: f64,
    tie_break: TieBreak,
    metric: Arc<dyn Similarity>,
}

impl std::fmt::Debug for FuzzyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzyMatcher")
            .field("cutoff", &self.cutoff)
            .field("tie_break", &self.tie_break)
            .finish()
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOFF)
    }
}

impl FuzzyMatcher {
    /// Matcher with the default metric; `cutoff` is clamped to `[0.0, 1.0]`
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff: cutoff.clamp(0.0, 1.0),
            tie_break: TieBreak::First,
            metric: Arc::new(NormalizedLevenshtein),
        }
    }

    pub fn with_metric(mut self, metric: Arc<dyn Similarity>) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Index of the best candidate scoring at least `cutoff`
    ///
    /// Both sides are lower-cased before scoring.
    pub fn best_index<'a, I>(&self, query: &str, candidates: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let query = query.to_lowercase();
        let mut best: Option<(usize, f64)> = None;

        for (index, candidate) in candidates.into_iter().enumerate() {
            let score = self.metric.score(&query, &candidate.to_lowercase());
            if score < self.cutoff {
                continue;
            }
            let better = match (best, self.tie_break) {
                (None, _) => true,
                (Some((_, s)), TieBreak::First) => score > s,
                (Some((_, s)), TieBreak::Last) => score >= s,
            };
            if better {
                best = Some((index, score));
            }
        }

        best.map(|(index, _)| index)
    }

    /// Best candidate scoring at least `cutoff`
    pub fn best_match<'a, I>(&self, query: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidates: Vec<&'a str> = candidates.into_iter().collect();
        self.best_index(query, candidates.iter().copied())
            .map(|i| candidates[i])
    }

    /// Whether any candidate scores at least `cutoff`
    pub fn matches_any<'a, I>(&self, query: &str, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.best_index(query, candidates).is_some()
    }
}
