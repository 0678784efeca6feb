//! Field comparators.
//!
//! Comparator selection is a closed enum rather than string-keyed dispatch,
//! so an unknown comparator is unrepresentable and every call site matches
//! exhaustively at compile time.
//!
//! All similarity outputs are normalized to [0.0, 1.0].

use serde::{Deserialize, Serialize};

/// Fuzzy string-similarity method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyMethod {
    /// Normalized Levenshtein edit distance.
    #[default]
    Levenshtein,
    /// Normalized Damerau-Levenshtein (transposition-aware).
    DamerauLevenshtein,
    /// Jaro-Winkler, prefix-boosted. Good for person names.
    JaroWinkler,
    /// Soundex phonetic codes: 1.0 on code equality, else 0.0.
    Soundex,
}

impl FuzzyMethod {
    /// Similarity of two strings in [0, 1]. Case-insensitive.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        match self {
            FuzzyMethod::Levenshtein => strsim::normalized_levenshtein(&a, &b),
            FuzzyMethod::DamerauLevenshtein => strsim::normalized_damerau_levenshtein(&a, &b),
            FuzzyMethod::JaroWinkler => strsim::jaro_winkler(&a, &b),
            FuzzyMethod::Soundex => {
                if soundex(&a) == soundex(&b) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// How a field participates in a match rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Case-insensitive string equality. A hard constraint: any exact field
    /// below 1.0 fails the whole rule.
    Exact,
    /// Normalized string distance with a selectable method.
    Fuzzy(FuzzyMethod),
    /// Cosine similarity of the two values' embeddings.
    Embedding,
}

impl Comparator {
    pub fn is_exact(&self) -> bool {
        matches!(self, Comparator::Exact)
    }
}

/// Exact comparator: 1.0 iff case-insensitive equality after trimming.
pub fn exact_similarity(a: &str, b: &str) -> f64 {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        1.0
    } else {
        0.0
    }
}

/// Cosine similarity between two dense vectors, clamped to [0, 1].
///
/// Returns 0.0 for empty, mismatched-length, or zero-norm inputs so that
/// degraded (zero) embeddings compare as dissimilar rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mag_a_sq: f32 = a.iter().map(|x| x * x).sum();
    let mag_b_sq: f32 = b.iter().map(|x| x * x).sum();
    if mag_a_sq == 0.0 || mag_b_sq == 0.0 {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let sim = dot / (mag_a_sq.sqrt() * mag_b_sq.sqrt());
    (sim as f64).clamp(0.0, 1.0)
}

/// American Soundex code of the first alphabetic run of `s`.
///
/// Non-alphabetic leading characters are skipped; an input with no letters
/// codes to "0000" so that two such inputs still compare equal.
pub fn soundex(s: &str) -> String {
    fn digit(c: char) -> Option<char> {
        match c.to_ascii_lowercase() {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    }

    let mut chars = s.chars().filter(|c| c.is_ascii_alphabetic());
    let first = match chars.next() {
        Some(c) => c.to_ascii_uppercase(),
        None => return "0000".to_string(),
    };

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut last = digit(first);

    for c in chars {
        let d = digit(c);
        match d {
            Some(d) if Some(d) != last => code.push(d),
            _ => {}
        }
        // 'h' and 'w' do not reset the run; vowels do.
        if !matches!(c.to_ascii_lowercase(), 'h' | 'w') {
            last = d;
        }
        if code.len() == 4 {
            break;
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}
