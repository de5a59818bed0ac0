//! Typo-tolerant similarity scoring for symbol search
//!
//! Scores lie in `0.0..=1.0`. Only an exact (case-insensitive) match scores
//! `1.0`; substring hits score at most `0.9` and subsequence hits at most
//! `0.95`.

/// Upper bound for subsequence matches
pub const SUBSEQUENCE_CAP: f64 = 0.95;

/// Similarity of `target` to `query`, case-insensitive
///
/// An empty query matches nothing.
pub fn fuzzy_score(query: &str, target: &str) -> f64 {
    if query.is_empty() || target.is_empty() {
        return 0.0;
    }

    let query = query.to_lowercase();
    let target = target.to_lowercase();

    if query == target {
        return 1.0;
    }

    if let Some(byte_index) = target.find(&query) {
        let index = target[..byte_index].chars().count();
        return (0.9 - 0.1 * index as f64).max(0.0);
    }

    subsequence_score(&query, &target)
}

/// Ordered-subsequence score, zero unless every query character occurs in
/// order in the target
fn subsequence_score(query: &str, target: &str) -> f64 {
    let query: Vec<char> = query.chars().collect();
    let target: Vec<char> = target.chars().collect();

    let mut matched = 0usize;
    let mut longest_run = 0usize;
    let mut run = 0usize;
    let mut cursor = 0usize;
    let mut previous: Option<usize> = None;

    for &ch in &query {
        let Some(found) = target[cursor..].iter().position(|&c| c == ch) else {
            return 0.0;
        };
        let position = cursor + found;
        matched += 1;
        run = match previous {
            Some(p) if p + 1 == position => run + 1,
            _ => 1,
        };
        longest_run = longest_run.max(run);
        previous = Some(position);
        cursor = position + 1;
    }

    let query_len = query.len() as f64;
    let target_len = target.len() as f64;
    let matched = matched as f64;
    let score = 0.5 * (matched / query_len)
        + 0.3 * (matched / target_len)
        + 0.2 * (longest_run as f64 / query_len);
    score.min(SUBSEQUENCE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[rstest]
    #[case("name", "name", 1.0)]
    #[case("NAME", "Name", 1.0)]
    #[case("pat", "Patient", 0.9)]
    #[case("tient", "Patient", 0.7)]
    #[case("", "Patient", 0.0)]
    #[case("xyz", "abc", 0.0)]
    fn test_fuzzy_score(#[case] query: &str, #[case] target: &str, #[case] expected: f64) {
        assert!(close(fuzzy_score(query, target), expected), "{query} vs {target}");
    }

    #[test]
    fn test_far_substring_does_not_go_negative() {
        assert_eq!(fuzzy_score("z", "abcdefghijklz"), 0.0);
    }

    #[test]
    fn test_subsequence_formula() {
        // "bd" in "birthdate": b then d, not adjacent
        let expected = 0.5 * (2.0 / 2.0) + 0.3 * (2.0 / 9.0) + 0.2 * (1.0 / 2.0);
        assert!(close(fuzzy_score("bd", "birthDate"), expected));
    }

    #[test]
    fn test_abbreviation_scores_below_exact_and_above_threshold() {
        let score = fuzzy_score("gvn", "given");
        assert!(score < 1.0);
        assert!(score > 0.3);
        assert!(score <= SUBSEQUENCE_CAP);
        assert_eq!(fuzzy_score("nmae", "name"), 0.0);
    }

    #[test]
    fn test_exact_beats_every_partial_match() {
        for target in ["names", "givenName", "n_a_m_e"] {
            assert!(fuzzy_score("name", target) < fuzzy_score("name", "name"));
        }
    }
}
