//! Filtering, ranking and capping of completion candidates
//!
//! Order of operations:
//! 1. Semantic post-filters (scope, cardinality, context), each optional
//! 2. Token filter: case-insensitive prefix, substring fallback when fuzzy
//! 3. Sort: exact token match first, then bucket, then score or label
//! 4. Cap, then rewrite sort keys so clients reproduce the order

use super::candidate::{CompletionCandidate, CompletionKind};
use super::registry::LanguageRegistry;
use super::usage::UsageTracker;
use crate::config::{CompletionConfig, PriorityWeighting, SemanticFiltering};
use std::cmp::Ordering;

/// Element and function names that are used in most expressions
const COMMON_LABELS: &[&str] = &[
    "id", "name", "status", "code", "value", "identifier", "subject", "type", "text", "given",
    "family", "system", "display", "where", "exists", "first", "select", "count", "empty",
];

pub(crate) fn is_common_label(label: &str) -> bool {
    COMMON_LABELS.contains(&label)
}

/// Facts about the cursor position that drive the semantic filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterContext<'a> {
    /// Token under the cursor, empty when none
    pub token: &'a str,
    pub is_after_dot: bool,
    pub is_in_brackets: bool,
    pub has_previous_token: bool,
    /// Whether the navigated element may hold several values, if known
    pub target_is_collection: Option<bool>,
}

/// Criteria for ranking completion results
#[derive(Debug, Clone, PartialEq)]
pub struct RankingCriteria {
    /// Cap on returned candidates
    pub max_results: usize,
    /// Order by bucket, then score or label
    pub sort_by_relevance: bool,
    /// Additive score weights; lexical order within a bucket when absent
    pub weighting: Option<PriorityWeighting>,
}

impl RankingCriteria {
    /// Criteria for a request, `filtered` when a token narrowed the list
    pub fn from_config(config: &CompletionConfig, filtered: bool) -> Self {
        Self {
            max_results: if filtered {
                config.filtered_max_suggestions
            } else {
                config.max_suggestions
            },
            sort_by_relevance: config.sort_by_relevance,
            weighting: config.priority_weighting,
        }
    }
}

/// Apply the enabled semantic filters
pub fn apply_semantic_filters(
    candidates: Vec<CompletionCandidate>,
    context: &FilterContext<'_>,
    filtering: &SemanticFiltering,
    registry: &LanguageRegistry,
) -> Vec<CompletionCandidate> {
    candidates
        .into_iter()
        .filter(|c| !filtering.filter_by_scope || in_scope(c, context))
        .filter(|c| {
            !filtering.filter_by_cardinality
                || context.target_is_collection != Some(false)
                || !(c.kind == CompletionKind::Function && registry.is_collection_function(&c.label))
        })
        .filter(|c| !filtering.filter_by_context || fits_context(c, context))
        .collect()
}

fn in_scope(candidate: &CompletionCandidate, context: &FilterContext<'_>) -> bool {
    if context.is_after_dot {
        return matches!(
            candidate.kind,
            CompletionKind::Property | CompletionKind::Function | CompletionKind::Snippet
        );
    }
    if !context.has_previous_token {
        // Binary operators need a left operand
        return !matches!(candidate.kind, CompletionKind::Operator | CompletionKind::Keyword);
    }
    true
}

fn fits_context(candidate: &CompletionCandidate, context: &FilterContext<'_>) -> bool {
    !context.is_in_brackets
        || matches!(
            candidate.kind,
            CompletionKind::Value | CompletionKind::Variable | CompletionKind::Property
        )
}

/// Keep candidates matching `token`
///
/// Returns the survivors and whether the token narrowed the list. With
/// `fuzzy`, substring containment is accepted when nothing matches by prefix.
pub fn filter_by_token(
    candidates: Vec<CompletionCandidate>,
    token: &str,
    fuzzy: bool,
) -> (Vec<CompletionCandidate>, bool) {
    if token.is_empty() {
        return (candidates, false);
    }
    let needle = token.to_lowercase();
    let (prefixed, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.label.to_lowercase().starts_with(&needle));
    if !prefixed.is_empty() || !fuzzy {
        return (prefixed, true);
    }
    let contained = rest
        .into_iter()
        .filter(|c| c.label.to_lowercase().contains(&needle))
        .collect();
    (contained, true)
}

/// Additive relevance score, higher is better
pub fn calculate_score(
    candidate: &CompletionCandidate,
    weighting: &PriorityWeighting,
    usage: &UsageTracker,
) -> f64 {
    let common = if is_common_label(&candidate.label) {
        weighting.common_elements
    } else {
        0.0
    };

    let uses = f64::from(usage.count(&candidate.label));
    let recent = (uses * weighting.recently_used).min(3.0 * weighting.recently_used);

    let relevant = candidate.kind == CompletionKind::Property
        && (candidate.metadata.required || !candidate.metadata.is_inherited);
    let relevance = if relevant { weighting.type_relevance } else { 0.0 };

    common + recent + relevance
}

/// Sort, cap and assign sort keys
pub fn rank_completions(
    candidates: Vec<CompletionCandidate>,
    token: &str,
    criteria: &RankingCriteria,
    usage: &UsageTracker,
) -> Vec<CompletionCandidate> {
    let needle = token.to_lowercase();
    let mut scored: Vec<(f64, CompletionCandidate)> = candidates
        .into_iter()
        .map(|c| {
            let score = criteria
                .weighting
                .as_ref()
                .map_or(0.0, |w| calculate_score(&c, w, usage));
            (score, c)
        })
        .collect();

    let is_exact = |c: &CompletionCandidate| !needle.is_empty() && c.label.to_lowercase() == needle;

    scored.sort_by(|(score_a, a), (score_b, b)| {
        let exact = is_exact(b).cmp(&is_exact(a));
        if exact != Ordering::Equal || !criteria.sort_by_relevance {
            return exact;
        }
        a.bucket()
            .cmp(&b.bucket())
            .then_with(|| match criteria.weighting {
                Some(_) => score_b.partial_cmp(score_a).unwrap_or(Ordering::Equal),
                None => Ordering::Equal,
            })
            .then_with(|| a.label.cmp(&b.label))
    });

    scored.truncate(criteria.max_results);

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (_, mut candidate))| {
            candidate.sort_key = format!("{}_{index:04}", candidate.bucket());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::candidate::CandidateMetadata;
    use pretty_assertions::assert_eq;

    fn property(label: &str) -> CompletionCandidate {
        CompletionCandidate::new(label, CompletionKind::Property)
    }

    fn inherited(label: &str) -> CompletionCandidate {
        property(label).with_metadata(CandidateMetadata {
            is_inherited: true,
            ..Default::default()
        })
    }

    fn labels(candidates: &[CompletionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.label.as_str()).collect()
    }

    fn criteria() -> RankingCriteria {
        RankingCriteria::from_config(&CompletionConfig::default(), false)
    }

    #[test]
    fn test_prefix_filter_is_case_insensitive() {
        let (kept, filtered) = filter_by_token(
            vec![property("name"), property("birthDate"), property("Narrative")],
            "na",
            true,
        );
        assert!(filtered);
        assert_eq!(labels(&kept), vec!["name", "Narrative"]);
    }

    #[test]
    fn test_substring_fallback_only_when_fuzzy() {
        let candidates = vec![property("birthDate"), property("gender")];
        let (kept, _) = filter_by_token(candidates.clone(), "date", true);
        assert_eq!(labels(&kept), vec!["birthDate"]);
        let (kept, _) = filter_by_token(candidates, "date", false);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_substring_not_used_when_prefix_matches_exist() {
        let (kept, _) = filter_by_token(vec![property("given"), property("forgiven")], "giv", true);
        assert_eq!(labels(&kept), vec!["given"]);
    }

    #[test]
    fn test_buckets_then_lexical() {
        let usage = UsageTracker::new(10);
        let ranked = rank_completions(
            vec![
                CompletionCandidate::new("where", CompletionKind::Function),
                inherited("meta"),
                property("name"),
                property("gender"),
                CompletionCandidate::new("and", CompletionKind::Keyword),
            ],
            "",
            &criteria(),
            &usage,
        );
        assert_eq!(labels(&ranked), vec!["gender", "name", "meta", "where", "and"]);
        assert_eq!(ranked[0].sort_key, "0_0000");
        assert_eq!(ranked[2].sort_key, "1_0002");
        let mut keys: Vec<_> = ranked.iter().map(|c| c.sort_key.clone()).collect();
        keys.sort();
        assert_eq!(keys, ranked.iter().map(|c| c.sort_key.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn test_exact_match_promoted_above_buckets() {
        let usage = UsageTracker::new(10);
        let ranked = rank_completions(
            vec![property("exists"), CompletionCandidate::new("exists", CompletionKind::Function)],
            "Exists",
            &criteria(),
            &usage,
        );
        assert_eq!(ranked.len(), 2);

        let ranked = rank_completions(
            vec![property("countryCode"), CompletionCandidate::new("count", CompletionKind::Function)],
            "count",
            &criteria(),
            &usage,
        );
        assert_eq!(labels(&ranked), vec!["count", "countryCode"]);
    }

    #[test]
    fn test_weighting_orders_within_bucket() {
        let usage = UsageTracker::new(10);
        for _ in 0..10 {
            usage.record("zeta");
        }
        let mut criteria = criteria();
        criteria.weighting = Some(PriorityWeighting::default());
        let ranked = rank_completions(
            vec![property("alpha"), property("zeta"), inherited("beta")],
            "",
            &criteria,
            &usage,
        );
        assert_eq!(labels(&ranked), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn test_usage_bonus_is_capped() {
        let usage = UsageTracker::new(10);
        let weighting = PriorityWeighting {
            common_elements: 0.0,
            recently_used: 1.0,
            type_relevance: 0.0,
        };
        for _ in 0..10 {
            usage.record("alpha");
        }
        assert_eq!(calculate_score(&property("alpha"), &weighting, &usage), 3.0);
    }

    #[test]
    fn test_cap_uses_filtered_limit() {
        let config = CompletionConfig::default();
        assert_eq!(RankingCriteria::from_config(&config, true).max_results, 30);
        let usage = UsageTracker::new(10);
        let many: Vec<_> = (0..80).map(|i| property(&format!("p{i:02}"))).collect();
        let ranked = rank_completions(many, "", &RankingCriteria::from_config(&config, false), &usage);
        assert_eq!(ranked.len(), 50);
    }

    #[test]
    fn test_scope_filter_after_dot() {
        let registry = LanguageRegistry::fhirpath();
        let context = FilterContext {
            is_after_dot: true,
            has_previous_token: true,
            ..Default::default()
        };
        let kept = apply_semantic_filters(
            vec![
                property("name"),
                CompletionCandidate::new("where", CompletionKind::Function),
                CompletionCandidate::new("and", CompletionKind::Keyword),
                CompletionCandidate::new("true", CompletionKind::Value),
            ],
            &context,
            &SemanticFiltering::default(),
            &registry,
        );
        assert_eq!(labels(&kept), vec!["name", "where"]);
    }

    #[test]
    fn test_cardinality_filter_drops_collection_functions_on_singletons() {
        let registry = LanguageRegistry::fhirpath();
        let candidates = vec![
            CompletionCandidate::new("first", CompletionKind::Function),
            CompletionCandidate::new("exists", CompletionKind::Function),
        ];
        let singleton = FilterContext {
            is_after_dot: true,
            target_is_collection: Some(false),
            ..Default::default()
        };
        let kept = apply_semantic_filters(
            candidates.clone(),
            &singleton,
            &SemanticFiltering::default(),
            &registry,
        );
        assert_eq!(labels(&kept), vec!["exists"]);

        let disabled = SemanticFiltering {
            filter_by_cardinality: false,
            ..Default::default()
        };
        assert_eq!(apply_semantic_filters(candidates, &singleton, &disabled, &registry).len(), 2);
    }

    #[test]
    fn test_context_filter_in_brackets() {
        let registry = LanguageRegistry::fhirpath();
        let context = FilterContext {
            is_in_brackets: true,
            has_previous_token: true,
            ..Default::default()
        };
        let kept = apply_semantic_filters(
            vec![
                CompletionCandidate::new("$index", CompletionKind::Variable),
                CompletionCandidate::new("where", CompletionKind::Function),
            ],
            &context,
            &SemanticFiltering::default(),
            &registry,
        );
        assert_eq!(labels(&kept), vec!["$index"]);
    }
}
