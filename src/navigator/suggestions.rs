//! "Did you mean" selection for unknown property names

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Best candidate for a misspelled name
///
/// Case-insensitive edit distance; ties go to the shorter candidate, then to
/// the lexically smaller one. Candidates sharing less than 30% of the longer
/// name are not suggested.
pub fn closest_match<'a, I>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let target_lower = target.to_lowercase();
    let target_len = target_lower.chars().count();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let lower = candidate.to_lowercase();
            let distance = levenshtein_distance(&target_lower, &lower);
            let longest = target_len.max(lower.chars().count()).max(1);
            let similarity = 1.0 - distance as f64 / longest as f64;
            (similarity > 0.3).then_some((distance, candidate))
        })
        .min_by(|(da, a), (db, b)| da.cmp(db).then(a.len().cmp(&b.len())).then(a.cmp(b)))
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("a", ""), 1);
        assert_eq!(levenshtein_distance("", "a"), 1);
    }

    #[test]
    fn test_closest_match_is_case_insensitive() {
        let names = ["name", "gender", "birthDate"];
        assert_eq!(closest_match("nme", names).as_deref(), Some("name"));
        assert_eq!(closest_match("BIRTHDATE", names).as_deref(), Some("birthDate"));
    }

    #[test]
    fn test_ties_prefer_shorter_then_lexical() {
        // "cat" is one edit from all three
        assert_eq!(closest_match("cat", ["cats", "bat", "car"]).as_deref(), Some("bat"));
        assert_eq!(closest_match("ab", ["abcd", "abc"]).as_deref(), Some("abc"));
    }

    #[test]
    fn test_unrelated_names_are_not_suggested() {
        assert_eq!(closest_match("xyz", ["identifier", "telecom"]), None);
        assert_eq!(closest_match("nme", std::iter::empty()), None);
    }
}
