//! "Did you mean" suggestions.

/// Largest edit distance still offered as a suggestion.
pub const MAX_DISTANCE: usize = 3;

/// Closest candidate to `target` within [`MAX_DISTANCE`] edits.
///
/// Ties go to the earliest candidate, so callers should pass a sorted set
/// for stable output. An exact match is not a suggestion.
pub fn find_closest<'a, I>(target: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|c| *c != target)
        .filter_map(|c| {
            let dist = strsim::levenshtein(target, c);
            if dist <= MAX_DISTANCE {
                Some((c, dist))
            } else {
                None
            }
        })
        .min_by_key(|(_, d)| *d)
        .map(|(s, _)| s)
}

/// `Did you mean 'x'?`, when a close candidate exists.
pub fn did_you_mean<'a, I>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    find_closest(target, candidates).map(|s| format!("Did you mean '{s}'?"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_closest_within_distance() {
        let names = ["collection", "customer", "product"];
        assert_eq!(find_closest("prodcut", names), Some("product"));
        assert_eq!(find_closest("custmer", names), Some("customer"));
    }

    #[test]
    fn test_too_far() {
        assert_eq!(find_closest("zzzzzzz", ["product"]), None);
    }

    #[test]
    fn test_first_of_equal_distance_wins() {
        assert_eq!(find_closest("ab", ["aa", "bb"]), Some("aa"));
    }

    #[test]
    fn test_did_you_mean_message() {
        assert_eq!(
            did_you_mean("upcasee", ["downcase", "upcase"]),
            Some("Did you mean 'upcase'?".to_string())
        );
    }
}
