//! Majority-consensus resolution over collected oracle results
//!
//! Pure function, no I/O: given the mapping produced by
//! [`Reflector::reflect_all`](crate::engine::Reflector::reflect_all),
//! pick the address most oracles agree on. Used to spot a single
//! misbehaving or stale oracle among otherwise agreeing ones.

use std::net::IpAddr;

/// Return the most frequent address across `results`
///
/// Addresses are grouped by their canonical string form. Ties are
/// broken in favor of the group whose first member appears earliest in
/// the input order. Returns `None` for an empty input.
pub fn consensus(results: &[(String, IpAddr)]) -> Option<IpAddr> {
    // Groups stay in first-seen order; replacement below is only on a
    // strictly larger count, which gives the tie-break for free.
    let mut groups: Vec<(String, IpAddr, usize)> = Vec::new();
    for (_, address) in results {
        let key = address.to_string();
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, count)) => *count += 1,
            None => groups.push((key, *address, 1)),
        }
    }

    let mut best: Option<(IpAddr, usize)> = None;
    for (_, address, count) in groups {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((address, count));
        }
    }
    best.map(|(address, _)| address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[(&str, &str)]) -> Vec<(String, IpAddr)> {
        pairs
            .iter()
            .map(|(oracle, addr)| (oracle.to_string(), addr.parse().unwrap()))
            .collect()
    }

    #[test]
    fn majority_wins() {
        let input = results(&[
            ("a", "203.0.113.7"),
            ("b", "203.0.113.7"),
            ("c", "198.51.100.1"),
        ]);
        assert_eq!(consensus(&input), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn tie_breaks_to_first_seen() {
        let input = results(&[
            ("a", "198.51.100.1"),
            ("b", "203.0.113.7"),
            ("c", "203.0.113.7"),
            ("d", "198.51.100.1"),
        ]);
        assert_eq!(consensus(&input), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn empty_input_has_no_answer() {
        assert_eq!(consensus(&[]), None);
    }

    #[test]
    fn single_result_is_its_own_consensus() {
        let input = results(&[("a", "2001:db8::1")]);
        assert_eq!(consensus(&input), Some("2001:db8::1".parse().unwrap()));
    }
}
