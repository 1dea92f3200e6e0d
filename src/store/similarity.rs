//! Longest-matching-block similarity between two strings.
//!
//! The ratio is `2 * M / T` where `M` is the total size of the matching
//! blocks and `T` the combined length of both strings, measured in chars.
//! Blocks are found Ratcliff/Obershelp style: take the longest common
//! substring, then recurse on the pieces to its left and right.
//!
//! When the second string has 200 or more chars, chars occurring in more than
//! 1% of its positions are not used to seed a match (they can still extend
//! one). This keeps long prompts full of spaces and commas from scoring as
//! near-duplicates of each other.

use std::collections::HashMap;

const POPULAR_MIN_LEN: usize = 200;

/// Similarity ratio in `[0, 1]`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = Matcher::new(&a, &b).matching_chars();
    2.0 * matched as f64 / total as f64
}

/// True when `ratio(a, b)` strictly exceeds `threshold`.
pub fn is_near_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    ratio(a, b) > threshold
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each char in `b`, ascending, popular chars removed.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest block `(i, j, size)` with `a[i..i+size] == b[j..j+size]`
    /// inside the given ranges. Earliest `i` wins, then earliest `j`.
    fn longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total size of all matching blocks.
    fn matching_chars(&self) -> usize {
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_and_empty() {
        assert!(close(ratio("", ""), 1.0));
        assert!(close(ratio("abc", "abc"), 1.0));
        assert!(close(ratio("abc", ""), 0.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
    }

    #[test]
    fn test_known_ratios() {
        // "abcd" vs "bcde": block "bcd" => 2*3/8
        assert!(close(ratio("abcd", "bcde"), 0.75));
        // "ab" then "cd" to its right => 2*4/9
        assert!(close(ratio("abxcd", "abcd"), 2.0 * 4.0 / 9.0));
        // " abcd" vs "abcd abcd": longest block " abcd" => 2*5/14
        assert!(close(ratio(" abcd", "abcd abcd"), 10.0 / 14.0));
    }

    #[test]
    fn test_cat_records_are_near_duplicates() {
        let a = "A cat in space";
        let b = "A cat in space, cinematic";
        let c = "A dragon on a mountain";

        // "A cat in space" is a prefix of b: 2*14/39
        assert!(close(ratio(a, b), 28.0 / 39.0));
        assert!(is_near_duplicate(a, b, 0.6));
        assert!(!is_near_duplicate(a, c, 0.6));
        assert!(!is_near_duplicate(b, c, 0.6));
    }

    #[test]
    fn test_threshold_is_strict() {
        // "ab" vs "ax" => 2*1/4 = 0.5
        assert!(close(ratio("ab", "ax"), 0.5));
        assert!(!is_near_duplicate("ab", "ax", 0.5));
        assert!(is_near_duplicate("ab", "ax", 0.49));
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert!(close(ratio("猫在太空", "猫在太空"), 1.0));
        // one of four chars differs => 2*3/8
        assert!(close(ratio("猫在太空", "猫在太阳"), 0.75));
    }

    #[test]
    fn test_long_strings_skip_popular_seeds() {
        let a = "x".repeat(10);
        let b = format!("{}{}", "y".repeat(60), "x".repeat(150));
        // both chars are popular in b, so nothing can seed a match
        assert!(close(ratio(&a, &b), 0.0));

        // a seeded block may still extend across popular chars
        let b = format!("z{}", "x".repeat(209));
        assert!(close(ratio(&format!("z{a}"), &b), 2.0 * 11.0 / 221.0));
    }
}
