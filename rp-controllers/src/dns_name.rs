//! Random DNS name suffix generation for the lifecycle controller (§4.9 step 4).

use rand::distr::{Distribution, Uniform};
use rand::Rng;

pub const SUFFIX_LEN: usize = 4;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Maximum candidate suffixes tried before giving up (§4.9 step 4: no retry bound
/// is mandated, so one is fixed here; see the design notes for the rationale).
pub const MAX_ATTEMPTS: u32 = 20;

/// Characters excluded from generated suffixes because they are visually ambiguous
/// with one another (`0`/`o`, `1`/`l`/`i`).
const AMBIGUOUS: &[u8] = b"0o1li";

/// A short denylist of substrings that must not appear in a generated suffix. Not
/// exhaustive profanity filtering (out of scope for this worked example) — just
/// enough to demonstrate the filter's shape.
const DENYLIST: &[&str] = &["ass", "fuk", "fuck", "shit", "sex", "cum", "tit", "cnt"];

fn is_ambiguous(c: u8) -> bool {
    AMBIGUOUS.contains(&c)
}

fn passes_filter(candidate: &str) -> bool {
    if candidate.bytes().any(is_ambiguous) {
        return false;
    }
    !DENYLIST.iter().any(|bad| candidate.contains(bad))
}

/// Draw one random lowercase alphanumeric suffix of [`SUFFIX_LEN`] characters,
/// rejecting ambiguous-character and denylisted candidates and redrawing up to
/// [`MAX_ATTEMPTS`] times. Returns `None` if every attempt was rejected.
pub fn generate_suffix(rng: &mut impl Rng) -> Option<String> {
    let dist = Uniform::new(0, ALPHABET.len()).expect("alphabet is non-empty");
    for _ in 0..MAX_ATTEMPTS {
        let candidate: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[dist.sample(rng)] as char)
            .collect();
        if passes_filter(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ambiguous_characters() {
        assert!(!passes_filter("ab0c"));
        assert!(!passes_filter("abol"));
        assert!(passes_filter("ab4c"));
    }

    #[test]
    fn rejects_denylisted_substrings() {
        assert!(!passes_filter("fuk9"));
        assert!(passes_filter("derp"));
    }

    #[test]
    fn generates_suffixes_of_the_configured_length() {
        let mut rng = rand::rng();
        let suffix = generate_suffix(&mut rng).expect("alphabet is large enough to find a candidate");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(passes_filter(&suffix));
    }
}
