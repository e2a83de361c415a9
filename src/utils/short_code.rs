use rand::Rng;
use rand::rngs::OsRng;

/// Alphabet for public short codes. Lowercase alphanumeric, 36 symbols.
pub const SHORT_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const SHORT_CODE_LENGTH: usize = 8;

/// Generate a random short code (8 chars, lowercase alphanumeric).
///
/// Codes are public and must not be guessable, so this draws from the OS
/// CSPRNG. `gen_range` samples without modulo bias.
pub fn generate_short_code() -> String {
    let mut rng = OsRng;
    (0..SHORT_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SHORT_CODE_ALPHABET.len());
            SHORT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_code_length_and_charset() {
        for _ in 0..100 {
            let code = generate_short_code();
            assert_eq!(code.len(), SHORT_CODE_LENGTH);
            assert!(
                code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        // 10_000 codes x 8 chars = 80_000 draws, ~2222 expected per symbol.
        let mut counts: HashMap<u8, u64> = HashMap::new();
        for _ in 0..10_000 {
            for b in generate_short_code().bytes() {
                *counts.entry(b).or_default() += 1;
            }
        }
        assert_eq!(counts.len(), SHORT_CODE_ALPHABET.len());
        let expected = 80_000f64 / SHORT_CODE_ALPHABET.len() as f64;
        for (&symbol, &count) in &counts {
            assert!(
                (count as f64) > expected * 0.8 && (count as f64) < expected * 1.2,
                "symbol {} count {} far from expected {}",
                symbol as char,
                count,
                expected
            );
        }
    }
}
