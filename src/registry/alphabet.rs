//! Symbol set for generated keys.

use rand::Rng;

/// The symbols a generated key is built from: ASCII letters minus the
/// vowels (both cases), plus digits. Dropping vowels keeps accidental
/// words out of generated names.
const KEY_SYMBOLS: &[u8] = b"bcdfghjklmnpqrstvwxyzBCDFGHJKLMNPQRSTVWXYZ0123456789";

/// Fixed alphabet used to construct random identifiers.
#[derive(Debug, Clone, Copy)]
pub struct KeyAlphabet {
    symbols: &'static [u8],
}

impl KeyAlphabet {
    pub fn new() -> Self {
        Self {
            symbols: KEY_SYMBOLS,
        }
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Draw a candidate key of `length` symbols, uniformly at random with
    /// replacement.
    pub fn sample(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| self.symbols[rng.gen_range(0..self.symbols.len())] as char)
            .collect()
    }

    /// Whether every character of `key` belongs to the alphabet.
    pub fn spans(&self, key: &str) -> bool {
        key.bytes().all(|b| self.symbols.contains(&b))
    }
}

impl Default for KeyAlphabet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_vowels() {
        let alphabet = KeyAlphabet::new();
        for vowel in "aeiouAEIOU".chars() {
            assert!(!alphabet.spans(&vowel.to_string()), "vowel {} present", vowel);
        }
    }

    #[test]
    fn test_symbol_count() {
        // 21 lowercase consonants + 21 uppercase + 10 digits
        assert_eq!(KeyAlphabet::new().len(), 52);
    }

    #[test]
    fn test_sample_length_and_membership() {
        let alphabet = KeyAlphabet::new();
        for length in [2, 4, 8] {
            let key = alphabet.sample(length);
            assert_eq!(key.len(), length);
            assert!(alphabet.spans(&key));
        }
    }
}
