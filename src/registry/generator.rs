//! Key generation against a persisted key set.
//!
//! Candidates are drawn uniformly at random from the fixed alphabet and
//! checked against every key already known, including keys produced earlier
//! in the same batch. The collision budget is global to a batch: once
//! `MAX_KEYS_TO_TRY` collisions have accumulated the whole batch fails with
//! `RegistrySaturated`, carrying the number of keys minted before failure.

use log::debug;

use super::alphabet::KeyAlphabet;
use super::keyset::{KeySet, NO_ASSOCIATION};
use crate::error::RegistryError;

/// Default total number of collisions tolerated across one batch.
pub const MAX_KEYS_TO_TRY: u32 = 10;

/// Minimum identifier length accepted by the generator.
pub const MIN_KEY_LENGTH: usize = 2;

/// Tracks the collisions spent by a batch of generation calls.
#[derive(Debug)]
pub struct CollisionBudget {
    remaining: u32,
}

impl CollisionBudget {
    pub fn new(limit: u32) -> Self {
        Self { remaining: limit }
    }

    /// Record one collision. Returns false once the budget is exhausted.
    fn spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

impl Default for CollisionBudget {
    fn default() -> Self {
        Self::new(MAX_KEYS_TO_TRY)
    }
}

/// Mints unique keys from the alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyGenerator {
    alphabet: KeyAlphabet,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            alphabet: KeyAlphabet::new(),
        }
    }

    /// Mint `count` keys of `length` symbols, each unique against
    /// `existing` and against the rest of the batch.
    ///
    /// Every minted key is inserted into `existing` (with the
    /// no-association sentinel) before the next draw; persisting the keys
    /// is the caller's responsibility. On saturation the error carries the
    /// number of keys minted before the budget ran out.
    pub fn generate_keys(
        &self,
        count: usize,
        length: usize,
        existing: &mut KeySet,
    ) -> Result<Vec<String>, RegistryError> {
        check_length(length)?;
        let mut budget = CollisionBudget::default();
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            match self.generate_one(length, existing, &mut budget) {
                Ok(key) => keys.push(key),
                Err(RegistryError::RegistrySaturated { .. }) => {
                    return Err(RegistryError::RegistrySaturated { minted: keys.len() })
                }
                Err(e) => return Err(e),
            }
        }
        Ok(keys)
    }

    /// Mint a single key, drawing collisions from a caller-held budget.
    ///
    /// Exposed so a caller persisting keys one at a time can share one
    /// budget across its whole batch.
    pub fn generate_one(
        &self,
        length: usize,
        existing: &mut KeySet,
        budget: &mut CollisionBudget,
    ) -> Result<String, RegistryError> {
        check_length(length)?;
        loop {
            let candidate = self.alphabet.sample(length);
            if existing.contains(&candidate) {
                debug!("key collision on {:?}", candidate);
                if !budget.spend() {
                    return Err(RegistryError::RegistrySaturated { minted: 0 });
                }
                continue;
            }
            existing.insert(candidate.clone(), NO_ASSOCIATION);
            return Ok(candidate);
        }
    }
}

fn check_length(length: usize) -> Result<(), RegistryError> {
    if length < MIN_KEY_LENGTH {
        return Err(RegistryError::InvalidConfiguration(format!(
            "identifier length must be >= {}, got {}",
            MIN_KEY_LENGTH, length
        )));
    }
    Ok(())
}
