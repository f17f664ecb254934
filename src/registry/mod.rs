//! Key registry: the fixed alphabet, the persisted key set, and the
//! collision-bounded generator that mints new keys against it.

mod alphabet;
mod generator;
mod keyset;

pub use alphabet::KeyAlphabet;
pub use generator::{CollisionBudget, KeyGenerator, MAX_KEYS_TO_TRY, MIN_KEY_LENGTH};
pub use keyset::{KeySet, NO_ASSOCIATION};
