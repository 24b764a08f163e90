//! Stable ids for auxiliary variables and constraints
use std::hash::{DefaultHasher, Hash, Hasher};

pub(crate) fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

pub(crate) fn hash_as_hex_string<T: Hash>(t: &T) -> String {
    format!("{:x}", calculate_hash(t))
}

/// Id for an auxiliary problem entity derived from `key`, prefixed so it reads well in
/// problem dumps and can't collide with a plain reaction or metabolite id
pub(crate) fn auxiliary_id<T: Hash>(prefix: &str, key: &T) -> String {
    format!("__{}_{}", prefix, hash_as_hex_string(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable() {
        assert_eq!(calculate_hash(&"R1"), calculate_hash(&"R1"));
        assert_ne!(hash_as_hex_string(&"R1"), hash_as_hex_string(&"R2"));
        let id = auxiliary_id("abs", &"R1");
        assert!(id.starts_with("__abs_"));
        assert_eq!(id, auxiliary_id("abs", &"R1"));
    }
}
