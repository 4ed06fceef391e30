//! Deterministic construction keys
//!
//! Provides [`CacheKey`], a 32-byte Blake3 digest over a namespace and the
//! canonical encoding of construction parameters.

use crate::value::{Params, Value};
use std::fmt::{self, Display, Formatter};

/// A 32-byte construction key (Blake3)
///
/// Equal `(namespace, params)` pairs always derive equal keys.
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Create a key from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary bytes into a key
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Derive the key for `params` constructed under `namespace`
    ///
    /// The namespace and every parameter name are length-prefixed, and every
    /// value carries a kind tag, so distinct inputs never share an encoding.
    /// Floats are hashed by their bit pattern: `NaN`, `inf` and `-inf` are
    /// three different keys.
    #[must_use]
    pub fn derive(namespace: &str, params: &Params) -> Self {
        let mut hasher = blake3::Hasher::new();
        update_text(&mut hasher, namespace);
        update_len(&mut hasher, params.len());
        for (name, value) in params.iter() {
            update_text(&mut hasher, name);
            update_value(&mut hasher, value);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

fn update_len(hasher: &mut blake3::Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn update_text(hasher: &mut blake3::Hasher, text: &str) {
    update_len(hasher, text.len());
    hasher.update(text.as_bytes());
}

fn update_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Bool(b) => {
            hasher.update(&[0, u8::from(*b)]);
        }
        Value::Int(i) => {
            hasher.update(&[1]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Float(x) => {
            hasher.update(&[2]);
            hasher.update(&x.to_bits().to_le_bytes());
        }
        Value::Text(s) => {
            hasher.update(&[3]);
            update_text(hasher, s);
        }
        Value::List(items) => {
            hasher.update(&[4]);
            update_len(hasher, items.len());
            for item in items {
                update_value(hasher, item);
            }
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn derive_is_deterministic() {
        let a = Params::new().with("host", "db").with("port", 5432);
        let b = Params::new().with("port", 5432).with("host", "db");
        assert_eq!(CacheKey::derive("conn", &a), CacheKey::derive("conn", &b));
    }

    #[test]
    fn namespace_separates_keys() {
        let params = Params::new().with("n", 1);
        assert_ne!(
            CacheKey::derive("left", &params),
            CacheKey::derive("right", &params)
        );
    }

    #[test]
    fn params_separate_keys() {
        let a = Params::new().with("n", 1);
        let b = Params::new().with("n", 2);
        assert_ne!(CacheKey::derive("ns", &a), CacheKey::derive("ns", &b));
    }

    #[test]
    fn non_finite_floats_separate_keys() {
        let key = |x: f64| CacheKey::derive("p", &Params::new().with("x", x));
        let nan = key(f64::NAN);
        let inf = key(f64::INFINITY);
        let neg_inf = key(f64::NEG_INFINITY);

        assert_ne!(nan, inf);
        assert_ne!(inf, neg_inf);
        assert_ne!(nan, neg_inf);
        assert_eq!(nan, key(f64::NAN));
    }

    #[test]
    fn kinds_separate_keys() {
        let int = Params::new().with("n", 1);
        let float = Params::new().with("n", 1.0);
        let text = Params::new().with("n", "1");
        let bool_ = Params::new().with("n", true);
        assert_ne!(CacheKey::derive("ns", &int), CacheKey::derive("ns", &float));
        assert_ne!(CacheKey::derive("ns", &int), CacheKey::derive("ns", &text));
        assert_ne!(CacheKey::derive("ns", &int), CacheKey::derive("ns", &bool_));
    }

    #[test]
    fn nested_lists_separate_keys() {
        let flat = Params::new().with("xs", vec![Value::from(1), Value::from(2)]);
        let nested = Params::new().with(
            "xs",
            vec![Value::from(vec![Value::from(1)]), Value::from(2)],
        );
        assert_ne!(CacheKey::derive("ns", &flat), CacheKey::derive("ns", &nested));
    }

    #[test]
    fn name_boundaries_separate_keys() {
        let a = Params::new().with("ab", "c");
        let b = Params::new().with("a", "bc");
        assert_ne!(CacheKey::derive("ns", &a), CacheKey::derive("ns", &b));
    }

    #[test]
    fn short_is_prefix_of_display() {
        let key = CacheKey::compute(b"abc");
        assert_eq!(key.short().len(), 16);
        assert!(key.to_string().starts_with(&key.short()));
    }

    proptest! {
        #[test]
        fn insertion_order_never_changes_key(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8)
        ) {
            let forward: Params = entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let backward: Params = entries.iter().rev().map(|(k, v)| (k.clone(), *v)).collect();
            prop_assert_eq!(
                CacheKey::derive("ns", &forward),
                CacheKey::derive("ns", &backward)
            );
        }
    }
}
