//! Password hashing behind a trait.
//!
//! The real hashing scheme is a deployment concern; the driver only needs
//! `hash` and `verify`-by-rehash semantics for the `crypt()` efun. The
//! default backend is salted SHA-256, encoded as `$s2$<salt>$<hex>` so a
//! hash carries everything needed to check a password against it.

use rand::Rng;
use sha2::{Digest, Sha256};

pub trait CryptBackend {
    /// Hash `password`. When `salt_source` is an existing hash, reuse its
    /// salt so the result is comparable (the classic crypt(3) contract).
    fn crypt(&self, password: &str, salt_source: Option<&str>) -> String;
}

pub struct Sha256Crypt;

const PREFIX: &str = "$s2$";

impl CryptBackend for Sha256Crypt {
    fn crypt(&self, password: &str, salt_source: Option<&str>) -> String {
        let salt = match salt_source.and_then(extract_salt) {
            Some(salt) => salt,
            None => {
                let mut rng = rand::thread_rng();
                let bytes: [u8; 8] = rng.r#gen();
                hex::encode(bytes)
            }
        };
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"$");
        hasher.update(password.as_bytes());
        format!("{PREFIX}{salt}${}", hex::encode(hasher.finalize()))
    }
}

fn extract_salt(hash: &str) -> Option<String> {
    let rest = hash.strip_prefix(PREFIX)?;
    let (salt, _) = rest.split_once('$')?;
    if salt.is_empty() {
        None
    } else {
        Some(salt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_password_same_salt_matches() {
        let backend = Sha256Crypt;
        let stored = backend.crypt("potrzebie", None);
        let check = backend.crypt("potrzebie", Some(&stored));
        assert_eq!(stored, check);
    }

    #[test]
    fn test_wrong_password_differs() {
        let backend = Sha256Crypt;
        let stored = backend.crypt("potrzebie", None);
        let check = backend.crypt("axolotl", Some(&stored));
        assert_ne!(stored, check);
    }

    #[test]
    fn test_fresh_salts_differ() {
        let backend = Sha256Crypt;
        let a = backend.crypt("x", None);
        let b = backend.crypt("x", None);
        assert_ne!(a, b);
    }
}
