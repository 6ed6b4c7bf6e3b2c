//! Password hashing and cookie sessions.
//!
//! Stored password format: `"<hex scrypt key>.<hex salt>"`, 64-byte key,
//! 16-byte salt, scrypt N = 2^14, r = 8, p = 1.

pub mod session;

use rand_core::{OsRng, RngCore};
use scrypt::Params;

use crate::error::AppError;

pub use session::{SESSION_COOKIE, SessionStore};

const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;
const LOG_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;

fn derive(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], AppError> {
    let params = Params::new(LOG_N, R, P, KEY_LEN)
        .map_err(|e| AppError::Server(format!("invalid scrypt params: {e}")))?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|e| AppError::Server(format!("scrypt failed: {e}")))?;
    Ok(key)
}

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive(password, &salt)?;
    Ok(format!("{}.{}", hex::encode(key), hex::encode(salt)))
}

/// Check `supplied` against a stored hash. Malformed stored values never match.
pub fn verify_password(supplied: &str, stored: &str) -> bool {
    let Some((key_hex, salt_hex)) = stored.split_once('.') else {
        return false;
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(key_hex), hex::decode(salt_hex)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }
    match derive(supplied, &salt) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 32 random bytes, hex encoded.
pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn hash_format_is_key_dot_salt() {
        let stored = hash_password("pw").unwrap();
        let (key, salt) = stored.split_once('.').unwrap();
        assert_eq!(key.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn malformed_stored_hash_never_matches() {
        assert!(!verify_password("pw", "no-dot-here"));
        assert!(!verify_password("pw", "zz.zz"));
        assert!(!verify_password("pw", "abcd.0011"));
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = random_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, random_token());
    }
}
