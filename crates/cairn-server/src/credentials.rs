//! Password digests for user records.
//!
//! Passwords are never stored. A user record carries a random salt and
//! HMAC-SHA256 keyed by that salt over the password, both hex-encoded.

use cairn_core::Environment;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::storage::UserRecord;

type HmacSha256 = Hmac<Sha256>;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Build a user record with a fresh salt and digest for `password`.
pub fn new_user<E: Environment>(
    env: &E,
    username: impl Into<String>,
    password: &str,
    character_id: impl Into<String>,
    room_id: impl Into<String>,
) -> UserRecord {
    let mut salt = [0u8; SALT_LEN];
    env.random_bytes(&mut salt);

    UserRecord {
        id: env.random_u64(),
        username: username.into(),
        character_id: character_id.into(),
        room_id: room_id.into(),
        salt: hex::encode(salt),
        digest: hex::encode(digest(&salt, password)),
    }
}

/// Check `password` against the record's digest in constant time.
///
/// A record with malformed hex never verifies.
pub fn verify(user: &UserRecord, password: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(&user.salt), hex::decode(&user.digest)) else {
        tracing::warn!(username = %user.username, "malformed credential encoding");
        return false;
    };

    mac(&salt, password).verify_slice(&expected).is_ok()
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    mac(salt, password).finalize().into_bytes().to_vec()
}

fn mac(salt: &[u8], password: &str) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(salt) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(password.as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimEnv;

    #[test]
    fn correct_password_verifies() {
        let env = SimEnv::with_seed(1);
        let user = new_user(&env, "ada", "hunter2", "char_ada", "start");

        assert!(verify(&user, "hunter2"));
        assert!(!verify(&user, "hunter3"));
        assert!(!verify(&user, ""));
    }

    #[test]
    fn any_salt_length_keys_the_digest() {
        for salt in [Vec::new(), vec![7u8; 1], vec![9u8; 200]] {
            let user = UserRecord {
                id: 1,
                username: "ada".to_string(),
                character_id: "char_ada".to_string(),
                room_id: "start".to_string(),
                salt: hex::encode(&salt),
                digest: hex::encode(digest(&salt, "pw")),
            };
            assert!(verify(&user, "pw"));
            assert!(!verify(&user, "wp"));
        }
    }

    #[test]
    fn record_never_contains_password() {
        let env = SimEnv::with_seed(2);
        let user = new_user(&env, "ada", "hunter2", "char_ada", "start");

        assert_eq!(user.salt.len(), SALT_LEN * 2);
        assert_eq!(user.digest.len(), 64);
        assert!(!user.digest.contains("hunter2"));
    }

    #[test]
    fn same_password_different_salt() {
        let env = SimEnv::with_seed(3);
        let a = new_user(&env, "a", "pw", "c", "start");
        let b = new_user(&env, "b", "pw", "c", "start");

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let env = SimEnv::with_seed(4);
        let mut user = new_user(&env, "ada", "pw", "c", "start");
        user.digest = "not hex".to_string();

        assert!(!verify(&user, "pw"));
    }
}
