use base64::{engine::general_purpose, Engine};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const SALT_LEN: usize = 16;
pub const TOKEN_LEN: usize = 64;

/// Random alphanumeric string drawn from the OS generator.
pub fn random_token(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_salt() -> String {
    random_token(SALT_LEN)
}

pub fn generate_auth_token() -> String {
    random_token(TOKEN_LEN)
}

/// `base64(sha256(password || salt))`
pub fn hash_password(plain: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hasher.update(salt.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

pub fn verify_password(plain: &str, salt: &str, stored_hash: &str) -> bool {
    hash_password(plain, salt)
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let salt = generate_salt();
        let hash = hash_password("Secur3P@ssw0rd!", &salt);
        assert!(verify_password("Secur3P@ssw0rd!", &salt, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let salt = generate_salt();
        let hash = hash_password("correct-horse-battery-staple", &salt);
        assert!(!verify_password("wrong-password", &salt, &hash));
        assert!(!verify_password("", &salt, &hash));
        // stored hash of a different length never matches
        assert!(!verify_password("correct-horse-battery-staple", &salt, &hash[..10]));
    }

    #[test]
    fn hash_is_base64_sha256_of_password_then_salt() {
        // sha256("abc") = ba7816bf...15ad
        assert_eq!(
            hash_password("ab", "c"),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn same_password_different_salt_gives_different_hash() {
        assert_ne!(hash_password("pw", "salt-one"), hash_password("pw", "salt-two"));
    }

    #[test]
    fn generated_tokens_have_expected_shape() {
        let salt = generate_salt();
        let token = generate_auth_token();
        assert_eq!(salt.len(), SALT_LEN);
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_auth_token(), token);
    }
}
