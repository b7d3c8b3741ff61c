use rand::Rng;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Salted one-way hash, stored as `hex(salt)$hex(digest)`.
pub fn hash(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::rng().random();
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

pub fn verify(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    let actual = digest(&salt, password);
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(&expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash("hunter2");
        let second = hash("hunter2");

        assert_ne!(first, second);
        assert!(verify("hunter2", &first));
        assert!(verify("hunter2", &second));
        assert!(!verify("hunter3", &first));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify("x", ""));
        assert!(!verify("x", "nodollar"));
        assert!(!verify("x", "zz$zz"));
    }
}
