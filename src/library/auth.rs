//! Password hashing for stored credentials.

use anyhow::{anyhow, bail, Result};
use std::str::FromStr;

mod library_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
        Argon2,
    };
    use rand::Rng;

    pub fn generate_b64_salt() -> Result<String> {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        let salt = SaltString::encode_b64(&bytes).map_err(|err| anyhow!("{}", err))?;
        Ok(salt.to_string())
    }

    pub fn hash(plain: &[u8], b64_salt: &str) -> Result<String> {
        let salt = SaltString::from_b64(b64_salt).map_err(|err| anyhow!("{}", err))?;
        let hash = Argon2::default()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?;
        Ok(hash.to_string())
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> Result<bool> {
        let password_hash = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::default()
            .verify_password(plain, &password_hash)
            .is_ok())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryHasher {
    Argon2,
    /// Stores the password hex-encoded. Only for tests.
    #[cfg(feature = "test-fast-hasher")]
    TestFast,
}

impl Default for LibraryHasher {
    fn default() -> Self {
        #[cfg(feature = "test-fast-hasher")]
        {
            LibraryHasher::TestFast
        }
        #[cfg(not(feature = "test-fast-hasher"))]
        {
            LibraryHasher::Argon2
        }
    }
}

impl FromStr for LibraryHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(LibraryHasher::Argon2),
            #[cfg(feature = "test-fast-hasher")]
            "test_fast" => Ok(LibraryHasher::TestFast),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for LibraryHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryHasher::Argon2 => write!(f, "argon2"),
            #[cfg(feature = "test-fast-hasher")]
            LibraryHasher::TestFast => write!(f, "test_fast"),
        }
    }
}

impl LibraryHasher {
    pub fn hash_password(&self, plain: &str) -> Result<String> {
        match self {
            LibraryHasher::Argon2 => {
                let salt = library_argon2::generate_b64_salt()?;
                library_argon2::hash(plain.as_bytes(), &salt)
            }
            #[cfg(feature = "test-fast-hasher")]
            LibraryHasher::TestFast => {
                let hex: String = plain.bytes().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("$testfast${}", hex))
            }
        }
    }

    pub fn verify_password(&self, plain: &str, target_hash: &str) -> Result<bool> {
        match self {
            LibraryHasher::Argon2 => library_argon2::verify(plain.as_bytes(), target_hash),
            #[cfg(feature = "test-fast-hasher")]
            LibraryHasher::TestFast => {
                let hex = target_hash
                    .strip_prefix("$testfast$")
                    .ok_or_else(|| anyhow!("Not a test_fast hash"))?;
                let expected: String = plain.bytes().map(|b| format!("{:02x}", b)).collect();
                Ok(hex == expected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_hash_and_verify() {
        let hasher = LibraryHasher::Argon2;
        let hash1 = hasher.hash_password("secret1").unwrap();
        let hash2 = hasher.hash_password("secret1").unwrap();

        // Fresh salt every time.
        assert_ne!(hash1, hash2);
        assert!(hasher.verify_password("secret1", &hash1).unwrap());
        assert!(hasher.verify_password("secret1", &hash2).unwrap());
        assert!(!hasher.verify_password("secret2", &hash1).unwrap());
    }

    #[test]
    fn hasher_names_round_trip() {
        let parsed: LibraryHasher = LibraryHasher::Argon2.to_string().parse().unwrap();
        assert_eq!(parsed, LibraryHasher::Argon2);
        assert!("md5".parse::<LibraryHasher>().is_err());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(LibraryHasher::Argon2
            .verify_password("secret1", "not-a-phc-string")
            .is_err());
    }
}
