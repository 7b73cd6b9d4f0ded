//! Sheet protection keys as Excel stores them
//!
//! Excel writes either the legacy 16-bit `password` hash or a salted,
//! iterated `hashValue`. A key loaded from a workbook is only ever checked
//! against a passphrase; the passphrase itself is never recoverable.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// What unlocks a protected sheet
#[derive(Clone, PartialEq, Eq)]
pub enum ProtectionKey {
    /// Set through [`super::TabularStore::protect`]
    Passphrase(String),
    /// `password="CC3D"`
    Legacy(u16),
    /// `algorithmName`, `hashValue`, `saltValue` and `spinCount`
    Hashed {
        algorithm: String,
        hash: String,
        salt: String,
        spin_count: u32,
    },
    /// Protected without a password
    Open,
}

impl ProtectionKey {
    pub fn from_passphrase(passphrase: &str) -> Self {
        if passphrase.is_empty() {
            ProtectionKey::Open
        } else {
            ProtectionKey::Passphrase(passphrase.to_string())
        }
    }

    pub fn matches(&self, passphrase: &str) -> bool {
        match self {
            ProtectionKey::Passphrase(p) => p == passphrase,
            ProtectionKey::Legacy(hash) => legacy_hash(passphrase) == *hash,
            ProtectionKey::Hashed {
                algorithm,
                hash,
                salt,
                spin_count,
            } => match iterated_hash(algorithm, salt, *spin_count, passphrase) {
                Some(computed) => computed == *hash,
                None => {
                    log::warn!("Unsupported sheet protection algorithm '{}'", algorithm);
                    false
                }
            },
            ProtectionKey::Open => true,
        }
    }

    /// Value of the legacy `password` attribute, `None` when there is none
    pub fn legacy(&self) -> Option<u16> {
        match self {
            ProtectionKey::Passphrase(p) => Some(legacy_hash(p)),
            ProtectionKey::Legacy(hash) => Some(*hash),
            ProtectionKey::Hashed { .. } | ProtectionKey::Open => None,
        }
    }
}

impl std::fmt::Debug for ProtectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionKey::Passphrase(_) => write!(f, "Passphrase(..)"),
            ProtectionKey::Legacy(hash) => write!(f, "Legacy({:04X})", hash),
            ProtectionKey::Hashed {
                algorithm,
                spin_count,
                ..
            } => write!(f, "Hashed({}, {} spins)", algorithm, spin_count),
            ProtectionKey::Open => write!(f, "Open"),
        }
    }
}

/// Excel's 16-bit sheet password hash
pub fn legacy_hash(passphrase: &str) -> u16 {
    if passphrase.is_empty() {
        return 0;
    }

    let mut hash: u16 = 0;
    for byte in passphrase.as_bytes().iter().rev() {
        hash = ((hash >> 14) & 0x01) | ((hash << 1) & 0x7FFF);
        hash ^= u16::from(*byte);
    }
    hash = ((hash >> 14) & 0x01) | ((hash << 1) & 0x7FFF);
    hash ^= passphrase.len() as u16;
    hash ^ 0xCE4B
}

/// `H0 = H(salt + UTF-16LE password)`, then `Hn = H(Hn-1 + n as u32 LE)`,
/// base64-encoded. `None` for an algorithm or salt that cannot be used.
fn iterated_hash(algorithm: &str, salt: &str, spin_count: u32, passphrase: &str) -> Option<String> {
    let salt = STANDARD.decode(salt.trim()).ok()?;
    let mut input = salt;
    input.extend(passphrase.encode_utf16().flat_map(u16::to_le_bytes));

    let digest = match algorithm.to_ascii_uppercase().as_str() {
        "SHA-512" => spin::<Sha512>(&input, spin_count),
        "SHA-384" => spin::<Sha384>(&input, spin_count),
        "SHA-256" => spin::<Sha256>(&input, spin_count),
        _ => return None,
    };
    Some(STANDARD.encode(digest))
}

fn spin<D: Digest>(input: &[u8], spin_count: u32) -> Vec<u8> {
    let mut hash = D::digest(input).to_vec();
    for i in 0..spin_count {
        let mut hasher = D::new();
        hasher.update(&hash);
        hasher.update(i.to_le_bytes());
        hash = hasher.finalize().to_vec();
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_hash_matches_excel() {
        assert_eq!(legacy_hash("password"), 0x83AF);
        assert_eq!(legacy_hash("1234"), 0xCC3D);
        assert_eq!(legacy_hash(""), 0);
        assert!(ProtectionKey::Legacy(0xCC3D).matches("1234"));
        assert!(!ProtectionKey::Legacy(0xCC3D).matches("4321"));
    }

    #[test]
    fn test_hashed_key_checks_salted_digest() {
        let salt = STANDARD.encode(b"0123456789abcdef");
        let hash = iterated_hash("SHA-512", &salt, 1000, "1234").unwrap();
        let key = ProtectionKey::Hashed {
            algorithm: "SHA-512".to_string(),
            hash,
            salt,
            spin_count: 1000,
        };

        assert!(key.matches("1234"));
        assert!(!key.matches("12345"));
        assert_eq!(key.legacy(), None);
    }

    #[test]
    fn test_unknown_algorithm_never_matches() {
        let key = ProtectionKey::Hashed {
            algorithm: "MD5".to_string(),
            hash: String::new(),
            salt: String::new(),
            spin_count: 1,
        };
        assert!(!key.matches(""));
    }

    #[test]
    fn test_passphrase_key() {
        assert_eq!(ProtectionKey::from_passphrase(""), ProtectionKey::Open);
        let key = ProtectionKey::from_passphrase("1234");
        assert!(key.matches("1234"));
        assert_eq!(key.legacy(), Some(0xCC3D));
        assert_eq!(format!("{:?}", key), "Passphrase(..)");
    }
}
