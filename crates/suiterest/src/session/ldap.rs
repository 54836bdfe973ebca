//! LDAP login encryption.
//!
//! Servers configured for LDAP authentication expect the password
//! 3DES-CBC-encrypted with a key derived from a shared secret. The IV is the
//! literal string `"password"`, a server-side convention rather than a secret.

use cbc::cipher::block_padding::ZeroPadding;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

type TdesCbcEnc = cbc::Encryptor<des::TdesEde3>;

/// Fixed initialization vector mandated by the server.
const LDAP_IV: &[u8; 8] = b"password";

/// Derives the 24-byte 3DES key from the shared LDAP key.
///
/// The key is the first 24 characters of the lowercase hex encoding of
/// MD5(key) as character bytes, not decoded digest bytes.
pub(crate) fn derive_key(key: &str) -> [u8; 24] {
    let digest = Md5::digest(key.as_bytes());
    let hex = hex::encode(digest);
    let mut out = [0_u8; 24];
    out.copy_from_slice(&hex.as_bytes()[..24]);
    out
}

/// Encrypts `password` for the LDAP login variant.
///
/// 3DES-EDE3 in CBC mode with zero padding and the fixed IV; the ciphertext
/// is returned as lowercase hex, which is what the server compares against.
pub(crate) fn encrypt_password(key: &str, password: &str) -> String {
    let key = derive_key(key);
    let cipher = TdesCbcEnc::new(&key.into(), LDAP_IV.into());
    let ciphertext = cipher.encrypt_padded_vec_mut::<ZeroPadding>(password.as_bytes());
    hex::encode(ciphertext)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    // Golden values pinning the MD5/3DES derivation; easy to subtly break.
    #[test]
    fn derive_key_golden() {
        assert_eq!(hex::encode(Md5::digest(b"k")), "8ce4b16b22b58894aa86c421e8759df3");
        assert_eq!(&derive_key("k"), b"8ce4b16b22b58894aa86c421");
    }

    #[test]
    fn encrypt_password_golden() {
        assert_eq!(encrypt_password("k", "secret"), "79b7701eaa849659");
    }

    #[test]
    fn encrypt_password_block_aligned_input() {
        // Exactly one block; zero padding must not add a second one.
        assert_eq!(encrypt_password("k", "hunter2!"), "36ae9923717d5afb");
    }

    #[test]
    fn encrypt_password_longer_input_spans_blocks() {
        let ciphertext = encrypt_password("k", "a password longer than one block");
        // 33 bytes pad to 40, i.e. 80 hex characters.
        assert_eq!(ciphertext.len(), 80);
        assert!(ciphertext.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(ciphertext, ciphertext.to_lowercase());
    }
}
