//! Cipher primitives for the asset index and encrypted packs.
//!
//! The game protects `Package/index` and some packed archives with
//! AES-128-CBC. Key and IV are not stored as raw bytes but derived from two
//! hex-looking seed strings through a byte-pair nibble transform inherited
//! from the game's own loader.

use aes::cipher::{block_padding::NoPadding, block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{Error, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Seed string the key is derived from.
pub const KEY_SEED: &str = "d4152d461ab5308429e49774a042a318";

/// Seed string the IV is derived from.
pub const IV_SEED: &str = "86afc43868fea6abd40fbf6d5ed50905";

/// Map one seed character to a nibble.
///
/// Letters (bit `0x40`) are split on the case bit `0x20`; everything else is
/// treated as a digit. Characters outside `[0-9A-Fa-f]` are not rejected, they
/// wrap the same way the game's loader does.
fn nibble(c: u8) -> u8 {
    if c & 0x40 != 0 {
        if c & 0x20 != 0 {
            c.wrapping_sub(87)
        } else {
            c.wrapping_sub(55)
        }
    } else {
        c.wrapping_sub(48)
    }
}

/// Decode `seed` two characters at a time; the first character of each pair
/// is the high nibble.
fn decode_pairs(seed: &[u8], out: &mut [u8; 16]) {
    for (slot, pair) in out.iter_mut().zip(seed.chunks_exact(2)) {
        *slot = nibble(pair[1]) | (nibble(pair[0]) << 4);
    }
}

/// Derive the 16-byte key from its seed.
///
/// The loader only decodes seeds that are exactly 16 characters long; any
/// other length leaves the key zeroed. The shipped 32-character seed therefore
/// yields an all-zero key, and the game relies on that.
pub fn derive_key(seed: &str) -> [u8; 16] {
    let mut key = [0u8; 16];
    if seed.len() == 16 {
        decode_pairs(seed.as_bytes(), &mut key);
    }
    key
}

/// Derive the 16-byte IV from its 32-character seed.
pub fn derive_iv(seed: &str) -> [u8; 16] {
    let mut iv = [0u8; 16];
    decode_pairs(seed.as_bytes(), &mut iv);
    iv
}

/// Key material for the index cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherKeys {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl Default for CipherKeys {
    fn default() -> Self {
        Self {
            key: derive_key(KEY_SEED),
            iv: derive_iv(IV_SEED),
        }
    }
}

impl CipherKeys {
    /// Encrypt `data` with AES-128-CBC and a PKCS#7 trailer.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128CbcEnc::new(&self.key.into(), &self.iv.into());

        let mut buffer = vec![0u8; data.len() + BLOCK_SIZE];
        buffer[..data.len()].copy_from_slice(data);

        let encrypted = cipher
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
            .map_err(|e| Error::Cipher(format!("AES encryption failed: {:?}", e)))?;

        Ok(encrypted.to_vec())
    }

    /// Decrypt AES-128-CBC data.
    ///
    /// A well-formed PKCS#7 trailer is removed; anything else is returned as
    /// decrypted so NUL-padded payloads survive untouched.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        if data.len() % BLOCK_SIZE != 0 {
            return Err(Error::Cipher(format!(
                "Data length {} is not a multiple of {}",
                data.len(),
                BLOCK_SIZE
            )));
        }

        let cipher = Aes128CbcDec::new(&self.key.into(), &self.iv.into());

        let mut buffer = data.to_vec();
        let decrypted = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|e| Error::Cipher(format!("AES decryption failed: {:?}", e)))?;

        let mut result = decrypted.to_vec();
        strip_pkcs7(&mut result);
        Ok(result)
    }
}

/// Encrypt with the built-in index keys.
pub fn encrypt(data: &[u8]) -> Result<Vec<u8>> {
    CipherKeys::default().encrypt(data)
}

/// Decrypt with the built-in index keys.
pub fn decrypt(data: &[u8]) -> Result<Vec<u8>> {
    CipherKeys::default().decrypt(data)
}

fn strip_pkcs7(data: &mut Vec<u8>) {
    let Some(&last) = data.last() else {
        return;
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return;
    }
    if data[data.len() - pad..].iter().all(|&b| b == last) {
        data.truncate(data.len() - pad);
    }
}

/// Append NUL bytes until the length is a multiple of the block size.
pub fn pad_with_nul(data: &mut Vec<u8>) {
    let rem = data.len() % BLOCK_SIZE;
    if rem != 0 {
        data.resize(data.len() + BLOCK_SIZE - rem, 0);
    }
}

/// Overwrite trailing NUL bytes with spaces in place.
///
/// The buffer keeps its length so a payload stays a multiple of the block
/// size; the markup reader downstream cannot cope with trailing NULs.
pub fn neutralize_nul_padding(data: &mut [u8]) {
    for byte in data.iter_mut().rev() {
        if *byte != 0 {
            break;
        }
        *byte = b' ';
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iv_derivation_matches_hex() {
        let iv = derive_iv(IV_SEED);
        assert_eq!(
            iv,
            [
                0x86, 0xaf, 0xc4, 0x38, 0x68, 0xfe, 0xa6, 0xab, 0xd4, 0x0f, 0xbf, 0x6d, 0x5e,
                0xd5, 0x09, 0x05
            ]
        );
    }

    #[test]
    fn test_key_derivation_requires_sixteen_chars() {
        assert_eq!(derive_key(KEY_SEED), [0u8; 16]);

        let key = derive_key("0123456789ABCDEF");
        assert_eq!(&key[..8], &[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(&key[8..], &[0u8; 8]);
    }

    #[test]
    fn test_nibble_high_comes_from_first_char() {
        let iv = derive_iv("a1");
        assert_eq!(iv[0], 0xa1);
        let iv = derive_iv("1a");
        assert_eq!(iv[0], 0x1a);
    }

    #[test]
    fn test_nibble_non_hex_wraps() {
        // 'g' = 0x67 -> 0x67 - 87 = 16, shifted out of the high nibble
        assert_eq!(nibble(b'g'), 16);
        assert_eq!(derive_iv("g0")[0], 0x00);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let keys = CipherKeys::default();
        let plain = b"<index></index>".to_vec();
        let cipher = keys.encrypt(&plain).unwrap();
        assert_eq!(cipher.len() % BLOCK_SIZE, 0);
        assert_ne!(&cipher[..plain.len()], &plain[..]);
        assert_eq!(keys.decrypt(&cipher).unwrap(), plain);
    }

    #[test]
    fn test_decrypt_rejects_partial_block() {
        assert!(matches!(decrypt(&[1, 2, 3]), Err(Error::Cipher(_))));
    }

    #[test]
    fn test_pad_and_neutralize() {
        let mut data = b"abc".to_vec();
        pad_with_nul(&mut data);
        assert_eq!(data.len(), 16);
        neutralize_nul_padding(&mut data);
        assert_eq!(&data[..3], b"abc");
        assert!(data[3..].iter().all(|&b| b == b' '));

        let mut aligned = vec![b'x'; 16];
        pad_with_nul(&mut aligned);
        assert_eq!(aligned.len(), 16);
    }
}
