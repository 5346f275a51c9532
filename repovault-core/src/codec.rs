//! ES3 container transform: AES-128-CBC under a PBKDF2-derived key, with
//! optional gzip compression of the payload.
//!
//! Layout on disk is `IV(16 bytes) || ciphertext`; the IV doubles as the
//! PBKDF2 salt. The payload is UTF-8 JSON, gzip-compressed or not — detected
//! after decryption by the gzip magic, never by a flag.

use std::io::{Read, Write};

use aes::Aes128;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;

use crate::error::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Password baked into the game client. Every retail save on disk is
/// encrypted with it, so the literal must match byte for byte.
pub const DEFAULT_PASSWORD: &str = "Why would you want to cheat?... :o It's no fun. :') :'D";

/// Length of the IV prefix, which is also the PBKDF2 salt.
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;
const KEY_LEN: usize = 16;
const KDF_ROUNDS: u32 = 100;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, KDF_ROUNDS, &mut key);
    key
}

/// Decrypt a save container and return the plaintext payload.
///
/// If the decrypted bytes start with the gzip magic they are decompressed
/// before being returned.
///
/// # Errors
///
/// Returns [`Error::Decryption`] when the container is too short, the
/// ciphertext is not block-aligned, or PKCS7 unpadding fails (wrong password
/// or corrupted ciphertext). Corruption that happens to unpad cleanly cannot
/// be detected here; callers verify round-trips for that reason.
pub fn decrypt(container: &[u8], password: &str) -> Result<Vec<u8>> {
    let Some((iv, ciphertext)) = container.split_at_checked(IV_LEN) else {
        return Err(Error::Decryption);
    };
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(Error::Decryption);
    }

    let key = derive_key(password, iv);
    let plain = Aes128CbcDec::new_from_slices(&key, iv)
        .map_err(|_| Error::Decryption)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption)?;

    if plain.starts_with(&GZIP_MAGIC) {
        let mut payload = Vec::new();
        GzDecoder::new(plain.as_slice())
            .read_to_end(&mut payload)
            .map_err(|_| Error::Decryption)?;
        Ok(payload)
    } else {
        Ok(plain)
    }
}

/// Encrypt a payload into a save container: fresh random IV, PBKDF2 key
/// derivation with the IV as salt, AES-128-CBC over the PKCS7-padded bytes.
///
/// # Errors
///
/// Returns [`Error::Io`] if gzip compression of the payload fails.
pub fn encrypt(payload: &[u8], password: &str, compress: bool) -> Result<Vec<u8>> {
    let payload = if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?
    } else {
        payload.to_vec()
    };

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let key = derive_key(password, &iv);

    let ciphertext =
        Aes128CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&payload);

    let mut container = Vec::with_capacity(IV_LEN + ciphertext.len());
    container.extend_from_slice(&iv);
    container.extend_from_slice(&ciphertext);
    Ok(container)
}
