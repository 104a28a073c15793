//! Chunked RSA-OAEP encryption of arbitrary-length byte fields
//!
//! RSA-OAEP with SHA-256 accepts at most `k - 2*32 - 2` plaintext bytes per
//! operation (`k` = modulus size in bytes) and always emits `k` bytes.
//! Longer inputs are split into consecutive chunks that are encrypted
//! independently and concatenated:
//!
//! ```text
//! plaintext:  [ chunk 0 (max) ][ chunk 1 (max) ][ chunk 2 (<= max) ]
//! ciphertext: [   block 0 (k) ][   block 1 (k) ][   block 2 (k)    ]
//! ```
//!
//! Every block carries the label `"OAEP Encrypted"`. An empty plaintext
//! encrypts to an empty ciphertext.

use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::{HASH_SIZE, OAEP_LABEL};

const OAEP_OVERHEAD: usize = 2 * HASH_SIZE + 2;

/// Plaintext bytes per block for a `block`-byte modulus, if any fit at all.
fn chunk_capacity(block: usize) -> Option<usize> {
    block.checked_sub(OAEP_OVERHEAD).filter(|&n| n > 0)
}

fn modulus_too_small(block: usize) -> String {
    format!("{block}-byte modulus leaves no room for OAEP-SHA256 padding")
}

/// Largest plaintext chunk that fits one OAEP block under `public`.
pub fn max_chunk(public: &RsaPublicKey) -> CryptoResult<usize> {
    chunk_capacity(public.size())
        .ok_or_else(|| CryptoError::Encryption(modulus_too_small(public.size())))
}

/// Ciphertext length for a plaintext of `len` bytes.
pub fn ciphertext_len(public: &RsaPublicKey, len: usize) -> CryptoResult<usize> {
    Ok(len.div_ceil(max_chunk(public)?) * public.size())
}

fn padding() -> Oaep {
    Oaep::new_with_label::<Sha256, _>(OAEP_LABEL)
}

/// Encrypt `plaintext` under `public`, one OAEP block per chunk.
///
/// Padding is randomized: two calls on the same input return different bytes.
pub fn encrypt(public: &RsaPublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let block = public.size();
    let max = max_chunk(public)?;
    let mut rng = rand::rngs::OsRng;
    let mut ciphertext = Vec::with_capacity(plaintext.len().div_ceil(max) * block);

    for (index, chunk) in plaintext.chunks(max).enumerate() {
        let encrypted = public
            .encrypt(&mut rng, padding(), chunk)
            .map_err(|e| CryptoError::Encryption(format!("block {index}: {e}")))?;
        if encrypted.len() != block {
            return Err(CryptoError::Encryption(format!(
                "block {index}: produced {} bytes, expected {block}",
                encrypted.len()
            )));
        }
        ciphertext.extend_from_slice(&encrypted);
    }

    Ok(ciphertext)
}

/// Decrypt a ciphertext produced by [`encrypt`] with the matching private key.
///
/// Fails without returning any plaintext if the length is not a whole number
/// of blocks or if any block does not open under `private`.
pub fn decrypt(private: &RsaPrivateKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let block = private.size();
    let capacity = chunk_capacity(block)
        .ok_or_else(|| CryptoError::Decryption(modulus_too_small(block)))?;
    if ciphertext.len() % block != 0 {
        return Err(CryptoError::CipherTextLength {
            len: ciphertext.len(),
            block,
        });
    }

    let blocks = ciphertext.len() / block;
    let mut plaintext = Zeroizing::new(Vec::with_capacity(blocks * capacity));

    for (index, encrypted) in ciphertext.chunks_exact(block).enumerate() {
        let mut chunk = private.decrypt(padding(), encrypted).map_err(|_| {
            CryptoError::Decryption(format!(
                "block {index} of {blocks}: wrong key, foreign label, or corrupted data"
            ))
        })?;
        plaintext.extend_from_slice(&chunk);
        chunk.zeroize();
    }

    Ok(std::mem::take(&mut *plaintext))
}
