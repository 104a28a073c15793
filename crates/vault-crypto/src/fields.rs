//! Field-level encryption of vault records
//!
//! Every sensitive byte field is passed through the chunked cipher on its
//! own; the record id and owner are copied unchanged. A failure on any field
//! aborts the whole record and no partially transformed record is returned.

use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use vault_core::{Sealed, SealedVaultData, SensitiveFields, VaultData};
use zeroize::Zeroize;

use crate::chunk;
use crate::error::CryptoResult;

/// Encrypt every sensitive field of `record` under `public`.
pub fn encrypt_fields<R: SensitiveFields>(
    record: &R,
    public: &RsaPublicKey,
) -> CryptoResult<Sealed<R>> {
    let mut sealed = record.clone();
    if let Err(e) = transform(&mut sealed, |plain| chunk::encrypt(public, plain)) {
        scrub(&mut sealed);
        return Err(e);
    }
    debug!(kind = %R::KIND, id = %record.id(), "sealed record");
    Ok(Sealed::from_ciphertext(sealed))
}

/// Decrypt every sensitive field of `sealed` with `private`.
pub fn decrypt_fields<R: SensitiveFields>(
    sealed: &Sealed<R>,
    private: &RsaPrivateKey,
) -> CryptoResult<R> {
    let mut record = sealed.as_inner().clone();
    if let Err(e) = transform(&mut record, |cipher| chunk::decrypt(private, cipher)) {
        scrub(&mut record);
        return Err(e);
    }
    debug!(kind = %R::KIND, id = %sealed.id(), "opened record");
    Ok(record)
}

/// Decrypt a list of sealed records, failing on the first record that does
/// not open.
pub fn decrypt_all<R: SensitiveFields>(
    sealed: &[Sealed<R>],
    private: &RsaPrivateKey,
) -> CryptoResult<Vec<R>> {
    sealed.iter().map(|s| decrypt_fields(s, private)).collect()
}

pub fn encrypt_all<R: SensitiveFields>(
    records: &[R],
    public: &RsaPublicKey,
) -> CryptoResult<Vec<Sealed<R>>> {
    records.iter().map(|r| encrypt_fields(r, public)).collect()
}

pub fn seal_vault(data: &VaultData, public: &RsaPublicKey) -> CryptoResult<SealedVaultData> {
    Ok(SealedVaultData {
        credentials: encrypt_all(&data.credentials, public)?,
        cards: encrypt_all(&data.cards, public)?,
        notes: encrypt_all(&data.notes, public)?,
        blobs: encrypt_all(&data.blobs, public)?,
    })
}

pub fn open_vault(data: &SealedVaultData, private: &RsaPrivateKey) -> CryptoResult<VaultData> {
    Ok(VaultData {
        credentials: decrypt_all(&data.credentials, private)?,
        cards: decrypt_all(&data.cards, private)?,
        notes: decrypt_all(&data.notes, private)?,
        blobs: decrypt_all(&data.blobs, private)?,
    })
}

fn transform<R, F>(record: &mut R, mut op: F) -> CryptoResult<()>
where
    R: SensitiveFields,
    F: FnMut(&[u8]) -> CryptoResult<Vec<u8>>,
{
    for (name, value) in record.sensitive_fields_mut() {
        let replaced = op(value).map_err(|e| e.in_field(R::KIND, name))?;
        value.zeroize();
        *value = replaced;
    }
    Ok(())
}

fn scrub<R: SensitiveFields>(record: &mut R) {
    for (_, value) in record.sensitive_fields_mut() {
        value.zeroize();
    }
}
