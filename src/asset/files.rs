//! Encrypted file-list handling.
//!
//! An asset's download URLs are published only in encrypted form; the
//! provider account is the sole party able to recover them. The blob is
//! AES-256-GCM-SIV over the JSON file list, keyed by an HKDF-SHA256
//! derivation from the provider secret, laid out as `nonce || ciphertext`
//! and hex-encoded. Some publishers wrap the hex blob in a JSON envelope
//! (`{"encryptedDocument": "0x..."}`); both forms are accepted.

use crate::asset::Asset;
use crate::chain::signature::{keccak256, ProviderAccount};
use crate::error::{Error, Result};
use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;

/// Domain separation for the file-list key derivation.
const FILE_LIST_INFO: &[u8] = b"tollgate-file-list-v1";

/// GCM-SIV nonce length.
const NONCE_LEN: usize = 12;

fn file_list_key(account: &ProviderAccount) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, &account.secret_bytes());
    let mut key = [0u8; 32];
    hk.expand(FILE_LIST_INFO, &mut key)
        .map_err(|e| Error::Decryption(format!("key derivation failed: {e}")))?;
    Ok(key)
}

/// Decrypt an asset's encrypted file-list blob to its JSON plaintext.
///
/// # Errors
///
/// Returns [`Error::Decryption`] when the blob is not valid hex, too short
/// to carry a nonce, or fails authenticated decryption.
pub fn decrypt_file_list(encrypted: &str, account: &ProviderAccount) -> Result<String> {
    // Unwrap the JSON envelope form
    let blob = if encrypted.trim_start().starts_with('{') {
        let envelope: serde_json::Value = serde_json::from_str(encrypted)
            .map_err(|e| Error::Decryption(format!("bad envelope: {e}")))?;
        envelope
            .get("encryptedDocument")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::Decryption("envelope has no encryptedDocument".to_string()))?
            .to_string()
    } else {
        encrypted.to_string()
    };

    let bytes = hex::decode(blob.trim().trim_start_matches("0x"))
        .map_err(|e| Error::Decryption(format!("blob is not valid hex: {e}")))?;
    if bytes.len() <= NONCE_LEN {
        return Err(Error::Decryption(format!(
            "blob of {} bytes is too short",
            bytes.len()
        )));
    }

    let key = file_list_key(account)?;
    let cipher = Aes256GcmSiv::new_from_slice(&key)
        .map_err(|e| Error::Decryption(format!("bad key: {e}")))?;
    let nonce = Nonce::from_slice(&bytes[..NONCE_LEN]);

    let plaintext = cipher
        .decrypt(nonce, &bytes[NONCE_LEN..])
        .map_err(|_| Error::Decryption("authentication failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| Error::Decryption(format!("plaintext is not utf-8: {e}")))
}

/// Encrypt a JSON file list for publication.
///
/// The nonce is derived from the plaintext; GCM-SIV tolerates deterministic
/// nonces, and publish-time encryption must be reproducible.
///
/// # Errors
///
/// Returns [`Error::Decryption`] when encryption fails.
pub fn encrypt_file_list(plaintext: &str, account: &ProviderAccount) -> Result<String> {
    let key = file_list_key(account)?;
    let cipher = Aes256GcmSiv::new_from_slice(&key)
        .map_err(|e| Error::Decryption(format!("bad key: {e}")))?;

    let digest = keccak256(plaintext.as_bytes());
    let nonce = Nonce::from_slice(&digest.as_bytes()[..NONCE_LEN]);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| Error::Decryption("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(format!("0x{}", hex::encode(out)))
}

/// Recover every download URL of `asset`, in file-list order.
///
/// # Errors
///
/// Returns [`Error::Decryption`] when the blob cannot be decrypted, or
/// [`Error::MalformedFileList`] when the plaintext is not a list of file
/// objects each carrying a `url`.
pub fn asset_urls(asset: &Asset, account: &ProviderAccount) -> Result<Vec<String>> {
    debug!(did = %asset.did, "decrypting asset file list");

    let plaintext = decrypt_file_list(&asset.encrypted_files, account)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&plaintext)
        .map_err(|e| Error::MalformedFileList(format!("expected a JSON list: {e}")))?;

    let mut urls = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let object = entry.as_object().ok_or_else(|| {
            Error::MalformedFileList(format!("entry {i} is not a file object"))
        })?;
        let url = object
            .get("url")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Error::MalformedFileList(format!("entry {i} has no \"url\" key"))
            })?;
        urls.push(url.to_string());
    }
    Ok(urls)
}

/// Recover the download URL at `index`.
///
/// # Errors
///
/// Propagates [`asset_urls`] failures, and returns
/// [`Error::MalformedFileList`] when `index` is past the end of the list.
pub fn asset_url_at_index(
    index: usize,
    asset: &Asset,
    account: &ProviderAccount,
) -> Result<String> {
    let urls = asset_urls(asset, account)?;
    let len = urls.len();
    urls.into_iter().nth(index).ok_or_else(|| {
        Error::MalformedFileList(format!(
            "url index {index} is invalid for a list of {len} files"
        ))
    })
}
