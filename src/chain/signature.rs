//! Personal-message signature verification and provider signing.
//!
//! Implements the standard prefixed-message convention: the signed digest is
//! `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`.
//! Consumers sign request payloads with their wallet; the gateway recovers
//! the signer and compares it to the claimed address. The provider account
//! uses the same convention to counter-sign compute attestations.

use crate::chain::format_address;
use crate::error::{Error, Result};
use ethereum_types::{H160, H256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// Length of an `r || s || v` recoverable signature.
pub const SIGNATURE_LEN: usize = 65;

/// keccak-256 digest of arbitrary bytes.
#[must_use]
pub fn keccak256(data: &[u8]) -> H256 {
    use tiny_keccak::{Hasher, Keccak};

    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    H256(out)
}

/// Digest of `message` under the personal-message signing convention.
///
/// Deterministic: the prefix embeds the byte length of the message, so two
/// distinct messages never alias.
#[must_use]
pub fn prefixed_message_hash(message: &str) -> H256 {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{message}", message.len());
    keccak256(prefixed.as_bytes())
}

/// Recover the address that signed `message`.
///
/// Accepts recovery ids in both raw (`0`/`1`) and legacy (`27`/`28`) form.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] when the signature is not 65 bytes,
/// the recovery id is out of range, or point recovery fails.
pub fn recover_signer(message: &str, signature: &[u8]) -> Result<H160> {
    if signature.len() != SIGNATURE_LEN {
        return Err(Error::InvalidSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let v = match signature[64] {
        raw @ (0 | 1) => raw,
        legacy @ (27 | 28) => legacy - 27,
        other => {
            return Err(Error::InvalidSignature(format!(
                "recovery id {other} out of range"
            )))
        }
    };
    let recovery_id = RecoveryId::from_i32(i32::from(v))
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    let sig = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    let digest = Message::from_digest(prefixed_message_hash(message).0);
    let public = Secp256k1::new()
        .recover_ecdsa(&digest, &sig)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    Ok(address_of(&public))
}

/// Verify that `signature` over `message` was produced by `claimed`.
///
/// Address comparison is on the raw 20 bytes, so hex-casing differences in
/// the request cannot cause a spurious mismatch.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] when recovery fails or the recovered
/// address differs from `claimed`.
pub fn verify_signature(claimed: H160, signature: &[u8], message: &str) -> Result<()> {
    let recovered = recover_signer(message, signature)?;
    if recovered == claimed {
        Ok(())
    } else {
        Err(Error::InvalidSignature(format!(
            "recovered signer {} does not match the claimed address {}",
            format_address(recovered),
            format_address(claimed)
        )))
    }
}

/// Parse a `0x`-prefixed (or bare) hex signature string.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] on non-hex input.
pub fn decode_signature(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| Error::InvalidSignature(format!("signature is not valid hex: {e}")))
}

/// Address derived from a public key: last 20 bytes of the keccak-256 of the
/// uncompressed point (without the `0x04` tag).
#[must_use]
pub fn address_of(public: &PublicKey) -> H160 {
    let uncompressed = public.serialize_uncompressed();
    let digest = keccak256(&uncompressed[1..]);
    H160::from_slice(&digest.as_bytes()[12..])
}

/// The gateway operator's blockchain identity.
///
/// Holds the secp256k1 secret used to counter-sign compute attestations and
/// to derive the file-list decryption key. The secret never appears in
/// `Debug` output or logs.
#[derive(Clone)]
pub struct ProviderAccount {
    secret: SecretKey,
    address: H160,
}

impl std::fmt::Debug for ProviderAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ProviderAccount {
    /// Build an account from a 32-byte hex-encoded secret key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the key is not valid hex or not a
    /// valid curve scalar.
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim().trim_start_matches("0x"))
            .map_err(|e| Error::Config(format!("provider key is not valid hex: {e}")))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("provider key rejected: {e}")))?;
        Ok(Self::from_secret(secret))
    }

    /// Build an account from an already-parsed secret key.
    #[must_use]
    pub fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let address = address_of(&PublicKey::from_secret_key(&secp, &secret));
        Self { secret, address }
    }

    /// The account's address.
    #[must_use]
    pub fn address(&self) -> H160 {
        self.address
    }

    /// Lowercase `0x`-prefixed address string, as attached to wire bodies.
    #[must_use]
    pub fn address_hex(&self) -> String {
        format_address(self.address)
    }

    /// Sign `message` under the personal-message convention.
    ///
    /// The returned signature is `r || s || v` with a legacy recovery id
    /// (`27`/`28`), which [`recover_signer`] round-trips.
    #[must_use]
    pub fn sign_message(&self, message: &str) -> [u8; SIGNATURE_LEN] {
        let digest = Message::from_digest(prefixed_message_hash(message).0);
        let (recovery_id, compact) = Secp256k1::new()
            .sign_ecdsa_recoverable(&digest, &self.secret)
            .serialize_compact();

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&compact);
        // to_i32 is 0..=3; only 0/1 occur for canonical signatures
        out[64] = 27 + u8::try_from(recovery_id.to_i32()).unwrap_or(0);
        out
    }

    /// Raw secret bytes, for key derivation (file-list decryption).
    #[must_use]
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }
}
