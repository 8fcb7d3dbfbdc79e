//! Ed25519 signing and verification for binding claims.
//!
//! A hotkey is the hex encoding of an Ed25519 verifying key. Verification is
//! deliberately a plain boolean: a malformed hotkey, malformed signature hex,
//! and a genuine signature mismatch are indistinguishable to the caller,
//! since all of them mean the claim cannot be trusted.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Verify `signature_hex` over `message` against the hotkey's public key.
///
/// Never panics and never surfaces a decode error.
pub fn verify(hotkey: &str, message: &[u8], signature_hex: &str) -> bool {
    let Some(key) = decode_hotkey(hotkey) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

fn decode_hotkey(hotkey: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(hotkey).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

/// The miner-side half of the scheme: holds a signing key and produces the
/// hex artifacts a claim carries.
#[derive(Debug, Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Hex encoding of the verifying key, i.e. the hotkey string.
    pub fn hotkey(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message` and return the hex-encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }
}
