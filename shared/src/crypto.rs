//! Cryptographic primitives: SHA-256/RIPEMD-160 hashing, ECDSA over NIST
//! P-256, and the base58 address codec.
//!
//! Keys are carried as opaque PEM text end to end, matching the wire shape
//! transactions actually put in scripts (hex signature, PEM-ish public key
//! string) — callers never touch a raw curve point.

use crate::{BlockchainError, Hash256, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::RngCore;
use ripemd::Ripemd160;
use sha2::Digest;
use zeroize::Zeroize;

/// An ECDSA P-256 public key, kept as its SPKI PEM text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PublicKey {
    pem: String,
}

/// An ECDSA P-256 private key, kept as its PKCS8 PEM text. Zeroized on drop.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    pem: String,
}

/// A generated signing keypair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// A hex-encoded ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signature {
    hex: String,
}

impl PublicKey {
    #[must_use]
    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_public_key_pem(&self.pem)
            .map_err(|_| BlockchainError::CryptographicError("malformed public key PEM".into()))
    }
}

impl From<String> for PublicKey {
    fn from(pem: String) -> Self {
        Self { pem }
    }
}

impl PrivateKey {
    #[must_use]
    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_pkcs8_pem(&self.pem)
            .map_err(|_| BlockchainError::CryptographicError("malformed private key PEM".into()))
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        self.pem.zeroize();
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl KeyPair {
    /// Generates a fresh P-256 keypair.
    ///
    /// # Errors
    ///
    /// Returns an error if PEM encoding fails.
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        let private_pem = signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|_| BlockchainError::CryptographicError("key encoding failed".into()))?;
        let public_pem = verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| BlockchainError::CryptographicError("key encoding failed".into()))?;

        Ok(Self {
            public_key: PublicKey {
                pem: public_pem,
            },
            private_key: PrivateKey {
                pem: private_pem.to_string(),
            },
        })
    }

    /// Signs `message` with the private key. The ECDSA signature is computed
    /// deterministically over SHA-256(message), per RFC 6979.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key PEM is malformed.
    pub fn sign(&self, message: &str) -> Result<Signature> {
        sign(&self.private_key, message)
    }
}

/// Computes the 64-char lowercase hex SHA-256 digest of the ASCII bytes of `s`.
#[must_use]
pub fn sha256(s: &str) -> String {
    Hash256::sha256(s).to_hex()
}

/// Computes the 40-char lowercase hex RIPEMD-160 digest of the ASCII bytes of `s`.
#[must_use]
pub fn ripemd160(s: &str) -> String {
    let mut hasher = Ripemd160::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Tests whether a string has the syntactic shape of a RIPEMD-160 hex digest.
#[must_use]
pub fn is_valid_ripemd160(digest: &str) -> bool {
    digest.len() == 40 && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `pkhash = ripemd160(sha256(public_key))`.
#[must_use]
pub fn pkhash(public_key_pem: &str) -> String {
    ripemd160(&sha256(public_key_pem))
}

/// Generates a new P-256 keypair as PEM text.
///
/// # Errors
///
/// Returns an error if key encoding fails.
pub fn make_keys() -> Result<(PrivateKey, PublicKey)> {
    let pair = KeyPair::generate()?;
    Ok((pair.private_key, pair.public_key))
}

/// Signs `message` with `priv_key`, returning a hex-encoded ECDSA signature
/// over SHA-256(message).
///
/// # Errors
///
/// Returns an error if the private key PEM is malformed.
pub fn sign(priv_key: &PrivateKey, message: &str) -> Result<Signature> {
    let signing_key = priv_key.signing_key()?;
    let signature: EcdsaSignature = signing_key.sign(message.as_bytes());
    Ok(Signature {
        hex: hex::encode(signature.to_bytes()),
    })
}

/// Verifies a hex-encoded ECDSA signature over SHA-256(message) against `pub_key`.
#[must_use]
pub fn verify(pub_key: &PublicKey, message: &str, signature_hex: &str) -> bool {
    let Ok(verifying_key) = pub_key.verifying_key() else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// Signs a transaction hash with the given keypair.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn sign_transaction_hash(tx_hash: &Hash256, keypair: &KeyPair) -> Result<Signature> {
    keypair.sign(&tx_hash.to_hex())
}

/// Verifies a signature against a transaction hash.
#[must_use]
pub fn verify_transaction_signature(tx_hash: &Hash256, public_key: &PublicKey, signature: &Signature) -> bool {
    verify(public_key, &tx_hash.to_hex(), &signature.hex)
}

impl Signature {
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl From<String> for Signature {
    fn from(hex: String) -> Self {
        Self { hex }
    }
}

/// Generates a Helium address from a public key PEM. `prefix` must be `'1'`.
///
/// # Errors
///
/// Returns an error if `prefix` is not `'1'`.
pub fn make_address(prefix: char, public_key_pem: &str) -> Result<String> {
    if prefix != '1' {
        return Err(BlockchainError::CryptographicError(
            "address prefix must be '1'".into(),
        ));
    }
    let h = pkhash(public_key_pem);
    let tmp = format!("{prefix}{h}");
    let checksum = &sha256(&tmp)[60..];
    let payload = format!("{tmp}{checksum}");
    Ok(bs58::encode(payload.as_bytes()).into_string())
}

/// Validates a base58-encoded Helium address by recomputing its checksum.
#[must_use]
pub fn validate_address(address: &str) -> bool {
    let Ok(decoded) = bs58::decode(address).into_vec() else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    if decoded.len() != 45 {
        return false;
    }
    if !decoded.starts_with('1') {
        return false;
    }
    let (body, extracted_checksum) = decoded.split_at(decoded.len() - 4);
    let recomputed = &sha256(body)[60..];
    extracted_checksum == recomputed
}

/// Generates a cryptographically strong 64-hex-character random identifier.
#[must_use]
pub fn make_uuid() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let (priv_key, pub_key) = make_keys().unwrap();
        let message = "transfer 500 to 1Abc...";
        let signature = sign(&priv_key, message).unwrap();
        assert!(verify(&pub_key, message, signature.as_hex()));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (priv_key, pub_key) = make_keys().unwrap();
        let message = "payload";
        let mut signature = sign(&priv_key, message).unwrap();
        let mut bytes = hex::decode(&signature.hex).unwrap();
        bytes[0] ^= 0xFF;
        signature.hex = hex::encode(bytes);
        assert!(!verify(&pub_key, message, signature.as_hex()));
    }

    #[test]
    fn mismatched_key_fails_verification() {
        let (priv_key, _) = make_keys().unwrap();
        let (_, other_pub) = make_keys().unwrap();
        let signature = sign(&priv_key, "hello").unwrap();
        assert!(!verify(&other_pub, "hello", signature.as_hex()));
    }

    #[test]
    fn address_round_trip() {
        let (_, pub_key) = make_keys().unwrap();
        let address = make_address('1', pub_key.as_pem()).unwrap();
        assert!(validate_address(&address));
    }

    #[test]
    fn mutated_address_fails_validation() {
        let (_, pub_key) = make_keys().unwrap();
        let mut address = make_address('1', pub_key.as_pem()).unwrap();
        let last = address.pop().unwrap();
        let replacement = if last == 'a' { 'b' } else { 'a' };
        address.push(replacement);
        assert!(!validate_address(&address));
    }

    #[test]
    fn pkhash_is_ripemd160_of_sha256() {
        let (_, pub_key) = make_keys().unwrap();
        let h = pkhash(pub_key.as_pem());
        assert!(is_valid_ripemd160(&h));
    }

    #[test]
    fn uuid_is_64_hex_chars_and_unique() {
        let a = make_uuid();
        let b = make_uuid();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
