//! Fixed-shape lock/unlock scripts.
//!
//! Every output is locked with the same five-token script; every input is
//! unlocked with the same two-token script. There is no general-purpose
//! script VM: the token layout is closed, so the types below are the
//! closed set of variants §9 asks for rather than an interpreter over an
//! open instruction set.

use serde::{Deserialize, Serialize};
use shared::crypto;

pub const DUP: &str = "<DUP>";
pub const HASH160: &str = "<HASH-160>";
pub const EQ_VERIFY: &str = "<EQ-VERIFY>";
pub const CHECK_SIG: &str = "<CHECK-SIG>";

/// `<DUP> <HASH-160> <pkhash> <EQ-VERIFY> <CHECK-SIG>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockScript([String; 5]);

impl LockScript {
    #[must_use]
    pub fn p2pkh(pkhash: &str) -> Self {
        Self([
            DUP.to_string(),
            HASH160.to_string(),
            pkhash.to_string(),
            EQ_VERIFY.to_string(),
            CHECK_SIG.to_string(),
        ])
    }

    #[must_use]
    pub fn pkhash(&self) -> &str {
        &self.0[2]
    }

    /// Checks the four fixed tokens and that the pkhash slot holds a
    /// syntactically valid RIPEMD-160 digest.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0[0] == DUP
            && self.0[1] == HASH160
            && self.0[3] == EQ_VERIFY
            && self.0[4] == CHECK_SIG
            && crypto::is_valid_ripemd160(&self.0[2])
    }
}

/// `<signature hex> <public key text>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockScript([String; 2]);

impl UnlockScript {
    #[must_use]
    pub fn new(signature_hex: impl Into<String>, public_key_pem: impl Into<String>) -> Self {
        Self([signature_hex.into(), public_key_pem.into()])
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.0[0]
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.0[1]
    }

    /// Unlocks a fragment: the hash of the supplied public key must match
    /// `pkhash`, and the signature must verify over the public key string
    /// itself (not over the transaction hash).
    #[must_use]
    pub fn unlocks(&self, pkhash: &str) -> bool {
        if crypto::pkhash(self.public_key()) != pkhash {
            return false;
        }
        let public_key = shared::PublicKey::from(self.public_key().to_string());
        crypto::verify(&public_key, self.public_key(), self.signature())
    }
}
