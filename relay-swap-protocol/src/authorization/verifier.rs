//! Signature recovery and signer checks. Every failure path reports "not
//! verified"; nothing here panics on attacker-controlled bytes.

use ethers::types::{Address, RecoveryMessage, Signature, H256, U256};
use thiserror::Error;

pub const SIGNATURE_LENGTH: usize = 65;

// secp256k1 group order divided by two; larger `s` values are the malleable twin
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x5d, 0x57,
    0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("signature must be {SIGNATURE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
    #[error("malformed signature: {0}")]
    Malformed(String),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u64),
    #[error("signature s value is in the upper half of the curve order")]
    MalleableSignature,
    #[error("signer recovery failed: {0}")]
    RecoveryFailed(String),
    #[error("signature recovers to the zero address")]
    ZeroSigner,
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_signer(digest: H256, signature: &[u8]) -> Result<Address, VerifyError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(VerifyError::InvalidLength(signature.len()));
    }
    let sig = Signature::try_from(signature).map_err(|e| VerifyError::Malformed(e.to_string()))?;

    if sig.r.is_zero() || sig.s.is_zero() {
        return Err(VerifyError::Malformed("zero r or s".to_string()));
    }
    if sig.s > U256::from_big_endian(&SECP256K1_HALF_ORDER) {
        return Err(VerifyError::MalleableSignature);
    }
    if sig.v != 27 && sig.v != 28 {
        return Err(VerifyError::InvalidRecoveryId(sig.v));
    }

    let signer = sig
        .recover(RecoveryMessage::Hash(digest))
        .map_err(|e| VerifyError::RecoveryFailed(e.to_string()))?;
    if signer.is_zero() {
        return Err(VerifyError::ZeroSigner);
    }
    Ok(signer)
}

/// True only if `signature` over `digest` recovers exactly to `expected_party`.
pub fn verify(digest: H256, signature: &[u8], expected_party: Address) -> bool {
    if expected_party.is_zero() {
        return false;
    }
    match recover_signer(digest, signature) {
        Ok(signer) => signer == expected_party,
        Err(e) => {
            log::debug!("[Verifier] Rejecting signature for {:?}: {}", expected_party, e);
            false
        }
    }
}
