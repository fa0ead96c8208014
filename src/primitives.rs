use curve25519_dalek::scalar::Scalar;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use crate::error::MultisigError;
use crate::point::MsPoint;
use crate::scalar::MsSecret;

/// Domain separator for `blind` (spec §4.1). 32 bytes, ASCII, zero-padded, in
/// the style of Monero's `HASH_KEY_MULTISIG`. The original byte value lives in
/// `cryptonote_config.h`, which wasn't part of the source retrieved for this
/// port; this tag is this crate's own choice of a distinct, fixed 32-byte
/// constant serving the same domain-separation role (see DESIGN.md).
pub const DOMAIN_MULTISIG: &[u8; 32] = b"monero_multisig_blinded_key_____";

/// Domain separator for the aggregation coefficient (spec §4.4), distinct from
/// `DOMAIN_MULTISIG`. Same provenance note as above.
pub const DOMAIN_MULTISIG_KEY_AGGREGATION: &[u8; 32] = b"monero_multisig_key_aggregation_";

/// Keccak-256, the hash this ecosystem uses everywhere (`monero-generators`,
/// `tiny-keccak` is the teacher's own dependency for it).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
  let mut hasher = Keccak::v256();
  hasher.update(data);
  let mut out = [0u8; 32];
  hasher.finalize(&mut out);
  out
}

/// `H_scalar`: Keccak-256 followed by mod-`ℓ` reduction of the 32-byte digest.
///
/// This mirrors Monero's `crypto::hash_to_scalar` (keccak256 then `sc_reduce32`,
/// a *narrow* reduction of the 32-byte digest), not the 64-byte "wide" reduction
/// some other hash-to-scalar constructions use — confirmed against the
/// `derivation_to_scalar` idiom used throughout this ecosystem's Rust ports.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
  Scalar::from_bytes_mod_order(keccak256(data))
}

/// `Hp`: hash-to-curve, delegated to `monero_generators::hash_to_point` rather
/// than hand-rolling elligator2 (see DESIGN.md / SPEC_FULL.md §10).
pub fn hash_to_point(bytes: &[u8; 32]) -> MsPoint {
  MsPoint::from_point(monero_generators::hash_to_point(*bytes))
}

/// `blind(x) = H_scalar(x || DOMAIN_MULTISIG)` (spec §4.1).
///
/// Fails with `NullSecret` if `x` is the canonical null scalar. The transient
/// concatenation buffer is zeroized before return.
pub fn blind(x: &MsSecret) -> Result<MsSecret, MultisigError> {
  if x.is_null() {
    return Err(MultisigError::NullSecret);
  }
  let mut buf = Zeroizing::new([0u8; 64]);
  buf[..32].copy_from_slice(&x.to_bytes());
  buf[32..].copy_from_slice(DOMAIN_MULTISIG);
  Ok(MsSecret::from_scalar(hash_to_scalar(&buf[..])))
}
