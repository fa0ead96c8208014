use curve25519_dalek::scalar::Scalar;
use zeroize::Zeroizing;

use crate::point::MsPoint;
use crate::primitives::hash_to_scalar;
use crate::scalar::MsSecret;

/// A Schnorr signature over the Ed25519 group: `R = r·G`, `s = r + c·x` where
/// `c = H_scalar(R || A || message)`.
///
/// Adapted from the teacher's generic FROST Schnorr (`crypto/frost/src/schnorr.rs`)
/// to a concrete, non-generic Ed25519 curve, with the nonce made *deterministic*
/// (spec §4.2: "a deterministic Schnorr signature") rather than drawn from an RNG.
pub struct SchnorrSignature {
  pub r: MsPoint,
  pub s: MsSecret,
}

impl SchnorrSignature {
  pub fn to_bytes(&self) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&self.r.compress());
    out[32..].copy_from_slice(&self.s.to_bytes());
    out
  }
}

fn challenge(r: &MsPoint, pub_key: &MsPoint, message: &[u8]) -> Scalar {
  let mut buf = Vec::with_capacity(64 + message.len());
  buf.extend_from_slice(&r.compress());
  buf.extend_from_slice(&pub_key.compress());
  buf.extend_from_slice(message);
  hash_to_scalar(&buf)
}

fn deterministic_nonce(priv_key: &MsSecret, message: &[u8]) -> Scalar {
  let mut buf = Zeroizing::new(Vec::with_capacity(32 + message.len()));
  buf.extend_from_slice(&priv_key.to_bytes());
  buf.extend_from_slice(message);
  hash_to_scalar(&buf)
}

/// Signs `message` with `priv_key` (whose public counterpart is `pub_key`),
/// deriving the nonce as `H_scalar(priv_key || message)` instead of from an RNG
/// so that builders of the same message always produce the same signature.
pub fn sign(priv_key: &MsSecret, pub_key: &MsPoint, message: &[u8]) -> SchnorrSignature {
  let nonce = deterministic_nonce(priv_key, message);
  let r = MsPoint::mul_base(&nonce);
  let c = challenge(&r, pub_key, message);
  let s = nonce + c * priv_key.inner();
  SchnorrSignature { r, s: MsSecret::from_scalar(s) }
}

/// Verifies `sig` over `message` against `pub_key`: checks `s·G == R + c·A`.
pub fn verify(pub_key: &MsPoint, message: &[u8], sig: &SchnorrSignature) -> bool {
  let c = challenge(&sig.r, pub_key, message);
  let lhs = MsPoint::mul_base(sig.s.inner());
  let rhs = sig.r.add(&pub_key.mul_scalar(&c));
  lhs == rhs
}
