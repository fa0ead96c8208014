use std::collections::HashSet;

use crate::error::MultisigError;
use crate::point::MsPoint;
use crate::primitives::hash_to_point;
use crate::scalar::MsSecret;

/// `KeyImage` is the same 32-byte shape as `Pt` (spec §3); see `lib.rs`.
pub type KeyImage = MsPoint;

/// Derives the non-multisig portion of a one-time output's spend secret:
/// `x_view_component + x_subaddress_component` in spec §4.6 step 1.
///
/// This stands in for `cryptonote::generate_key_image_helper`, which is out of
/// scope for this crate (spec §1 excludes "daemon RPC... transaction
/// construction" and subaddress/address-book bookkeeping; `original_source/`
/// confirms `generate_key_image_helper` itself lives outside
/// `src/multisig/`). Hosts implement this trait against their own wallet
/// state (view key, subaddress table, output-ownership checks) and return
/// `AddressDerivationFailure` for anything that isn't a cryptographic failure
/// in this crate's own logic (output not owned by the group, bad tx data).
pub trait OneTimeAddressDeriver {
  fn derive_onetime_secret(
    &self,
    out_key: &MsPoint,
    tx_pub: &MsPoint,
    additional_tx_pubs: &[MsPoint],
    real_output_index: usize,
  ) -> Result<MsSecret, MultisigError>;
}

/// `generate_multisig_key_image` (spec §6.2): the key-image component
/// contributed by the local account's `idx`-th multisig share alone,
/// `Hp(out_key) * multisig_privkeys[idx]`.
pub fn generate_multisig_key_image(
  multisig_privkeys: &[MsSecret],
  idx: usize,
  out_key: &MsPoint,
) -> Result<KeyImage, MultisigError> {
  let share = multisig_privkeys
    .get(idx)
    .ok_or(MultisigError::OutOfRange { index: idx, len: multisig_privkeys.len() })?;
  let hp = hash_to_point(&out_key.compress());
  Ok(hp.mul_scalar(share.inner()))
}

/// `generate_multisig_LR` (spec §6.2): `L = k*G`, `R = k*Hp(out_key)`, the pair
/// consumed by higher-level multisig signing protocols not covered here.
pub fn generate_multisig_lr(out_key: &MsPoint, k: &MsSecret) -> (MsPoint, MsPoint) {
  let hp = hash_to_point(&out_key.compress());
  let l = MsPoint::mul_base(k.inner());
  let r = hp.mul_scalar(k.inner());
  (l, r)
}

/// `generate_multisig_composite_key_image` (spec §4.6 / §6.2).
///
/// Combines the local account's own key-image components (folded into a
/// partial key image via `deriver`) with `peer_components` received from
/// other signers. The "used" set deduplicates a peer component against one
/// the local account already contributed, matching
/// `original_source/src/multisig/multisig.cpp`'s `used`-set loop line for
/// line. The result is the true key image only if `peer_components` plus the
/// local shares together cover all `N` components — this function has no way
/// to check that and does not claim to; see spec §4.6 closing paragraph.
#[allow(clippy::too_many_arguments)]
pub fn generate_multisig_composite_key_image(
  deriver: &dyn OneTimeAddressDeriver,
  multisig_privkeys: &[MsSecret],
  out_key: &MsPoint,
  tx_pub: &MsPoint,
  additional_tx_pubs: &[MsPoint],
  real_output_index: usize,
  peer_components: &[KeyImage],
) -> Result<KeyImage, MultisigError> {
  let x_base = deriver.derive_onetime_secret(out_key, tx_pub, additional_tx_pubs, real_output_index)?;
  let hp = hash_to_point(&out_key.compress());

  let mut x_total = *x_base.inner();
  for s in multisig_privkeys {
    x_total = x_total + s.inner();
  }
  let mut ki_partial = hp.mul_scalar(&x_total);

  let mut used: HashSet<KeyImage> = HashSet::with_capacity(multisig_privkeys.len());
  for s in multisig_privkeys {
    used.insert(hp.mul_scalar(s.inner()));
  }

  for component in peer_components {
    if used.insert(*component) {
      ki_partial = ki_partial.add(component);
    }
  }

  Ok(ki_partial)
}
