use std::collections::HashMap;

use crate::error::MultisigError;
use crate::point::MsPoint;
use crate::primitives::{hash_to_scalar, DOMAIN_MULTISIG_KEY_AGGREGATION};
use crate::scalar::MsSecret;

/// `coeff(K, L) = H_scalar(K || K_1 || … || K_t || DOMAIN_MULTISIG_KEY_AGGREGATION)`
/// (spec §4.4). `sorted_keys` must already be `L`, sorted ascending.
pub fn aggregation_coefficient(key: &MsPoint, sorted_keys: &[MsPoint]) -> MsSecret {
  let mut buf = Vec::with_capacity(32 * (sorted_keys.len() + 2));
  buf.extend_from_slice(&key.compress());
  for k in sorted_keys {
    buf.extend_from_slice(&k.compress());
  }
  buf.extend_from_slice(DOMAIN_MULTISIG_KEY_AGGREGATION);
  MsSecret::from_scalar(hash_to_scalar(&buf))
}

/// Aggregates `final_keys` (the peer-contributed final-round components) with
/// the local `privkeys_inout`'s own public counterparts into the group spend
/// key, mutating `privkeys_inout` in place by multiplying each share by its
/// coefficient (spec §4.4). Returns the aggregated group public key.
pub fn generate_multisig_aggregate_key(
  mut final_keys: Vec<MsPoint>,
  privkeys_inout: &mut Vec<MsSecret>,
) -> Result<MsPoint, MultisigError> {
  let mut own_keys: HashMap<MsPoint, usize> = HashMap::with_capacity(privkeys_inout.len());
  for (i, s) in privkeys_inout.iter().enumerate() {
    let p = MsPoint::mul_base(s.inner());
    own_keys.insert(p, i);
    final_keys.push(p);
  }

  final_keys.sort();
  for w in final_keys.windows(2) {
    if w[0] == w[1] {
      return Err(MultisigError::DuplicateSigner);
    }
  }

  let mut aggregate = MsPoint::identity();
  for key in &final_keys {
    let coeff = aggregation_coefficient(key, &final_keys);
    if let Some(&idx) = own_keys.get(key) {
      let new_scalar = coeff.inner() * privkeys_inout[idx].inner();
      let blinded = MsSecret::from_scalar(new_scalar);
      if blinded.is_null() {
        return Err(MultisigError::NullSecret);
      }
      privkeys_inout[idx] = blinded;
    }
    aggregate = aggregate.add(&key.mul_scalar(coeff.inner()));
  }

  Ok(aggregate)
}
