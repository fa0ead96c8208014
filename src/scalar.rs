use curve25519_dalek::scalar::Scalar;
use zeroize::Zeroize;

/// A secret Ed25519 scalar that zeroizes its backing bytes on drop.
///
/// Equality is derived from the inner canonical bytes and is *not* constant-time.
/// This is a deliberate, documented limitation (see spec §3 / §9): these scalars
/// become publicly derivable via their corresponding points once key exchange
/// completes, so timing leaks on comparison are not a live concern here.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MsSecret(pub(crate) Scalar);

impl MsSecret {
  pub fn from_scalar(scalar: Scalar) -> Self {
    MsSecret(scalar)
  }

  pub fn from_canonical_bytes(bytes: [u8; 32]) -> Option<Self> {
    Scalar::from_canonical_bytes(bytes).map(MsSecret)
  }

  /// The canonical null (zero) scalar. Used as the "absent" `msg_privkey` filler
  /// for non-round-1 KEX messages (spec §3 "otherwise the canonical null scalar").
  pub fn null() -> Self {
    MsSecret(Scalar::zero())
  }

  /// Reinterprets a raw 32-byte string as a scalar *without* reducing mod `ℓ`.
  ///
  /// Used only to type-pun a DH-derivation point's compressed bytes into the
  /// input of `blind` (spec §4.3.5 step 4, `scalar_from_point_bytes(D)`): the
  /// bytes are hashed, never used in scalar arithmetic directly, so canonical
  /// reduction isn't required here, matching the original's direct byte copy
  /// from a `public_key` into a `secret_key` before hashing.
  pub fn from_raw_unreduced(bytes: [u8; 32]) -> Self {
    MsSecret(Scalar::from_bits(bytes))
  }

  pub fn to_bytes(&self) -> [u8; 32] {
    self.0.to_bytes()
  }

  pub fn is_null(&self) -> bool {
    self.0 == Scalar::zero()
  }

  pub fn inner(&self) -> &Scalar {
    &self.0
  }
}

impl PartialEq for MsSecret {
  fn eq(&self, other: &Self) -> bool {
    self.0.as_bytes() == other.0.as_bytes()
  }
}
impl Eq for MsSecret {}

impl PartialOrd for MsSecret {
  fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for MsSecret {
  // Byte-order comparison, used only to sort participants' common-key contributions
  // before hashing. Non-constant-time; see spec §9 "Timing side channels".
  fn cmp(&self, other: &Self) -> core::cmp::Ordering {
    self.0.as_bytes().cmp(other.0.as_bytes())
  }
}

impl core::fmt::Debug for MsSecret {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("MsSecret(..)")
  }
}

/// Serializes as the canonical 32-byte encoding (spec §6.5: the host persists
/// `Account`, which embeds these secrets directly). The serialized buffer
/// itself is not zeroized; the host's persistence layer owns that
/// responsibility once bytes leave this crate.
impl serde::Serialize for MsSecret {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bytes(&self.to_bytes())
  }
}

impl<'de> serde::Deserialize<'de> for MsSecret {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
    let array: [u8; 32] = bytes
      .try_into()
      .map_err(|_| serde::de::Error::custom("expected 32 bytes for a scalar"))?;
    MsSecret::from_canonical_bytes(array).ok_or_else(|| serde::de::Error::custom("non-canonical scalar encoding"))
  }
}
