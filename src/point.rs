use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;

/// A 32-byte Ed25519 point, compared and hashed by its canonical compressed
/// encoding rather than by curve coordinates.
///
/// `SignerId` and `KeyImage` (see `lib.rs`) are both aliases of this type; they
/// share the same 32-byte shape and the same "compare by compressed bytes" rule
/// spec §9 calls for when these values are used as map/set keys.
#[derive(Clone, Copy)]
pub struct MsPoint(EdwardsPoint);

impl MsPoint {
  pub fn from_point(point: EdwardsPoint) -> Self {
    MsPoint(point)
  }

  pub fn identity() -> Self {
    MsPoint(EdwardsPoint::default())
  }

  pub fn mul_base(scalar: &Scalar) -> Self {
    MsPoint(scalar * &ED25519_BASEPOINT_TABLE)
  }

  /// Decompresses a 32-byte point, rejecting any encoding that isn't a valid
  /// curve point (but not requiring main-subgroup membership; callers that care
  /// use `is_in_main_subgroup`).
  pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
    CompressedEdwardsY(*bytes).decompress().map(MsPoint)
  }

  pub fn compress(&self) -> [u8; 32] {
    self.0.compress().to_bytes()
  }

  pub fn inner(&self) -> &EdwardsPoint {
    &self.0
  }

  pub fn is_identity(&self) -> bool {
    self.0 == EdwardsPoint::default()
  }

  /// True iff this point lies in Ed25519's prime-order subgroup (order `ℓ`).
  pub fn is_in_main_subgroup(&self) -> bool {
    self.0.is_torsion_free()
  }

  pub fn add(&self, other: &MsPoint) -> MsPoint {
    MsPoint(self.0 + other.0)
  }

  pub fn mul_scalar(&self, scalar: &Scalar) -> MsPoint {
    MsPoint(self.0 * scalar)
  }

  /// Clears the cofactor by multiplying by 8. Used on DH derivations per
  /// spec §4.3.5 step 3: "Including cofactor means exactly the multiplication
  /// by 8 is applied; omitting it leaks one bit of `base_priv`."
  pub fn mul_by_cofactor(&self) -> MsPoint {
    MsPoint(self.0.mul_by_cofactor())
  }
}

impl PartialEq for MsPoint {
  fn eq(&self, other: &Self) -> bool {
    self.compress() == other.compress()
  }
}
impl Eq for MsPoint {}

impl PartialOrd for MsPoint {
  fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for MsPoint {
  fn cmp(&self, other: &Self) -> core::cmp::Ordering {
    self.compress().cmp(&other.compress())
  }
}

impl core::hash::Hash for MsPoint {
  fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
    self.compress().hash(state);
  }
}

impl core::fmt::Debug for MsPoint {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "MsPoint({})", hex::encode(self.compress()))
  }
}

/// Serializes/deserializes as the canonical 32-byte compressed encoding, since
/// `curve25519-dalek` isn't built here with its own `serde` feature (spec §6.5
/// persisted-state layout only ever needs the wire bytes, never curve
/// internals).
impl serde::Serialize for MsPoint {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bytes(&self.compress())
  }
}

impl<'de> serde::Deserialize<'de> for MsPoint {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
    let array: [u8; 32] = bytes
      .try_into()
      .map_err(|_| serde::de::Error::custom("expected 32 bytes for a compressed point"))?;
    MsPoint::from_bytes(&array).ok_or_else(|| serde::de::Error::custom("invalid point encoding"))
  }
}
