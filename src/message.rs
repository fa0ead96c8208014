use crate::error::MultisigError;
use crate::point::MsPoint;
use crate::scalar::MsSecret;
use crate::signature::{self, SchnorrSignature};

/// Fixed ASCII prefix letting a parser recognize a KEX message before doing
/// any base58 work (spec §6.1 `DOMAIN_TAG`).
pub const DOMAIN_TAG: &[u8] = b"MultisigxV";

/// v1: round-1 messages carry no `msg_privkey` (older wire format).
pub const VERSION_V1: u8 = b'1';
/// v2: round-1 messages carry `msg_privkey` (current format; `build` only emits this).
pub const VERSION_V2: u8 = b'2';

const SIGNATURE_LEN: usize = 64;

/// A parsed, signature-verified KEX message (spec §3 `KexMsg`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KexMsg {
  pub round: u32,
  pub signing_pub: MsPoint,
  pub msg_pubkeys: Vec<MsPoint>,
  /// `MsSecret::null()` unless this is a round-1, v2 message.
  pub msg_privkey: MsSecret,
}

fn encode_varint(mut value: u32, out: &mut Vec<u8>) {
  loop {
    let mut byte = (value & 0x7f) as u8;
    value >>= 7;
    if value != 0 {
      byte |= 0x80;
    }
    out.push(byte);
    if value == 0 {
      break;
    }
  }
}

fn decode_varint(data: &[u8], cursor: &mut usize) -> Result<u32, MultisigError> {
  let mut result: u32 = 0;
  let mut shift = 0u32;
  loop {
    let byte = *data
      .get(*cursor)
      .ok_or(MultisigError::MalformedMessage("truncated varint"))?;
    *cursor += 1;
    if shift >= 32 {
      return Err(MultisigError::MalformedMessage("varint too large"));
    }
    result |= ((byte & 0x7f) as u32) << shift;
    if byte & 0x80 == 0 {
      break;
    }
    shift += 7;
  }
  Ok(result)
}

fn read_array32(data: &[u8], cursor: &mut usize) -> Result<[u8; 32], MultisigError> {
  let slice = data
    .get(*cursor..*cursor + 32)
    .ok_or(MultisigError::MalformedMessage("truncated 32-byte field"))?;
  *cursor += 32;
  let mut out = [0u8; 32];
  out.copy_from_slice(slice);
  Ok(out)
}

fn build_payload(
  round: u32,
  signing_pub: &MsPoint,
  msg_pubkeys: &[MsPoint],
  msg_privkey: Option<&MsSecret>,
) -> Vec<u8> {
  let mut payload = Vec::with_capacity(5 + 32 + 5 + 32 * msg_pubkeys.len() + 32);
  encode_varint(round, &mut payload);
  payload.extend_from_slice(&signing_pub.compress());
  encode_varint(msg_pubkeys.len() as u32, &mut payload);
  for k in msg_pubkeys {
    payload.extend_from_slice(&k.compress());
  }
  if round == 1 {
    let privkey_bytes = msg_privkey.map(MsSecret::to_bytes).unwrap_or_else(|| MsSecret::null().to_bytes());
    payload.extend_from_slice(&privkey_bytes);
  }
  payload
}

fn signing_domain(version: u8, payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(DOMAIN_TAG.len() + 1 + payload.len());
  out.extend_from_slice(DOMAIN_TAG);
  out.push(version);
  out.extend_from_slice(payload);
  out
}

/// Builds, signs and base58-wraps a round message (spec §4.2 `build`). Always
/// emits v2 (round-1 messages include `msg_privkey`); `round` must be `>= 1`
/// and `msg_privkey` must be `None` for any round other than 1.
pub fn build(
  round: u32,
  base_priv: &MsSecret,
  msg_pubkeys: &[MsPoint],
  msg_privkey: Option<&MsSecret>,
) -> Result<Vec<u8>, MultisigError> {
  if round == 0 {
    return Err(MultisigError::MalformedMessage("round must be >= 1"));
  }
  if msg_privkey.is_some() && round != 1 {
    return Err(MultisigError::MalformedMessage("msg_privkey only allowed in round 1"));
  }

  let signing_pub = MsPoint::mul_base(base_priv.inner());
  let payload = build_payload(round, &signing_pub, msg_pubkeys, msg_privkey);
  let to_sign = signing_domain(VERSION_V2, &payload);
  let sig = signature::sign(base_priv, &signing_pub, &to_sign);

  let mut body = payload;
  body.extend_from_slice(&sig.to_bytes());

  let b58 = base58_monero::encode(&body[..])
    .map_err(|_| MultisigError::MalformedMessage("base58 encode failed"))?;

  let mut out = Vec::with_capacity(DOMAIN_TAG.len() + 1 + b58.len());
  out.extend_from_slice(DOMAIN_TAG);
  out.push(VERSION_V2);
  out.extend_from_slice(b58.as_bytes());
  Ok(out)
}

/// Parses and signature-verifies a wire message (spec §4.2 `parse`). Accepts
/// both v1 and v2 on the wire (`build` only ever emits v2).
pub fn parse(bytes: &[u8]) -> Result<KexMsg, MultisigError> {
  if bytes.len() < DOMAIN_TAG.len() + 1 {
    return Err(MultisigError::MalformedMessage("message too short"));
  }
  let (tag, rest) = bytes.split_at(DOMAIN_TAG.len());
  if tag != DOMAIN_TAG {
    return Err(MultisigError::MalformedMessage("bad domain tag"));
  }
  let version = rest[0];
  if version != VERSION_V1 && version != VERSION_V2 {
    return Err(MultisigError::MalformedMessage("unrecognized version"));
  }
  let b58_str =
    std::str::from_utf8(&rest[1..]).map_err(|_| MultisigError::MalformedMessage("non-utf8 payload"))?;
  let body = base58_monero::decode(b58_str)
    .map_err(|_| MultisigError::MalformedMessage("base58 decode failed"))?;

  if body.len() < SIGNATURE_LEN {
    return Err(MultisigError::MalformedMessage("body too short for signature"));
  }
  let (payload, sig_bytes) = body.split_at(body.len() - SIGNATURE_LEN);

  let mut cursor = 0usize;
  let round = decode_varint(payload, &mut cursor)?;
  if round == 0 {
    return Err(MultisigError::MalformedMessage("round must be >= 1"));
  }
  let signing_pub_bytes = read_array32(payload, &mut cursor)?;
  let signing_pub = MsPoint::from_bytes(&signing_pub_bytes)
    .ok_or(MultisigError::MalformedMessage("bad signing pubkey encoding"))?;

  let num_pubkeys = decode_varint(payload, &mut cursor)?;
  let remaining = payload.len().saturating_sub(cursor);
  if (num_pubkeys as usize) > remaining / 32 {
    return Err(MultisigError::MalformedMessage("msg_pubkeys count exceeds remaining payload"));
  }
  let mut msg_pubkeys = Vec::with_capacity(num_pubkeys as usize);
  for _ in 0..num_pubkeys {
    let bytes = read_array32(payload, &mut cursor)?;
    let pk = MsPoint::from_bytes(&bytes).ok_or(MultisigError::MalformedMessage("bad msg pubkey encoding"))?;
    msg_pubkeys.push(pk);
  }

  let msg_privkey = if round == 1 && version == VERSION_V2 {
    let bytes = read_array32(payload, &mut cursor)?;
    MsSecret::from_canonical_bytes(bytes).ok_or(MultisigError::MalformedMessage("bad msg privkey encoding"))?
  } else {
    MsSecret::null()
  };

  if cursor != payload.len() {
    return Err(MultisigError::MalformedMessage("trailing bytes after payload"));
  }

  let r_bytes = sig_bytes[..32].try_into().unwrap();
  let s_bytes: [u8; 32] = sig_bytes[32..].try_into().unwrap();
  let sig_r = MsPoint::from_bytes(&r_bytes).ok_or(MultisigError::BadSignature)?;
  let sig_s = MsSecret::from_canonical_bytes(s_bytes).ok_or(MultisigError::BadSignature)?;
  let sig = SchnorrSignature { r: sig_r, s: sig_s };

  let to_sign = signing_domain(version, payload);
  if !signature::verify(&signing_pub, &to_sign, &sig) {
    return Err(MultisigError::BadSignature);
  }

  Ok(KexMsg { round, signing_pub, msg_pubkeys, msg_privkey })
}
