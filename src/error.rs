use thiserror::Error;

/// Errors produced by the multisig key-exchange and key-image engine.
///
/// Every variant here is a synchronous return value, never a panic. `Account`
/// mutators (`initialize_kex`, `kex_update`) are transactional: on any of these
/// errors the account is left byte-identical to how it was before the call.
#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum MultisigError {
  #[error("multisig config invalid (num_signers {0}, threshold {1})")]
  InvalidConfig(u32, u32),
  #[error("signer pubkey is invalid (not in main subgroup, or identity)")]
  InvalidSigner,
  #[error("duplicate signer in signer list")]
  DuplicateSigner,
  #[error("local account's base pubkey is missing from the signer list")]
  MissingSelf,
  #[error("a secret scalar was, or became, the null scalar")]
  NullSecret,
  #[error("malformed kex message: {0}")]
  MalformedMessage(&'static str),
  #[error("kex message signature verification failed")]
  BadSignature,
  #[error("kex message round {got} does not match expected round {expected}")]
  WrongRound { expected: u32, got: u32 },
  #[error("kex message signed by a key outside the signer set")]
  UnknownSigner,
  #[error("round {round} has too few distinct recommenders ({found} found, {required} required)")]
  IncompleteRound { round: u32, found: usize, required: usize },
  #[error("round {round} key recommendation count is inconsistent ({detail})")]
  UnexpectedRecommendationCount { round: u32, detail: &'static str },
  #[error("post-kex verification message did not recommend the locally computed group keys")]
  PostKexMismatch,
  #[error("multisig key share index {index} out of range (have {len})")]
  OutOfRange { index: usize, len: usize },
  #[error("one-time address derivation failed (output not owned by the group, or bad tx data)")]
  AddressDerivationFailure,
}
