//! # dynatask-signature
//!
//! Tamper evidence for model responses without an online verifier.
//!
//! A response's signature is a keyed SHA-256 digest binding the secret, the
//! task code, the example it answers, and the outputs it reports. Signer and
//! verifier share `compute_signature`, so both sides canonicalize values the
//! same way.

pub mod digest;
pub mod signer;

pub use digest::{canonical_string, compute_signature, signature_inputs};
pub use signer::{ResponseSigner, DEFAULT_SECRET_ENV};
