//! # dynatask-verify
//!
//! Response verification for the dynatask harness.
//!
//! This crate provides [`engine::ResponseVerifier`], which implements the
//! [`dynatask_core::traits::Verifier`] trait. A response passes only if its
//! envelope shape, echoed id, signature, every present output value, and
//! target coverage all check out.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dynatask_verify::ResponseVerifier;
//! use dynatask_signature::ResponseSigner;
//!
//! let verifier = ResponseVerifier::new(schema)
//!     .with_signer(ResponseSigner::new("MY_SECRET", ""));
//! verifier.verify(&response, &example)?;
//! ```

pub mod engine;

pub use engine::ResponseVerifier;
