//! Error types for jwkey.
//!
//! [`BoxError`] is the type-erased error which crosses trait boundaries,
//! e.g. the associated `Error` of a signer or backend. [`OpaqueError`] is
//! its sized counterpart and what [`ErrorContext`] and [`ErrorExt`] produce
//! when a human readable context is attached to a failure.
//!
//! # Example
//!
//! ```
//! use jwkey_error::{ErrorContext, ErrorExt, OpaqueError};
//!
//! fn modulus_bits(n: Option<&str>) -> Result<usize, OpaqueError> {
//!     let n = n.context("JWK is missing n")?;
//!     let len = n.parse::<usize>().context("parse modulus length")?;
//!     Ok(len * 8)
//! }
//!
//! assert_eq!(modulus_bits(Some("256")).unwrap(), 2048);
//!
//! let err = modulus_bits(Some("two")).unwrap_err();
//! assert!(err.to_string().starts_with("parse modulus length: "));
//! assert!(err.root_cause().is::<std::num::ParseIntError>());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

mod context;
pub use context::{ErrorContext, ErrorExt};

mod opaque;
pub use opaque::OpaqueError;
