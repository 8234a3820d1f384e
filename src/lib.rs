//! 🔑 jwkey publishes RSA keys as JSON Web Keys (JWK) and verifies compact JSON Web Signatures (JWS).
//!
//! The heart of the crate is [`RsaKey`](crate::crypto::jose::RsaKey): an immutable handle
//! to an RSA key (public or private) which is bound to a key id (`kid`) and an intended
//! use (`use`). The algorithm (`alg`) is derived from that use and can not be set
//! independently: `RS256` for signature keys and `RSA-OAEP` for encryption keys.
//!
//! A handle can be created from PEM text (`PRIVATE KEY`, `RSA PRIVATE KEY` or `PUBLIC KEY`)
//! or from a JWK shaped JSON object, and can:
//!
//! - publish its public key as a [`JWK`](crate::crypto::jose::JWK), never leaking private parameters;
//! - verify compact JWS tokens signed with `RS256`, returning the payload only once the
//!   signature is verified;
//! - export a key object for signing libraries, e.g. to sign a JWS with the same key.
//!
//! ```
//! use jwkey::crypto::jose::{JWA, JWKUse, JWSBuilder, RsaKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let pem = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/jwkey-crypto/tests/fixtures/rsa2048_pkcs8.pem"));
//! let key = RsaKey::builder(pem)
//!     .with_key_id("k1")
//!     .with_key_use(JWKUse::Signature)
//!     .build()?;
//! assert_eq!(key.algorithm(), JWA::RS256);
//!
//! let signer = key.export_key_object(None, true)?;
//! let jws = JWSBuilder::new()
//!     .with_payload(r#"{"sub":"user1"}"#)
//!     .build_compact(&signer)?;
//!
//! let payload = key.verify_compact_jws(jws.as_str())?;
//! assert_eq!(payload["sub"], "user1");
//! # Ok(())
//! # }
//! ```
//!
//! All parsing and cryptography is done by a [`JoseBackend`](crate::crypto::jose::JoseBackend),
//! which is [`AwsLcBackend`](crate::crypto::jose::AwsLcBackend) (built on `aws-lc-rs`) by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod error {
    //! Error utilities for jwkey and its users.
    //!
    //! See [`jwkey_error`] for more information.

    #[doc(inline)]
    pub use ::jwkey_error::*;
}

pub mod crypto {
    //! Crypto logic of jwkey: JOSE (JWA, JWK, JWS) and RSA key handles.
    //!
    //! See [`jwkey_crypto`] for more information.

    #[doc(inline)]
    pub use ::jwkey_crypto::*;
}

pub mod utils {
    //! Utilities used across the jwkey workspace.
    //!
    //! See [`jwkey_utils`] for more information.

    #[doc(inline)]
    pub use ::jwkey_utils::*;
}
