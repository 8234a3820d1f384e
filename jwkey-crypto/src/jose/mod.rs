//! # JOSE: JSON Object Signing and Encryption
//!
//! JOSE is an IETF standard for securely transferring data between parties using JSON.
//! It provides a general framework for signing and encrypting any kind of data, and it's
//! the foundation for technologies like JSON Web Tokens (JWTs).
//!
//! The parts of the JOSE framework used by jwkey are:
//!
//! * JWS (JSON Web Signature): This specification defines how to create a digital signature for
//!   any data. A JWS proves data integrity and authenticity. It consists of a Header, a
//!   Payload (the data), and a Signature, all encoded in Base64Url and joined by dots.
//!   Only the compact serialization is supported here.
//!   See [`rfc7515`] for more details.
//!
//! * JWK (JSON Web Key): This specifies a JSON format for representing cryptographic keys.
//!   This makes it simple to share the public keys required to verify signatures or encrypt data.
//!   See [`rfc7517`] for more details.
//!
//! * JWA (JSON Web Algorithm): This is essentially a list of the specific cryptographic
//!   algorithms that are used for signing and encryption within the JOSE framework. The alg
//!   parameter in the JOSE header identifies which algorithm was used.
//!   See [`rfc7518`] for more details.
//!
//! The entry point is [`RsaKey`]: an immutable handle to an RSA key (public or private)
//! which can publish itself as a [`JWK`] and verify [`JWSCompact`] tokens signed with `RS256`.
//! All key parsing and cryptography is delegated to a [`JoseBackend`], which defaults to
//! [`AwsLcBackend`].
//!
//! [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515
//! [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517
//! [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518

mod constants;
mod der;

mod jwa;
pub use jwa::JWA;

mod jwk;
pub use jwk::{JWK, JWKSet, JWKType, JWKUse, RsaCrtParams, RsaJWK, RsaPrivateParams};

mod jws;
pub use jws::{
    DecodedJWSCompact, DecodedSignature, Headers, JWSBuilder, JWSCompact, Signer,
    ToVerifySignature, Verifier,
};

mod backend;
pub use backend::{AwsLcBackend, JoseBackend, ParsedRsaKey, RsaKeyInput, RsaKeyObject};

mod rsa_key;
pub use rsa_key::{RsaKey, RsaKeyBuilder, RsaKeyError};
