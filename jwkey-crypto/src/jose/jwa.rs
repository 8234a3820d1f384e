use std::fmt;

use aws_lc_rs::signature::{
    RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512,
    RSA_PKCS1_SHA256, RSA_PKCS1_SHA384, RSA_PKCS1_SHA512, RSA_PSS_2048_8192_SHA256,
    RSA_PSS_2048_8192_SHA384, RSA_PSS_2048_8192_SHA512, RSA_PSS_SHA256, RSA_PSS_SHA384,
    RSA_PSS_SHA512, RsaEncoding, RsaParameters,
};
use jwkey_error::OpaqueError;
use serde::{Deserialize, Serialize};

use crate::jose::JWKUse;

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
/// [`JWA`] or JSON Web Algorithms as defined in [`rfc7518`]
///
/// Only the RSA family is modelled. `RSA-OAEP` is a key management
/// (encryption) algorithm: it can be advertised on a key but it can
/// never be used to sign or verify a JWS.
///
/// [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518
pub enum JWA {
    /// RSASSA-PKCS1-v1_5 using SHA-256 (Recommended)
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384 (Optional)
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512 (Optional)
    RS512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256 (Optional)
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384 (Optional)
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512 (Optional)
    PS512,
    /// RSAES OAEP using default parameters (Recommended+)
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
}

impl JWA {
    /// Registered name of the algorithm, as used in the `alg` parameter
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::RsaOaep => "RSA-OAEP",
        }
    }

    /// Returns true if this algorithm produces or verifies digital signatures
    pub fn is_signature(self) -> bool {
        !matches!(self, Self::RsaOaep)
    }
}

impl fmt::Display for JWA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JWKUse> for JWA {
    /// The algorithm bound to an RSA key for its intended use
    fn from(value: JWKUse) -> Self {
        match value {
            JWKUse::Signature => Self::RS256,
            JWKUse::Encryption => Self::RsaOaep,
        }
    }
}

impl TryFrom<JWA> for &'static RsaParameters {
    type Error = OpaqueError;

    fn try_from(value: JWA) -> Result<Self, Self::Error> {
        match value {
            JWA::RS256 => Ok(&RSA_PKCS1_2048_8192_SHA256),
            JWA::RS384 => Ok(&RSA_PKCS1_2048_8192_SHA384),
            JWA::RS512 => Ok(&RSA_PKCS1_2048_8192_SHA512),
            JWA::PS256 => Ok(&RSA_PSS_2048_8192_SHA256),
            JWA::PS384 => Ok(&RSA_PSS_2048_8192_SHA384),
            JWA::PS512 => Ok(&RSA_PSS_2048_8192_SHA512),
            JWA::RsaOaep => Err(OpaqueError::from_display(
                "RSA-OAEP is an encryption algorithm and cannot verify signatures",
            )),
        }
    }
}

impl TryFrom<JWA> for &'static dyn RsaEncoding {
    type Error = OpaqueError;

    fn try_from(value: JWA) -> Result<Self, Self::Error> {
        match value {
            JWA::RS256 => Ok(&RSA_PKCS1_SHA256),
            JWA::RS384 => Ok(&RSA_PKCS1_SHA384),
            JWA::RS512 => Ok(&RSA_PKCS1_SHA512),
            JWA::PS256 => Ok(&RSA_PSS_SHA256),
            JWA::PS384 => Ok(&RSA_PSS_SHA384),
            JWA::PS512 => Ok(&RSA_PSS_SHA512),
            JWA::RsaOaep => Err(OpaqueError::from_display(
                "RSA-OAEP is an encryption algorithm and cannot sign",
            )),
        }
    }
}
