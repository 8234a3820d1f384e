use std::fmt;

use aws_lc_rs::digest::{Digest, SHA256, digest};
use jwkey_error::{ErrorContext, OpaqueError};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

use crate::jose::JWA;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// [`JWK`] or JSON Web Key as defined in [`rfc7517`]
///
/// This is the public representation of a key: it never carries private
/// key parameters, which makes it safe to publish (e.g. in a [`JWKSet`]).
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517
pub struct JWK {
    #[serde(flatten)]
    pub(crate) key_type: JWKType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) r#use: Option<JWKUse>,
    /// Intended algorithm to be used with this key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) alg: Option<JWA>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key_ops: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) x5c: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) x5t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "x5t#S256")]
    pub(crate) x5t_sha256: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kty")]
/// The "kty" (key type) parameter identifies the cryptographic algorithm family used with the key
///
/// Only "RSA" is supported, any other key type fails to deserialize.
pub enum JWKType {
    /// RSA public key parameters, as base64url encoded unsigned big-endian integers
    RSA {
        /// modulus
        n: String,
        /// public exponent
        e: String,
    },
}

impl Serialize for JWKType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Order here is important as this output will be used to generate jwk thumb
        match &self {
            Self::RSA { n, e } => {
                let mut state = serializer.serialize_struct("JWKType", 3)?;
                state.serialize_field("e", e)?;
                state.serialize_field("kty", "RSA")?;
                state.serialize_field("n", n)?;
                state.end()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// [`JWKUse`] identifies the intended use of the public key
pub enum JWKUse {
    #[serde(rename = "sig")]
    Signature,
    #[serde(rename = "enc")]
    Encryption,
}

impl JWKUse {
    /// Registered value of the `use` parameter
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "sig",
            Self::Encryption => "enc",
        }
    }
}

impl fmt::Display for JWKUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JWK {
    pub(crate) fn new(key_type: JWKType) -> Self {
        Self {
            key_type,
            kid: None,
            r#use: None,
            alg: None,
            key_ops: None,
            x5c: None,
            x5t: None,
            x5t_sha256: None,
        }
    }

    pub(crate) fn with_binding(mut self, kid: String, key_use: JWKUse, alg: JWA) -> Self {
        self.kid = Some(kid);
        self.r#use = Some(key_use);
        self.alg = Some(alg);
        self
    }

    /// The key type and its public parameters
    pub fn key_type(&self) -> &JWKType {
        &self.key_type
    }

    /// Base64url encoded modulus (`n`)
    pub fn modulus(&self) -> &str {
        match &self.key_type {
            JWKType::RSA { n, .. } => n,
        }
    }

    /// Base64url encoded public exponent (`e`)
    pub fn exponent(&self) -> &str {
        match &self.key_type {
            JWKType::RSA { e, .. } => e,
        }
    }

    /// Key id (`kid`), if any
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Intended use (`use`), if any
    pub fn key_use(&self) -> Option<JWKUse> {
        self.r#use
    }

    /// Intended algorithm (`alg`), if any
    pub fn alg(&self) -> Option<JWA> {
        self.alg
    }

    /// Permitted operations (`key_ops`), if any
    pub fn key_ops(&self) -> Option<&[String]> {
        self.key_ops.as_deref()
    }

    /// X.509 certificate chain (`x5c`), if any
    pub fn x5c(&self) -> Option<&[String]> {
        self.x5c.as_deref()
    }

    /// X.509 certificate SHA-1 thumbprint (`x5t`), if any
    pub fn x5t(&self) -> Option<&str> {
        self.x5t.as_deref()
    }

    /// X.509 certificate SHA-256 thumbprint (`x5t#S256`), if any
    pub fn x5t_sha256(&self) -> Option<&str> {
        self.x5t_sha256.as_deref()
    }

    /// SHA-256 JWK thumbprint as defined in [`rfc7638`], a url safe identifier for this key
    ///
    /// [`rfc7638`]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumb_sha256(&self) -> Result<Digest, OpaqueError> {
        Ok(digest(
            &SHA256,
            &serde_json::to_vec(&self.key_type).context("failed to serialise JWK")?,
        ))
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Private parameters of an RSA key as defined in [`rfc7518, section 6.3.2`]
///
/// All values are base64url encoded unsigned big-endian integers.
/// Only `d` is required. The CRT parameters are either all present or
/// all absent. Only two-prime keys are supported, so there is no `oth`
/// parameter.
///
/// The [`Debug`] implementation redacts all values.
///
/// [`rfc7518, section 6.3.2`]: https://datatracker.ietf.org/doc/html/rfc7518#section-6.3.2
pub struct RsaPrivateParams {
    /// private exponent
    pub d: String,
    /// CRT parameters, if the key carries them
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub crt: Option<RsaCrtParams>,
}

impl RsaPrivateParams {
    /// Names of all private RSA parameters
    pub const NAMES: [&'static str; 6] = ["d", "p", "q", "dp", "dq", "qi"];
}

impl fmt::Debug for RsaPrivateParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateParams")
            .field("crt", &self.crt.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Chinese Remainder Theorem parameters of an RSA private key
///
/// Required to sign with the key.
pub struct RsaCrtParams {
    /// first prime factor
    pub p: String,
    /// second prime factor
    pub q: String,
    /// first factor CRT exponent
    pub dp: String,
    /// second factor CRT exponent
    pub dq: String,
    /// first CRT coefficient
    pub qi: String,
}

impl RsaCrtParams {
    /// Names of the CRT parameters
    pub const NAMES: [&'static str; 5] = ["p", "q", "dp", "dq", "qi"];
}

impl fmt::Debug for RsaCrtParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaCrtParams").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
/// A [`JWK`] together with the private RSA parameters, if any
///
/// Serializes as a single flat JWK object. This is the shape which is
/// handed to a [`JoseBackend`] to create a key object.
///
/// [`JoseBackend`]: crate::jose::JoseBackend
pub struct RsaJWK {
    #[serde(flatten)]
    public: JWK,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    private: Option<RsaPrivateParams>,
}

impl RsaJWK {
    pub(crate) fn new(public: JWK, private: Option<RsaPrivateParams>) -> Self {
        Self { public, private }
    }

    /// Reference to the public part of this key
    pub fn public(&self) -> &JWK {
        &self.public
    }

    /// Reference to the private parameters, if this is a private key
    pub fn private(&self) -> Option<&RsaPrivateParams> {
        self.private.as_ref()
    }

    /// Returns true if private parameters are present
    pub fn is_private(&self) -> bool {
        self.private.is_some()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
/// [`JWKSet`] or JWK Set as defined in [`rfc7517, section 5`]
///
/// The document used to publish a set of public keys.
///
/// [`rfc7517, section 5`]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
pub struct JWKSet {
    keys: Vec<JWK>,
}

impl JWKSet {
    /// Create an empty [`JWKSet`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a [`JWK`] to this set
    pub fn push(&mut self, jwk: JWK) {
        self.keys.push(jwk);
    }

    /// All keys in this set
    pub fn keys(&self) -> &[JWK] {
        &self.keys
    }

    /// Find the first key with the given `kid`
    pub fn find(&self, kid: &str) -> Option<&JWK> {
        self.keys.iter().find(|jwk| jwk.kid() == Some(kid))
    }
}

impl FromIterator<JWK> for JWKSet {
    fn from_iter<T: IntoIterator<Item = JWK>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
    use tokio_test::assert_err;

    fn private_params() -> RsaPrivateParams {
        RsaPrivateParams {
            d: "d".into(),
            crt: Some(RsaCrtParams {
                p: "p".into(),
                q: "q".into(),
                dp: "dp".into(),
                dq: "dq".into(),
                qi: "qi".into(),
            }),
        }
    }

    #[test]
    fn jwk_thumb_order_is_correct() {
        let jwk_type = JWKType::RSA {
            n: "n".into(),
            e: "e".into(),
        };
        let output = serde_json::to_string(&jwk_type).unwrap();
        let expected_output = r##"{"e":"e","kty":"RSA","n":"n"}"##;
        assert_eq!(&output, expected_output);
    }

    #[test]
    fn jwk_thumb_matches_rfc7638_example() {
        // https://datatracker.ietf.org/doc/html/rfc7638#section-3.1
        let jwk = JWK::new(JWKType::RSA {
            n: "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw".into(),
            e: "AQAB".into(),
        })
        .with_binding("2011-04-29".into(), JWKUse::Signature, JWA::RS256);

        let thumb = jwk.thumb_sha256().unwrap();
        assert_eq!(
            BASE64_URL_SAFE_NO_PAD.encode(thumb.as_ref()),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn public_jwk_serializes_all_set_members() {
        let mut jwk = JWK::new(JWKType::RSA {
            n: "n".into(),
            e: "AQAB".into(),
        })
        .with_binding("k1".into(), JWKUse::Encryption, JWA::RsaOaep);
        jwk.key_ops = Some(vec!["encrypt".into()]);
        jwk.x5t_sha256 = Some("t".into());

        let value = serde_json::to_value(&jwk).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "kty": "RSA",
                "n": "n",
                "e": "AQAB",
                "kid": "k1",
                "use": "enc",
                "alg": "RSA-OAEP",
                "key_ops": ["encrypt"],
                "x5t#S256": "t",
            })
        );
    }

    #[test]
    fn jwk_deserialize_rejects_other_key_types() {
        let ec = serde_json::json!({"kty": "EC", "crv": "P-256", "x": "x", "y": "y"});
        assert_err!(serde_json::from_value::<JWK>(ec));

        let rsa = serde_json::json!({"kty": "RSA", "n": "n", "e": "e", "use": "sig"});
        let jwk = serde_json::from_value::<JWK>(rsa).unwrap();
        assert_eq!(jwk.modulus(), "n");
        assert_eq!(jwk.key_use(), Some(JWKUse::Signature));
        assert_eq!(jwk.alg(), None);
    }

    #[test]
    fn rsa_jwk_flattens_private_params() {
        let public = JWK::new(JWKType::RSA {
            n: "n".into(),
            e: "e".into(),
        });

        let private = RsaJWK::new(public.clone(), Some(private_params()));
        let value = serde_json::to_value(&private).unwrap();
        for name in RsaPrivateParams::NAMES {
            assert_eq!(value[name], name, "missing {name}");
        }
        assert_eq!(value["kty"], "RSA");

        let exponent_only = RsaJWK::new(
            public.clone(),
            Some(RsaPrivateParams {
                d: "d".into(),
                crt: None,
            }),
        );
        let value = serde_json::to_value(&exponent_only).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map["d"], "d");
        assert!(RsaCrtParams::NAMES.iter().all(|name| !map.contains_key(*name)));

        let public_only = RsaJWK::new(public, None);
        let value = serde_json::to_value(&public_only).unwrap();
        let map = value.as_object().unwrap();
        assert!(RsaPrivateParams::NAMES.iter().all(|name| !map.contains_key(*name)));
    }

    #[test]
    fn private_params_deserialize_with_and_without_crt() {
        let params: RsaPrivateParams =
            serde_json::from_value(serde_json::json!({"d": "d"})).unwrap();
        assert_eq!(params.d, "d");
        assert!(params.crt.is_none());

        let params: RsaPrivateParams =
            serde_json::to_value(private_params()).and_then(serde_json::from_value).unwrap();
        assert!(params == private_params());
    }

    #[test]
    fn private_params_debug_is_redacted() {
        let s = format!("{:?}", private_params());
        assert_eq!(s, "RsaPrivateParams { crt: true, .. }");
        let s = format!("{:?}", private_params().crt.unwrap());
        assert_eq!(s, "RsaCrtParams { .. }");
    }

    #[test]
    fn jwk_set_find_by_kid() {
        let set: JWKSet = ["a", "b"]
            .into_iter()
            .map(|kid| {
                JWK::new(JWKType::RSA {
                    n: kid.into(),
                    e: "AQAB".into(),
                })
                .with_binding(kid.into(), JWKUse::Signature, JWA::RS256)
            })
            .collect();

        assert_eq!(set.keys().len(), 2);
        assert_eq!(set.find("b").unwrap().modulus(), "b");
        assert!(set.find("c").is_none());

        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["keys"][0]["kid"], "a");
        let decoded: JWKSet = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, set);
    }
}
