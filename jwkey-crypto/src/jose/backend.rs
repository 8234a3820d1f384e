use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    rsa::KeyPair,
    signature::{RsaEncoding, RsaParameters, RsaPublicKeyComponents},
};
use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jwkey_error::{BoxError, ErrorContext as _, ErrorExt as _, OpaqueError};
use rustls_pki_types::{PrivateKeyDer, SubjectPublicKeyInfoDer, pem::PemObject};
use serde::{Deserialize as _, Serialize};
use serde_json::{Map, Value};
use x509_parser::{prelude::FromDer as _, public_key::PublicKey, x509::SubjectPublicKeyInfo};

use crate::jose::{
    JWA, JWK, JWKType, JWSCompact, Headers, RsaCrtParams, RsaJWK, RsaPrivateParams, Signer,
    ToVerifySignature, Verifier,
    der::{
        RsaPrivateComponents, create_rsa_private_key, create_subject_public_key_info,
        decode_rsa_private_key, strip_leading_zeros, unwrap_pkcs8,
    },
};

/// Smallest accepted RSA modulus, in bytes (2048 bits)
const RSA_MODULUS_MIN_LEN: usize = 256;
/// Largest accepted RSA modulus, in bytes (8192 bits)
const RSA_MODULUS_MAX_LEN: usize = 1024;

#[derive(Clone, PartialEq, Eq)]
/// RSA key material as handed to [`JoseBackend::parse_key`]
pub enum RsaKeyInput {
    /// PEM armored key: `PRIVATE KEY` (PKCS#8), `RSA PRIVATE KEY` (PKCS#1)
    /// or `PUBLIC KEY` (SubjectPublicKeyInfo)
    Pem(String),
    /// JWK shaped JSON object, public or private
    Jwk(Map<String, Value>),
}

impl fmt::Debug for RsaKeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem(_) => f.debug_tuple("Pem").finish_non_exhaustive(),
            Self::Jwk(map) => f
                .debug_tuple("Jwk")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<String> for RsaKeyInput {
    fn from(value: String) -> Self {
        Self::Pem(value)
    }
}

impl From<&str> for RsaKeyInput {
    fn from(value: &str) -> Self {
        Self::Pem(value.to_owned())
    }
}

impl From<Map<String, Value>> for RsaKeyInput {
    fn from(value: Map<String, Value>) -> Self {
        Self::Jwk(value)
    }
}

impl TryFrom<Value> for RsaKeyInput {
    type Error = OpaqueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::Jwk(map)),
            Value::String(pem) => Ok(Self::Pem(pem)),
            _ => Err(OpaqueError::from_display(
                "RSA key input must be a JWK object or a PEM string",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Key material as produced by [`JoseBackend::parse_key`]
pub struct ParsedRsaKey {
    /// Public key parameters
    pub key_type: JWKType,
    /// Private key parameters, only present for private keys
    pub private: Option<RsaPrivateParams>,
    /// All other members found in the input, e.g. `kid` or `use`.
    /// Always empty for PEM input.
    pub params: Map<String, Value>,
}

impl ParsedRsaKey {
    /// Returns true if private key parameters were parsed
    pub fn is_private(&self) -> bool {
        self.private.is_some()
    }

    /// Flat JWK shaped field map of the key material and params
    pub fn to_field_map(&self) -> Result<Map<String, Value>, OpaqueError> {
        let mut fields = to_object(&self.key_type).context("serialize key type")?;
        if let Some(private) = &self.private {
            fields.append(&mut to_object(private).context("serialize private params")?);
        }
        for (name, value) in &self.params {
            fields.insert(name.clone(), value.clone());
        }
        Ok(fields)
    }
}

fn to_object(value: &impl Serialize) -> Result<Map<String, Value>, OpaqueError> {
    let Value::Object(map) = serde_json::to_value(value).context("serialize to JSON")? else {
        return Err(OpaqueError::from_display("expected a JSON object"));
    };
    Ok(map)
}

/// The collaborator of an [`RsaKey`] which does all key parsing and cryptography
///
/// [`RsaKey`]: crate::jose::RsaKey
pub trait JoseBackend {
    /// Library specific key object, see [`JoseBackend::key_object`]
    type KeyObject;
    /// Error returned by all backend operations
    type Error: Into<BoxError>;

    /// Parse PEM text or a JWK shaped map into RSA key material
    fn parse_key(&self, input: &RsaKeyInput) -> Result<ParsedRsaKey, Self::Error>;

    /// Verify a compact JWS with the given public key and return the payload
    ///
    /// Implementations must reject a token whose `alg` header is not one of `algorithms`.
    fn verify_compact(
        &self,
        jws: &str,
        key: &JWK,
        algorithms: &[JWA],
    ) -> Result<Vec<u8>, Self::Error>;

    /// Create the key object used by this backend for signing and verification
    fn key_object(&self, jwk: &RsaJWK) -> Result<Self::KeyObject, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Default [`JoseBackend`], built on `aws-lc-rs`
pub struct AwsLcBackend;

impl AwsLcBackend {
    /// Create a new [`AwsLcBackend`]
    pub fn new() -> Self {
        Self
    }
}

impl JoseBackend for AwsLcBackend {
    type KeyObject = RsaKeyObject;
    type Error = OpaqueError;

    fn parse_key(&self, input: &RsaKeyInput) -> Result<ParsedRsaKey, Self::Error> {
        let (material, params) = match input {
            RsaKeyInput::Pem(pem) => (parse_pem(pem)?, Map::new()),
            RsaKeyInput::Jwk(map) => parse_jwk(map)?,
        };
        Ok(material.into_parsed(params))
    }

    fn verify_compact(
        &self,
        jws: &str,
        key: &JWK,
        algorithms: &[JWA],
    ) -> Result<Vec<u8>, Self::Error> {
        let public_key = public_key_components(key)?;
        let verifier = RsaVerifier {
            public_key: &public_key,
            algorithms,
        };
        let decoded = JWSCompact::new(jws).decode(&verifier)?;
        Ok(decoded.into_payload())
    }

    fn key_object(&self, jwk: &RsaJWK) -> Result<Self::KeyObject, Self::Error> {
        RsaKeyObject::try_new(jwk.clone())
    }
}

/// Parsed key material as raw unsigned big-endian integers
struct KeyMaterial {
    n: Vec<u8>,
    e: Vec<u8>,
    private: Option<PrivateMaterial>,
}

enum PrivateMaterial {
    /// Two-prime key with all CRT parameters
    Crt(RsaPrivateComponents),
    /// Private exponent `d` only
    Exponent(Vec<u8>),
}

impl KeyMaterial {
    fn into_parsed(self, params: Map<String, Value>) -> ParsedRsaKey {
        let encode = |value: &[u8]| BASE64_URL_SAFE_NO_PAD.encode(value);
        ParsedRsaKey {
            key_type: JWKType::RSA {
                n: encode(&self.n),
                e: encode(&self.e),
            },
            private: self.private.map(|private| match private {
                PrivateMaterial::Crt(key) => RsaPrivateParams {
                    d: encode(&key.d),
                    crt: Some(RsaCrtParams {
                        p: encode(&key.p),
                        q: encode(&key.q),
                        dp: encode(&key.dp),
                        dq: encode(&key.dq),
                        qi: encode(&key.qi),
                    }),
                },
                PrivateMaterial::Exponent(d) => RsaPrivateParams {
                    d: encode(&d),
                    crt: None,
                },
            }),
            params,
        }
    }
}

fn parse_pem(pem: &str) -> Result<KeyMaterial, OpaqueError> {
    match PrivateKeyDer::from_pem_slice(pem.as_bytes()) {
        Ok(PrivateKeyDer::Pkcs1(der)) => {
            tracing::trace!("AwsLcBackend: parse PKCS#1 RSA private key");
            parse_rsa_private_key(der.secret_pkcs1_der())
        }
        Ok(PrivateKeyDer::Pkcs8(der)) => {
            tracing::trace!("AwsLcBackend: parse PKCS#8 private key");
            let der = unwrap_pkcs8(der.secret_pkcs8_der()).context("unwrap PKCS#8")?;
            parse_rsa_private_key(der)
        }
        Ok(PrivateKeyDer::Sec1(_)) => Err(OpaqueError::from_display(
            "EC private keys are not supported, expected an RSA key",
        )),
        Ok(_) => Err(OpaqueError::from_display("unsupported private key format")),
        Err(rustls_pki_types::pem::Error::NoItemsFound) => {
            tracing::trace!("AwsLcBackend: no private key in PEM, parse public key");
            let spki = SubjectPublicKeyInfoDer::from_pem_slice(pem.as_bytes())
                .context("decode PEM: expected PRIVATE KEY, RSA PRIVATE KEY or PUBLIC KEY")?;
            parse_subject_public_key_info(spki.as_ref())
        }
        Err(err) => Err(err.context("decode PEM private key")),
    }
}

fn parse_rsa_private_key(der: &[u8]) -> Result<KeyMaterial, OpaqueError> {
    let key = decode_rsa_private_key(der).context("decode RSAPrivateKey")?;
    check_modulus(&key.n)?;
    KeyPair::from_der(der).context("validate RSA private key")?;
    Ok(KeyMaterial {
        n: key.n.clone(),
        e: key.e.clone(),
        private: Some(PrivateMaterial::Crt(key)),
    })
}

fn parse_subject_public_key_info(der: &[u8]) -> Result<KeyMaterial, OpaqueError> {
    let (_, spki) = SubjectPublicKeyInfo::from_der(der)
        .map_err(|err| OpaqueError::from_display(format!("decode SubjectPublicKeyInfo: {err}")))?;
    match spki.parsed().context("parse subject public key")? {
        PublicKey::RSA(rsa) => {
            let n = strip_leading_zeros(rsa.modulus).to_vec();
            let e = strip_leading_zeros(rsa.exponent).to_vec();
            check_modulus(&n)?;
            Ok(KeyMaterial {
                n,
                e,
                private: None,
            })
        }
        PublicKey::EC(_) => Err(OpaqueError::from_display(
            "EC public keys are not supported, expected an RSA key",
        )),
        _ => Err(OpaqueError::from_display(
            "unsupported public key algorithm, expected an RSA key",
        )),
    }
}

/// Names of all JWK members which describe RSA key material
pub(crate) const RSA_KEY_MATERIAL_MEMBERS: [&str; 10] =
    ["kty", "n", "e", "d", "p", "q", "dp", "dq", "qi", "oth"];

fn parse_jwk(map: &Map<String, Value>) -> Result<(KeyMaterial, Map<String, Value>), OpaqueError> {
    let kty = map
        .get("kty")
        .and_then(Value::as_str)
        .context("JWK is missing kty")?;
    if kty != "RSA" {
        return Err(OpaqueError::from_display(format!(
            "unsupported key type {kty}, expected RSA"
        )));
    }
    if map.contains_key("oth") {
        return Err(OpaqueError::from_display(
            "multi-prime RSA keys (oth) are not supported",
        ));
    }

    let n = decode_member(map, "n")?.context("JWK is missing n")?;
    let e = decode_member(map, "e")?.context("JWK is missing e")?;
    check_modulus(&n)?;

    let d = decode_member(map, "d")?;
    let crt_present = RsaCrtParams::NAMES
        .iter()
        .filter(|name| map.contains_key(**name))
        .count();
    let private = match (d, crt_present) {
        (None, 0) => None,
        (None, _) => {
            return Err(OpaqueError::from_display(
                "RSA private key has CRT parameters but no private exponent d",
            ));
        }
        (Some(d), 0) => {
            check_private_exponent(&d, &n)?;
            Some(PrivateMaterial::Exponent(d))
        }
        (Some(d), count) if count == RsaCrtParams::NAMES.len() => {
            let member = |name: &'static str| {
                decode_member(map, name)?.with_context(|| format!("JWK is missing {name}"))
            };
            let components = RsaPrivateComponents {
                n: n.clone(),
                e: e.clone(),
                d,
                p: member("p")?,
                q: member("q")?,
                dp: member("dp")?,
                dq: member("dq")?,
                qi: member("qi")?,
            };
            KeyPair::from_der(&create_rsa_private_key(&components))
                .context("validate RSA private key")?;
            Some(PrivateMaterial::Crt(components))
        }
        (Some(_), _) => {
            return Err(OpaqueError::from_display(
                "incomplete RSA private key: p, q, dp, dq and qi must all be present or all be absent",
            ));
        }
    };

    let params = map
        .iter()
        .filter(|(name, _)| !RSA_KEY_MATERIAL_MEMBERS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    tracing::trace!(
        jwk.private = private.is_some(),
        "AwsLcBackend: parsed RSA JWK",
    );

    Ok((KeyMaterial { n, e, private }, params))
}

/// Decode an optional base64url encoded JWK member
fn decode_member(map: &Map<String, Value>, name: &str) -> Result<Option<Vec<u8>>, OpaqueError> {
    match map.get(name) {
        None => Ok(None),
        Some(Value::String(value)) => decode_base64url(name, value).map(Some),
        Some(_) => Err(OpaqueError::from_display(format!(
            "JWK member {name} must be a string"
        ))),
    }
}

fn decode_base64url(name: &str, value: &str) -> Result<Vec<u8>, OpaqueError> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(value)
        .with_context(|| format!("base64url decode {name}"))?;
    if bytes.is_empty() {
        return Err(OpaqueError::from_display(format!("{name} is empty")));
    }
    Ok(strip_leading_zeros(&bytes).to_vec())
}

/// Sanity checks for a private exponent which comes without CRT parameters,
/// so it can not be validated by building a key pair.
fn check_private_exponent(d: &[u8], n: &[u8]) -> Result<(), OpaqueError> {
    if d == [0] {
        return Err(OpaqueError::from_display("RSA private exponent d is zero"));
    }
    if d.len() > n.len() || (d.len() == n.len() && d >= n) {
        return Err(OpaqueError::from_display(
            "RSA private exponent d is not smaller than the modulus",
        ));
    }
    Ok(())
}

fn check_modulus(n: &[u8]) -> Result<(), OpaqueError> {
    if (RSA_MODULUS_MIN_LEN..=RSA_MODULUS_MAX_LEN).contains(&n.len()) {
        Ok(())
    } else {
        Err(OpaqueError::from_display(format!(
            "RSA modulus of {} bits is not supported, expected 2048 to 8192 bits",
            n.len() * 8
        )))
    }
}

fn public_key_components(jwk: &JWK) -> Result<RsaPublicKeyComponents<Vec<u8>>, OpaqueError> {
    Ok(RsaPublicKeyComponents {
        n: decode_base64url("n", jwk.modulus())?,
        e: decode_base64url("e", jwk.exponent())?,
    })
}

/// Verifies RSA signatures for a fixed set of acceptable algorithms
struct RsaVerifier<'a> {
    public_key: &'a RsaPublicKeyComponents<Vec<u8>>,
    algorithms: &'a [JWA],
}

impl Verifier for RsaVerifier<'_> {
    type Error = OpaqueError;

    fn verify(&self, _payload: &[u8], signature: &ToVerifySignature) -> Result<(), Self::Error> {
        let headers = signature.decoded_signature().protected_headers();
        if headers.get("crit").is_some() {
            return Err(OpaqueError::from_display(
                "critical header extensions are not supported",
            ));
        }

        let alg = headers.get("alg").context("protected header is missing alg")?;
        let alg = JWA::deserialize(alg).context("unsupported alg")?;
        if !self.algorithms.contains(&alg) {
            return Err(OpaqueError::from_display(format!(
                "alg {alg} is not acceptable"
            )));
        }
        let params = <&'static RsaParameters>::try_from(alg)?;

        let raw_signature = signature.decoded_signature().decode_signature()?;
        self.public_key
            .verify(params, signature.signed_data().as_bytes(), &raw_signature)
            .context("signature mismatch")
    }
}

/// Key object created by the [`AwsLcBackend`]
///
/// It verifies compact JWS and, when it holds a private key, acts as
/// the [`Signer`] of a [`JWSBuilder`].
///
/// [`JWSBuilder`]: crate::jose::JWSBuilder
pub struct RsaKeyObject {
    jwk: RsaJWK,
    public_key: RsaPublicKeyComponents<Vec<u8>>,
    key_pair: Option<KeyPair>,
    rng: SystemRandom,
}

impl RsaKeyObject {
    fn try_new(jwk: RsaJWK) -> Result<Self, OpaqueError> {
        let public_key = public_key_components(jwk.public())?;
        check_modulus(&public_key.n)?;

        let key_pair = match jwk.private() {
            Some(RsaPrivateParams { d, crt: Some(crt) }) => {
                let member = |name, value: &str| decode_base64url(name, value);
                let components = RsaPrivateComponents {
                    n: public_key.n.clone(),
                    e: public_key.e.clone(),
                    d: member("d", d)?,
                    p: member("p", &crt.p)?,
                    q: member("q", &crt.q)?,
                    dp: member("dp", &crt.dp)?,
                    dq: member("dq", &crt.dq)?,
                    qi: member("qi", &crt.qi)?,
                };
                let key_pair = KeyPair::from_der(&create_rsa_private_key(&components))
                    .context("create RSA key pair")?;
                Some(key_pair)
            }
            Some(RsaPrivateParams { crt: None, .. }) => {
                tracing::debug!("RsaKeyObject: private key without CRT parameters can not sign");
                None
            }
            None => None,
        };

        Ok(Self {
            jwk,
            public_key,
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// The JWK this key object was created from
    pub fn jwk(&self) -> &RsaJWK {
        &self.jwk
    }

    /// Returns true if this key object holds private key parameters
    pub fn is_private(&self) -> bool {
        self.jwk.is_private()
    }

    /// Returns true if this key object can sign
    ///
    /// A private key given only by its exponent `d` can not.
    pub fn can_sign(&self) -> bool {
        self.key_pair.is_some()
    }

    /// DER encoded `SubjectPublicKeyInfo` of the public key
    pub fn public_key_der(&self) -> Vec<u8> {
        create_subject_public_key_info(&self.public_key.n, &self.public_key.e)
    }

    /// Algorithm used by this key object to sign, taken from the JWK `alg`
    ///
    /// Defaults to `RS256`, fails for non signature algorithms.
    pub fn signing_algorithm(&self) -> Result<JWA, OpaqueError> {
        match self.jwk.public().alg() {
            None => Ok(JWA::RS256),
            Some(alg) if alg.is_signature() => Ok(alg),
            Some(alg) => Err(OpaqueError::from_display(format!(
                "{alg} cannot be used to sign"
            ))),
        }
    }

    /// Verify a compact JWS, accepting only the given algorithms
    pub fn verify_compact(&self, jws: &str, algorithms: &[JWA]) -> Result<Vec<u8>, OpaqueError> {
        let verifier = RsaVerifier {
            public_key: &self.public_key,
            algorithms,
        };
        let decoded = JWSCompact::new(jws).decode(&verifier)?;
        Ok(decoded.into_payload())
    }
}

impl fmt::Debug for RsaKeyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyObject")
            .field("jwk", self.jwk.public())
            .field("private", &self.is_private())
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl Signer for RsaKeyObject {
    type Signature = Vec<u8>;
    type Error = OpaqueError;

    fn set_headers(&self, protected_headers: &mut Headers) -> Result<(), Self::Error> {
        protected_headers.try_set_header("alg".to_owned(), self.signing_algorithm()?)?;
        if let Some(kid) = self.jwk.public().kid() {
            protected_headers.try_set_header("kid".to_owned(), kid)?;
        }
        Ok(())
    }

    fn sign(&self, data: &str) -> Result<Self::Signature, Self::Error> {
        let Some(key_pair) = &self.key_pair else {
            return Err(OpaqueError::from_display(if self.is_private() {
                "cannot sign with an RSA private key that has no CRT parameters"
            } else {
                "cannot sign with a public key"
            }));
        };
        let encoding = <&'static dyn RsaEncoding>::try_from(self.signing_algorithm()?)?;

        let mut signature = vec![0; key_pair.public_modulus_len()];
        key_pair
            .sign(encoding, &self.rng, data.as_bytes(), &mut signature)
            .context("sign data")?;
        Ok(signature)
    }
}

impl Verifier for RsaKeyObject {
    type Error = OpaqueError;

    /// Verifies with the signing algorithm of this key object only
    fn verify(&self, payload: &[u8], signature: &ToVerifySignature) -> Result<(), Self::Error> {
        let algorithms = [self.signing_algorithm()?];
        RsaVerifier {
            public_key: &self.public_key,
            algorithms: &algorithms,
        }
        .verify(payload, signature)
    }
}
