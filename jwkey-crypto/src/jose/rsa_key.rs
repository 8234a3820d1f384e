use std::fmt;

use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jwkey_error::{ErrorContext as _, ErrorExt as _, OpaqueError};
use jwkey_utils::macros::generate_set_and_with;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::jose::{
    AwsLcBackend, JWA, JWK, JWKUse, JoseBackend, ParsedRsaKey, RsaJWK, RsaKeyInput,
    backend::RSA_KEY_MATERIAL_MEMBERS, der::create_subject_public_key_info,
};

/// Members a caller may set or override when creating an [`RsaKey`]
const OVERRIDE_MEMBERS: [&str; 6] = ["kid", "use", "key_ops", "x5c", "x5t", "x5t#S256"];

/// Members which may be replaced when exporting a key object
const EXPORT_MEMBERS: [&str; 7] = ["kid", "use", "alg", "key_ops", "x5c", "x5t", "x5t#S256"];

#[derive(Debug)]
/// Error returned by [`RsaKey`] operations
pub enum RsaKeyError {
    /// Key input or parameters are missing, invalid or not allowed
    InvalidKeyParameters(OpaqueError),
    /// A compact JWS could not be verified with this key
    SignatureVerificationFailed(OpaqueError),
    /// The handle has no key id
    MissingKeyId,
}

impl RsaKeyError {
    fn invalid(msg: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::InvalidKeyParameters(OpaqueError::from_display(msg))
    }

    /// Returns true for [`RsaKeyError::InvalidKeyParameters`]
    pub fn is_invalid_key_parameters(&self) -> bool {
        matches!(self, Self::InvalidKeyParameters(_))
    }

    /// Returns true for [`RsaKeyError::SignatureVerificationFailed`]
    pub fn is_signature_verification_failed(&self) -> bool {
        matches!(self, Self::SignatureVerificationFailed(_))
    }
}

impl fmt::Display for RsaKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyParameters(error) => write!(f, "invalid key parameters: {error}"),
            Self::SignatureVerificationFailed(error) => {
                write!(f, "signature verification failed: {error}")
            }
            Self::MissingKeyId => f.write_str("missing key id"),
        }
    }
}

impl std::error::Error for RsaKeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidKeyParameters(err) | Self::SignatureVerificationFailed(err) => {
                Some(err as &(dyn std::error::Error + 'static))
            }
            Self::MissingKeyId => None,
        }
    }
}

/// Builder of an [`RsaKey`]
///
/// Setters only record values, all validation happens in [`RsaKeyBuilder::build`].
pub struct RsaKeyBuilder<B = AwsLcBackend> {
    input: RsaKeyInput,
    overrides: Map<String, Value>,
    backend: B,
}

impl<B: fmt::Debug> fmt::Debug for RsaKeyBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyBuilder")
            .field("input", &self.input)
            .field("overrides", &self.overrides)
            .field("backend", &self.backend)
            .finish()
    }
}

impl RsaKeyBuilder {
    /// Create a new [`RsaKeyBuilder`] using the [`AwsLcBackend`]
    pub fn new(input: impl Into<RsaKeyInput>) -> Self {
        Self {
            input: input.into(),
            overrides: Map::new(),
            backend: AwsLcBackend,
        }
    }
}

impl<B> RsaKeyBuilder<B> {
    generate_set_and_with! {
        /// Set the key id (`kid`), overriding any `kid` of the key input
        pub fn key_id(mut self, kid: impl Into<String>) -> Self {
            self.overrides.insert("kid".to_owned(), Value::String(kid.into()));
            self
        }
    }

    generate_set_and_with! {
        /// Set the intended use (`use`), overriding any `use` of the key input
        pub fn key_use(mut self, key_use: JWKUse) -> Self {
            self.overrides
                .insert("use".to_owned(), Value::String(key_use.as_str().to_owned()));
            self
        }
    }

    generate_set_and_with! {
        /// Set the permitted key operations (`key_ops`)
        ///
        /// Unsetting also drops a `key_ops` member of the key input.
        pub fn key_ops(mut self, key_ops: Option<Vec<String>>) -> Self {
            self.overrides.insert("key_ops".to_owned(), key_ops.into());
            self
        }
    }

    generate_set_and_with! {
        /// Set the X.509 certificate chain (`x5c`)
        ///
        /// Unsetting also drops an `x5c` member of the key input.
        pub fn x5c(mut self, x5c: Option<Vec<String>>) -> Self {
            self.overrides.insert("x5c".to_owned(), x5c.into());
            self
        }
    }

    generate_set_and_with! {
        /// Set the X.509 certificate SHA-1 thumbprint (`x5t`)
        ///
        /// Unsetting also drops an `x5t` member of the key input.
        pub fn x5t(mut self, x5t: Option<String>) -> Self {
            self.overrides.insert("x5t".to_owned(), x5t.into());
            self
        }
    }

    generate_set_and_with! {
        /// Set the X.509 certificate SHA-256 thumbprint (`x5t#S256`)
        ///
        /// Unsetting also drops an `x5t#S256` member of the key input.
        pub fn x5t_sha256(mut self, x5t_sha256: Option<String>) -> Self {
            self.overrides.insert("x5t#S256".to_owned(), x5t_sha256.into());
            self
        }
    }

    generate_set_and_with! {
        /// Merge raw JWK members on top of the key input, replacing earlier values
        ///
        /// Only `kid`, `use`, `key_ops`, `x5c`, `x5t` and `x5t#S256` may be
        /// overridden. Anything else makes [`RsaKeyBuilder::build`] fail.
        pub fn override_params(mut self, params: Map<String, Value>) -> Self {
            self.overrides.extend(params);
            self
        }
    }

    /// Use another [`JoseBackend`] to parse the key and verify signatures
    pub fn with_backend<B2>(self, backend: B2) -> RsaKeyBuilder<B2> {
        RsaKeyBuilder {
            input: self.input,
            overrides: self.overrides,
            backend,
        }
    }
}

impl<B: JoseBackend> RsaKeyBuilder<B> {
    /// Validate all parameters and create the immutable [`RsaKey`]
    ///
    /// Fails with [`RsaKeyError::InvalidKeyParameters`] if the key input can not be
    /// parsed, an override is not allowed, or if `kid` or `use` is missing or invalid.
    pub fn build(self) -> Result<RsaKey<B>, RsaKeyError> {
        let Self {
            input,
            overrides,
            backend,
        } = self;

        if let Some(name) = overrides
            .keys()
            .find(|name| !OVERRIDE_MEMBERS.contains(&name.as_str()))
        {
            return Err(RsaKeyError::invalid(describe_ineligible(name, "overridden")));
        }

        let ParsedRsaKey {
            key_type,
            private,
            mut params,
        } = backend
            .parse_key(&input)
            .map_err(|err| OpaqueError::from_boxed(err.into()).context("parse key input"))
            .map_err(RsaKeyError::InvalidKeyParameters)?;

        if params.remove("alg").is_some() {
            tracing::debug!("RsaKey: ignore alg of key input, it is derived from use");
        }
        params.retain(|name, _| {
            let keep = OVERRIDE_MEMBERS.contains(&name.as_str());
            if !keep {
                tracing::trace!(jwk.member = %name, "RsaKey: ignore unsupported JWK member");
            }
            keep
        });
        params.extend(overrides);

        let kid = take_member::<Value>(&mut params, "kid")?;
        let key_use = take_member::<Value>(&mut params, "use")?;
        let (kid, key_use) = match (kid, key_use) {
            (Some(kid), Some(key_use)) => (kid, key_use),
            (None, _) => return Err(RsaKeyError::invalid("kid is required")),
            (_, None) => return Err(RsaKeyError::invalid("use is required")),
        };
        let key_use: JWKUse = serde_json::from_value(key_use)
            .context("use must be sig or enc")
            .map_err(RsaKeyError::InvalidKeyParameters)?;
        let kid: String = serde_json::from_value(kid)
            .context("kid must be a string")
            .map_err(RsaKeyError::InvalidKeyParameters)?;
        if kid.is_empty() {
            return Err(RsaKeyError::invalid("kid must not be empty"));
        }

        let key_ops = take_member(&mut params, "key_ops")?;
        let x5c = take_member(&mut params, "x5c")?;
        let x5t = take_member(&mut params, "x5t")?;
        let x5t_sha256 = take_member(&mut params, "x5t#S256")?;

        let alg = JWA::from(key_use);
        let mut public = JWK::new(key_type).with_binding(kid, key_use, alg);
        public.key_ops = key_ops;
        public.x5c = x5c;
        public.x5t = x5t;
        public.x5t_sha256 = x5t_sha256;

        tracing::debug!(
            jwk.kid = public.kid(),
            jwk.key_use = %key_use,
            jwk.alg = %alg,
            jwk.private = private.is_some(),
            "RsaKey: created",
        );

        Ok(RsaKey {
            jwk: RsaJWK::new(public, private),
            key_use,
            alg,
            backend,
        })
    }
}

/// Remove a member and decode it, `null` counts as absent
fn take_member<T: DeserializeOwned>(
    params: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<T>, RsaKeyError> {
    match params.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .with_context(|| format!("invalid {name}"))
            .map(Some)
            .map_err(RsaKeyError::InvalidKeyParameters),
    }
}

fn describe_ineligible(name: &str, action: &str) -> String {
    if name == "alg" {
        format!("alg cannot be {action}, it is derived from use")
    } else if RSA_KEY_MATERIAL_MEMBERS.contains(&name) {
        format!("key material member {name} cannot be {action}")
    } else {
        format!("unknown member {name} cannot be {action}")
    }
}

/// An immutable handle to an RSA key (public or private) in JWK form
///
/// The handle is bound to a key id (`kid`) and an intended use (`use`).
/// The algorithm (`alg`) is derived from the use: `RS256` for signatures,
/// `RSA-OAEP` for encryption.
///
/// # Example
///
/// ```
/// use jwkey_crypto::jose::{JWA, JWKUse, RsaKey};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let pem = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/rsa2048_pkcs8.pem"));
/// let key = RsaKey::builder(pem)
///     .with_key_id("k1")
///     .with_key_use(JWKUse::Signature)
///     .build()?;
///
/// assert_eq!(key.algorithm(), JWA::RS256);
/// assert!(key.is_private());
///
/// let jwk = serde_json::to_value(key.public_jwk())?;
/// assert_eq!(jwk["kid"], "k1");
/// assert!(jwk.get("d").is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RsaKey<B = AwsLcBackend> {
    jwk: RsaJWK,
    key_use: JWKUse,
    alg: JWA,
    backend: B,
}

impl<B: fmt::Debug> fmt::Debug for RsaKey<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("jwk", &self.jwk)
            .field("backend", &self.backend)
            .finish()
    }
}

impl RsaKey {
    /// Create a new [`RsaKey`] from PEM or JWK input, using the [`AwsLcBackend`]
    ///
    /// `overrides` are merged on top of the members of the key input,
    /// see [`RsaKeyBuilder::with_override_params`].
    pub fn new(
        input: impl Into<RsaKeyInput>,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Self, RsaKeyError> {
        let mut builder = Self::builder(input);
        if let Some(overrides) = overrides {
            builder.set_override_params(overrides);
        }
        builder.build()
    }

    /// Create an [`RsaKeyBuilder`] for the given key input
    pub fn builder(input: impl Into<RsaKeyInput>) -> RsaKeyBuilder {
        RsaKeyBuilder::new(input)
    }
}

impl<B: JoseBackend> RsaKey<B> {
    /// Verify a compact JWS signed with `RS256` and return its payload as JSON
    ///
    /// Only `RS256` is accepted, whatever the `use` of this key.
    /// The payload is only returned if the signature is valid.
    pub fn verify_compact_jws(&self, jws: &str) -> Result<Value, RsaKeyError> {
        self.verify_compact_jws_as(jws)
    }

    /// Same as [`Self::verify_compact_jws`] but decodes the payload into `T`
    pub fn verify_compact_jws_as<T: DeserializeOwned>(&self, jws: &str) -> Result<T, RsaKeyError> {
        let payload = self.verify_compact_jws_payload(jws)?;
        serde_json::from_slice(&payload)
            .context("decode verified payload")
            .map_err(|err| self.verification_failed(err))
    }

    /// Same as [`Self::verify_compact_jws`] but returns the raw payload
    pub fn verify_compact_jws_payload(&self, jws: &str) -> Result<Vec<u8>, RsaKeyError> {
        self.backend
            .verify_compact(jws, self.jwk.public(), &[JWA::RS256])
            .map_err(|err| self.verification_failed(OpaqueError::from_boxed(err.into())))
    }

    fn verification_failed(&self, err: OpaqueError) -> RsaKeyError {
        tracing::debug!(
            jwk.kid = self.jwk.public().kid(),
            error = %err,
            cause = %err.root_cause(),
            "RsaKey: compact JWS verification failed",
        );
        RsaKeyError::SignatureVerificationFailed(err)
    }

    /// Export this key as the key object of the backend
    ///
    /// Private parameters are only included if `include_private` is set and
    /// this is a private key. `extra` members are merged on top, only
    /// `kid`, `use`, `alg`, `key_ops`, `x5c`, `x5t` and `x5t#S256` are allowed.
    pub fn export_key_object(
        &self,
        extra: Option<Map<String, Value>>,
        include_private: bool,
    ) -> Result<B::KeyObject, RsaKeyError> {
        let mut public = self.jwk.public().clone();

        if let Some(mut extra) = extra {
            if let Some(name) = extra
                .keys()
                .find(|name| !EXPORT_MEMBERS.contains(&name.as_str()))
            {
                return Err(RsaKeyError::invalid(describe_ineligible(name, "exported")));
            }
            if let Some(kid) = take_member(&mut extra, "kid")? {
                public.kid = Some(kid);
            }
            if let Some(key_use) = take_member(&mut extra, "use")? {
                public.r#use = Some(key_use);
            }
            if let Some(alg) = take_member(&mut extra, "alg")? {
                public.alg = Some(alg);
            }
            if let Some(key_ops) = take_member(&mut extra, "key_ops")? {
                public.key_ops = Some(key_ops);
            }
            if let Some(x5c) = take_member(&mut extra, "x5c")? {
                public.x5c = Some(x5c);
            }
            if let Some(x5t) = take_member(&mut extra, "x5t")? {
                public.x5t = Some(x5t);
            }
            if let Some(x5t_sha256) = take_member(&mut extra, "x5t#S256")? {
                public.x5t_sha256 = Some(x5t_sha256);
            }
        }

        let private = if include_private {
            self.jwk.private().cloned()
        } else {
            None
        };

        self.backend
            .key_object(&RsaJWK::new(public, private))
            .map_err(|err| OpaqueError::from_boxed(err.into()).context("create key object"))
            .map_err(RsaKeyError::InvalidKeyParameters)
    }

    /// Reference to the backend of this key
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> RsaKey<B> {
    /// Public JWK representation of this key, safe to publish
    ///
    /// Contains `kty`, `n`, `e`, `kid`, `use` and `alg`, plus any of
    /// `key_ops`, `x5c`, `x5t` and `x5t#S256` which were set.
    pub fn public_jwk(&self) -> JWK {
        self.jwk.public().clone()
    }

    /// Key id (`kid`) of this key
    pub fn key_id(&self) -> Result<&str, RsaKeyError> {
        self.jwk.public().kid().ok_or(RsaKeyError::MissingKeyId)
    }

    /// Intended use of this key
    pub fn key_use(&self) -> JWKUse {
        self.key_use
    }

    /// Algorithm bound to this key, derived from its use
    pub fn algorithm(&self) -> JWA {
        self.alg
    }

    /// Returns true if this handle holds private key parameters
    pub fn is_private(&self) -> bool {
        self.jwk.is_private()
    }

    /// Base64url encoded JWK thumbprint as defined in [`rfc7638`]
    ///
    /// [`rfc7638`]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumbprint_sha256(&self) -> Result<String, RsaKeyError> {
        let digest = self
            .jwk
            .public()
            .thumb_sha256()
            .map_err(RsaKeyError::InvalidKeyParameters)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(digest.as_ref()))
    }

    /// DER encoded `SubjectPublicKeyInfo` of the public key
    pub fn public_key_der(&self) -> Result<Vec<u8>, RsaKeyError> {
        let decode = |name: &'static str, value: &str| {
            BASE64_URL_SAFE_NO_PAD
                .decode(value)
                .with_context(|| format!("base64url decode {name}"))
                .map_err(RsaKeyError::InvalidKeyParameters)
        };
        let public = self.jwk.public();
        let n = decode("n", public.modulus())?;
        let e = decode("e", public.exponent())?;
        Ok(create_subject_public_key_info(&n, &e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use crate::jose::{JWKType, RsaPrivateParams};

    /// Deterministic backend without any cryptography
    ///
    /// Accepts `header.payload.valid` tokens and returns their raw payload.
    #[derive(Debug, Default)]
    struct FixtureBackend {
        algorithms: Mutex<Vec<Vec<JWA>>>,
    }

    impl JoseBackend for FixtureBackend {
        type KeyObject = RsaJWK;
        type Error = OpaqueError;

        fn parse_key(&self, input: &RsaKeyInput) -> Result<ParsedRsaKey, Self::Error> {
            let mut params = match input {
                RsaKeyInput::Pem(pem) if pem == "private" || pem == "public" => Map::new(),
                RsaKeyInput::Pem(_) => return Err(OpaqueError::from_display("bad pem")),
                RsaKeyInput::Jwk(map) => map.clone(),
            };
            let private = params.remove("d").is_some() || input == &RsaKeyInput::from("private");
            for name in RSA_KEY_MATERIAL_MEMBERS {
                params.remove(name);
            }
            Ok(ParsedRsaKey {
                key_type: JWKType::RSA {
                    n: "bW9kdWx1cw".to_owned(),
                    e: "AQAB".to_owned(),
                },
                private: private.then(|| RsaPrivateParams {
                    d: "d".to_owned(),
                    crt: None,
                }),
                params,
            })
        }

        fn verify_compact(
            &self,
            jws: &str,
            _key: &JWK,
            algorithms: &[JWA],
        ) -> Result<Vec<u8>, Self::Error> {
            self.algorithms.lock().unwrap().push(algorithms.to_vec());
            let [_, payload, "valid"] = jws.split('.').collect::<Vec<_>>()[..] else {
                return Err(OpaqueError::from_display("invalid signature"));
            };
            Ok(payload.as_bytes().to_vec())
        }

        fn key_object(&self, jwk: &RsaJWK) -> Result<Self::KeyObject, Self::Error> {
            Ok(jwk.clone())
        }
    }

    fn builder(input: impl Into<RsaKeyInput>) -> RsaKeyBuilder<FixtureBackend> {
        RsaKeyBuilder::new(input).with_backend(FixtureBackend::default())
    }

    fn jwk_input(extra: Value) -> Map<String, Value> {
        let mut map = json!({"kty": "RSA", "n": "bW9kdWx1cw", "e": "AQAB"})
            .as_object()
            .unwrap()
            .clone();
        map.extend(extra.as_object().unwrap().clone());
        map
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn use_binds_algorithm() {
        let key = builder("public")
            .with_key_id("k1")
            .with_key_use(JWKUse::Signature)
            .build()
            .unwrap();
        assert_eq!(key.algorithm(), JWA::RS256);
        assert_eq!(key.key_use(), JWKUse::Signature);
        assert_eq!(key.key_id().unwrap(), "k1");
        assert!(!key.is_private());

        let key = builder(jwk_input(json!({"kid": "k2", "use": "enc"})))
            .build()
            .unwrap();
        assert_eq!(key.algorithm(), JWA::RsaOaep);
        assert_eq!(key.key_id().unwrap(), "k2");
    }

    #[test]
    fn kid_and_use_are_required() {
        let err = builder("public")
            .with_key_use(JWKUse::Signature)
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");

        let err = builder("public").with_key_id("k1").build().unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");

        let err = builder(jwk_input(json!({"kid": null, "use": "sig"})))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");

        let err = builder(jwk_input(json!({"kid": "", "use": "sig"})))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");

        let err = builder(jwk_input(json!({"kid": 7, "use": "sig"})))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");
    }

    #[test]
    fn unknown_use_is_rejected() {
        for key_use in [json!("signature"), json!("SIG"), json!(""), json!(1)] {
            let err = builder(jwk_input(json!({"kid": "k1", "use": key_use})))
                .build()
                .unwrap_err();
            assert!(err.is_invalid_key_parameters(), "{err}");
        }
    }

    #[test]
    fn overrides_win_over_key_input() {
        let key = builder(jwk_input(json!({"kid": "input", "use": "enc"})))
            .with_override_params(map(json!({"kid": "override", "use": "sig"})))
            .build()
            .unwrap();
        assert_eq!(key.key_id().unwrap(), "override");
        assert_eq!(key.algorithm(), JWA::RS256);

        // overrides can also complete the key input
        let key = builder(jwk_input(json!({"use": "sig"})))
            .with_override_params(map(json!({"kid": "k1"})))
            .build()
            .unwrap();
        assert_eq!(key.key_id().unwrap(), "k1");
    }

    #[test]
    fn ineligible_overrides_are_rejected() {
        for name in ["alg", "n", "e", "kty", "d", "oth", "foo"] {
            let err = builder("private")
                .with_key_id("k1")
                .with_key_use(JWKUse::Signature)
                .with_override_params(map(json!({ name: "x" })))
                .build()
                .unwrap_err();
            assert!(err.is_invalid_key_parameters(), "{name}: {err}");
            assert!(err.to_string().contains(name), "{err}");
        }
    }

    #[test]
    fn alg_of_key_input_is_derived() {
        let key = builder(jwk_input(json!({"kid": "k1", "use": "sig", "alg": "PS512"})))
            .build()
            .unwrap();
        assert_eq!(key.algorithm(), JWA::RS256);
        assert_eq!(key.public_jwk().alg(), Some(JWA::RS256));
    }

    #[test]
    fn metadata_is_carried_and_typed() {
        let key = builder(jwk_input(json!({
            "kid": "k1",
            "use": "sig",
            "x5t": "dGh1bWI",
            "ext": true,
        })))
        .with_key_ops(vec!["verify".to_owned()])
        .with_x5c(vec!["Y2VydA".to_owned()])
        .with_x5t_sha256("c2hhMjU2".to_owned())
        .build()
        .unwrap();

        let jwk = serde_json::to_value(key.public_jwk()).unwrap();
        assert_eq!(
            jwk,
            json!({
                "kty": "RSA",
                "n": "bW9kdWx1cw",
                "e": "AQAB",
                "kid": "k1",
                "use": "sig",
                "alg": "RS256",
                "key_ops": ["verify"],
                "x5c": ["Y2VydA"],
                "x5t": "dGh1bWI",
                "x5t#S256": "c2hhMjU2",
            })
        );

        let err = builder("public")
            .with_key_id("k1")
            .with_key_use(JWKUse::Signature)
            .with_override_params(map(json!({"key_ops": "verify"})))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");
    }

    #[test]
    fn metadata_setters_can_unset_input_members() {
        let input = jwk_input(json!({
            "kid": "k1",
            "use": "sig",
            "key_ops": ["verify"],
            "x5t": "dGh1bWI",
        }));

        let key = builder(input.clone())
            .with_x5c(vec!["Y2VydA".to_owned()])
            .without_x5c()
            .without_x5t()
            .maybe_with_key_ops(None)
            .maybe_with_x5t_sha256(Some("c2hhMjU2".to_owned()))
            .build()
            .unwrap();
        let jwk = key.public_jwk();
        assert_eq!(jwk.x5c(), None);
        assert_eq!(jwk.x5t(), None);
        assert_eq!(jwk.key_ops(), None);
        assert_eq!(jwk.x5t_sha256(), Some("c2hhMjU2"));

        let mut setters = builder(input);
        setters.set_x5t("b3RoZXI".to_owned());
        setters.maybe_set_key_ops(Some(vec!["sign".to_owned(), "verify".to_owned()]));
        let key = setters.build().unwrap();
        let jwk = key.public_jwk();
        assert_eq!(jwk.x5t(), Some("b3RoZXI"));
        assert_eq!(jwk.key_ops().unwrap(), ["sign", "verify"]);
    }

    #[test]
    fn parse_failure_is_invalid_key_parameters() {
        let err = builder("garbage")
            .with_key_id("k1")
            .with_key_use(JWKUse::Signature)
            .build()
            .unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn verification_only_accepts_rs256() {
        let key = builder("public")
            .with_key_id("k1")
            .with_key_use(JWKUse::Encryption)
            .build()
            .unwrap();

        let value = assert_ok!(key.verify_compact_jws(r#"h.{"sub":"user1"}.valid"#));
        assert_eq!(value, json!({"sub": "user1"}));

        let err = key.verify_compact_jws("h.{}.forged").unwrap_err();
        assert!(err.is_signature_verification_failed(), "{err}");

        // only accepted after the signature was verified
        let err = key.verify_compact_jws("h.not json.valid").unwrap_err();
        assert!(err.is_signature_verification_failed(), "{err}");
        assert_eq!(
            key.verify_compact_jws_payload("h.not json.valid").unwrap(),
            b"not json"
        );

        let algorithms = key.backend().algorithms.lock().unwrap();
        assert!(algorithms.iter().all(|algs| algs == &[JWA::RS256]));
        assert_eq!(algorithms.len(), 4);
    }

    #[test]
    fn public_jwk_never_contains_private_params() {
        let key = builder("private")
            .with_key_id("k1")
            .with_key_use(JWKUse::Signature)
            .build()
            .unwrap();
        assert!(key.is_private());

        let jwk = serde_json::to_value(key.public_jwk()).unwrap();
        for name in RsaPrivateParams::NAMES {
            assert!(jwk.get(name).is_none(), "{name}");
        }
    }

    #[test]
    fn export_key_object() {
        let key = builder("private")
            .with_key_id("k1")
            .with_key_use(JWKUse::Signature)
            .build()
            .unwrap();

        let exported = key.export_key_object(None, true).unwrap();
        assert!(exported.is_private());
        assert_eq!(exported.public(), &key.public_jwk());

        let exported = key.export_key_object(None, false).unwrap();
        assert!(!exported.is_private());

        let exported = key
            .export_key_object(Some(map(json!({"kid": "k2", "alg": "PS256"}))), true)
            .unwrap();
        assert_eq!(exported.public().kid(), Some("k2"));
        assert_eq!(exported.public().alg(), Some(JWA::PS256));
        // the handle itself is not changed
        assert_eq!(key.key_id().unwrap(), "k1");
        assert_eq!(key.algorithm(), JWA::RS256);

        for extra in [json!({"d": "x"}), json!({"n": "x"}), json!({"foo": 1})] {
            let err = key.export_key_object(Some(map(extra)), false).unwrap_err();
            assert!(err.is_invalid_key_parameters(), "{err}");
        }
        assert_err!(key.export_key_object(Some(map(json!({"alg": "none"}))), false));
    }

    #[test]
    fn new_merges_optional_overrides() {
        let pem = include_str!("../../tests/fixtures/rsa2048_public.pem");
        let key = RsaKey::new(pem, Some(map(json!({"kid": "k1", "use": "sig"})))).unwrap();
        assert_eq!(key.key_id().unwrap(), "k1");

        let err = RsaKey::new(pem, None).unwrap_err();
        assert!(err.is_invalid_key_parameters(), "{err}");
    }

    #[test]
    fn error_display_and_source() {
        let err = RsaKeyError::SignatureVerificationFailed(OpaqueError::from_display("boom"));
        assert_eq!(err.to_string(), "signature verification failed: boom");
        assert!(std::error::Error::source(&err).is_some());

        let err = RsaKeyError::MissingKeyId;
        assert_eq!(err.to_string(), "missing key id");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn rsa_key_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RsaKey>();
        assert_send_sync::<RsaKeyError>();
    }
}
