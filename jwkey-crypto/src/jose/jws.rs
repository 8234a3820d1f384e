use std::fmt;

use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jwkey_error::{BoxError, ErrorContext as _, OpaqueError};
use jwkey_utils::macros::generate_set_and_with;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collects the payload and protected header of a [`JWSCompact`] before signing
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct JWSBuilder {
    protected_headers: Headers,
    payload: String,
}

/// Protected header of a JWS as a JSON object
///
/// Values are serialized as soon as they are set.
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headers(Option<Map<String, Value>>);

impl Headers {
    generate_set_and_with! {
        /// Set a single header, an existing value with the same name is replaced
        pub fn header(
            mut self,
            name: String,
            value: impl Serialize,
        ) -> Result<Self, OpaqueError> {
            let headers = self.0.get_or_insert_default();
            let value = serde_json::to_value(value).context("serialize header value")?;
            headers.insert(name, value);
            Ok(self)
        }
    }

    generate_set_and_with! {
        /// Merge all members of `headers`, which must serialize to a JSON object
        ///
        /// Existing values with the same name are replaced.
        pub fn headers(mut self, headers: impl Serialize) -> Result<Self, OpaqueError> {
            let Value::Object(headers) =
                serde_json::to_value(headers).context("serialize headers")?
            else {
                return Err(OpaqueError::from_display("headers must be a JSON object"));
            };
            self.0.get_or_insert_default().extend(headers);
            Ok(self)
        }
    }

    /// Raw value of a single header, if set
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.as_ref().and_then(|headers| headers.get(name))
    }

    /// `BASE64URL(UTF8(header))`, fails if no header was set
    fn encode(&self) -> Result<String, OpaqueError> {
        let headers = self.0.as_ref().context("compact jws requires a protected header")?;
        let json = serde_json::to_vec(headers).context("serialize protected header")?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
    }

    /// Deserialize the headers into `T`
    pub fn decode<'de, 'a: 'de, T>(&'a self) -> Result<T, OpaqueError>
    where
        T: Deserialize<'de>,
    {
        let headers = self.0.as_ref().context("no protected header to decode")?;
        T::deserialize(headers).context("deserialize protected header")
    }
}

impl JWSBuilder {
    /// Empty builder: no payload, no protected header
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        /// Payload to sign, stored base64url encoded
        pub fn payload(mut self, payload: impl AsRef<[u8]>) -> Self {
            self.payload = BASE64_URL_SAFE_NO_PAD.encode(payload);
            self
        }
    }

    generate_set_and_with! {
        /// Set a single protected header, see [`Headers::try_with_header`]
        pub fn protected_header(
            mut self,
            name: String,
            value: impl Serialize,
        ) -> Result<Self, OpaqueError> {
            self.protected_headers.try_set_header(name, value)?;
            Ok(self)
        }
    }

    generate_set_and_with! {
        /// Merge protected headers, see [`Headers::try_with_headers`]
        pub fn protected_headers(mut self, headers: impl Serialize) -> Result<Self, OpaqueError> {
            self.protected_headers.try_set_headers(headers)?;
            Ok(self)
        }
    }

    /// Direct access to the protected header
    pub fn protected_headers_mut(&mut self) -> &mut Headers {
        &mut self.protected_headers
    }

    /// Let `signer` complete the protected header, then sign
    /// `BASE64URL(header).BASE64URL(payload)` into a [`JWSCompact`]
    pub fn build_compact(mut self, signer: &impl Signer) -> Result<JWSCompact, OpaqueError> {
        signer
            .set_headers(&mut self.protected_headers)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
            .context("set signer headers")?;

        let signing_input = format!("{}.{}", self.protected_headers.encode()?, self.payload);
        let signature = signer
            .sign(&signing_input)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
            .context("sign jws")?;

        let mut compact = signing_input;
        compact.push('.');
        compact.push_str(&BASE64_URL_SAFE_NO_PAD.encode(signature.as_ref()));
        Ok(JWSCompact(compact))
    }
}

/// JWS compact serialization ([`rfc7515`])
///
/// `BASE64URL(header).BASE64URL(payload).BASE64URL(signature)`
///
/// Wrapping a string does not validate it, [`JWSCompact::decode`] does.
///
/// [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JWSCompact(String);

impl JWSCompact {
    /// Shorthand for [`JWSBuilder::new`]
    pub fn builder() -> JWSBuilder {
        JWSBuilder::new()
    }

    /// Wrap an encoded compact JWS
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Encoded representation of this compact JWS
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume this compact JWS into its encoded representation
    pub fn into_string(self) -> String {
        self.0
    }

    /// Split, decode and verify this compact JWS
    ///
    /// Nothing is returned unless `verifier` accepted the signature.
    pub fn decode(&self, verifier: &impl Verifier) -> Result<DecodedJWSCompact, OpaqueError> {
        let mut segments = self.0.split('.');
        let (Some(protected), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(OpaqueError::from_display(
                "compact jws must have exactly three segments",
            ));
        };
        let signed_data = &self.0[..protected.len() + 1 + payload.len()];

        let protected = BASE64_URL_SAFE_NO_PAD
            .decode(protected)
            .context("decode protected header")?;
        let Value::Object(protected) = serde_json::from_slice::<Value>(&protected)
            .context("deserialize protected header")?
        else {
            return Err(OpaqueError::from_display(
                "protected header must be a JSON object",
            ));
        };
        let protected = Headers(Some(protected));

        let payload = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .context("decode payload")?;

        let to_verify = ToVerifySignature {
            signed_data: signed_data.to_owned(),
            decoded_signature: DecodedSignature {
                protected,
                signature: signature.to_owned(),
            },
        };

        verifier
            .verify(&payload, &to_verify)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
            .context("verify signature")?;

        Ok(DecodedJWSCompact {
            payload,
            signature: to_verify.decoded_signature,
        })
    }
}

impl fmt::Display for JWSCompact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JWSCompact {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JWSCompact {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for JWSCompact {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A [`JWSCompact`] whose signature was verified
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedJWSCompact {
    payload: Vec<u8>,
    signature: DecodedSignature,
}

impl DecodedJWSCompact {
    /// Verified payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume this decoded JWS and return the verified payload bytes
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Protected header the signature covered
    pub fn protected_headers(&self) -> &Headers {
        self.signature.protected_headers()
    }

    /// Deserialize the protected header into `T`
    pub fn decode_protected_headers<'de, 'a: 'de, T: Deserialize<'de>>(
        &'a self,
    ) -> Result<T, OpaqueError> {
        self.signature.protected_headers().decode()
    }

    /// Decoded header and signature which were verified
    pub fn decoded_signature(&self) -> &DecodedSignature {
        &self.signature
    }
}

/// Decoded protected header and still encoded signature of a JWS
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSignature {
    protected: Headers,
    signature: String,
}

impl DecodedSignature {
    /// Decoded protected header
    pub fn protected_headers(&self) -> &Headers {
        &self.protected
    }

    /// Signature segment as found in the compact JWS
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Base64url decode the signature into raw bytes
    pub fn decode_signature(&self) -> Result<Vec<u8>, OpaqueError> {
        BASE64_URL_SAFE_NO_PAD
            .decode(&self.signature)
            .context("decode signature")
    }
}

/// Everything a [`Verifier`] needs: the signing input exactly as received
/// together with the decoded header and signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToVerifySignature {
    signed_data: String,
    decoded_signature: DecodedSignature,
}

impl ToVerifySignature {
    /// `BASE64URL(header).BASE64URL(payload)` as received
    pub fn signed_data(&self) -> &str {
        &self.signed_data
    }

    /// Decoded header and signature to check against [`Self::signed_data`]
    pub fn decoded_signature(&self) -> &DecodedSignature {
        &self.decoded_signature
    }
}

/// Key able to sign a [`JWSCompact`] built by a [`JWSBuilder`]
pub trait Signer {
    /// Raw signature bytes
    type Signature: AsRef<[u8]>;
    /// Error returned when setting headers or signing fails
    type Error: Into<BoxError>;

    /// Set headers which are needed for this signer, e.g. `alg` and `kid`
    fn set_headers(&self, protected_headers: &mut Headers) -> Result<(), Self::Error>;

    /// Sign the provided signing input `BASE64URL(header).BASE64URL(payload)`
    fn sign(&self, data: &str) -> Result<Self::Signature, Self::Error>;
}

/// Key able to verify the signature of a [`JWSCompact`] while decoding it
pub trait Verifier {
    /// Error returned for a signature which is not valid
    type Error: Into<BoxError>;

    /// `Ok(())` only if the signature is valid for the signed data
    fn verify(&self, payload: &[u8], signature: &ToVerifySignature) -> Result<(), Self::Error>;
}
