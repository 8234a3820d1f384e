//! DER support for the RSA key structures used by JOSE.
//!
//! The structures involved are:
//!
//! - `SubjectPublicKeyInfo` from section 4.1 of [RFC 5280](https://datatracker.ietf.org/doc/rfc5280/)
//! - `RSAPrivateKey` from section A.1.2 of [RFC 8017](https://datatracker.ietf.org/doc/rfc8017/)
//! - `PrivateKeyInfo` from section 5 of [RFC 5208](https://datatracker.ietf.org/doc/rfc5208/)
//!
//! Only the first two are ever written, to move RSA keys from their JWK
//! representation into the formats expected by `aws-lc-rs`. Encoding rules
//! follow [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf).
//! Private keys are read with the `pkcs1` and `pkcs8` crates.

use std::fmt;

use jwkey_error::{ErrorContext as _, OpaqueError};

use crate::jose::constants::{
    BIT_STRING_NO_UNUSED_BITS, DER_LENGTH_LONG_FORM, DER_LENGTH_SHORT_FORM_MAX,
    DER_TAG_BIT_STRING, DER_TAG_INTEGER, DER_TAG_SEQUENCE, INTEGER_SIGN_BIT_MASK,
    RSA_ALGORITHM_IDENTIFIER, RSA_PRIVATE_KEY_VERSION_TWO_PRIME,
};

#[derive(Clone, PartialEq, Eq)]
/// Components of a two-prime RSA private key.
///
/// All values are unsigned big-endian integers without leading zero octets,
/// which is also the representation used by JWK.
pub(crate) struct RsaPrivateComponents {
    pub(crate) n: Vec<u8>,
    pub(crate) e: Vec<u8>,
    pub(crate) d: Vec<u8>,
    pub(crate) p: Vec<u8>,
    pub(crate) q: Vec<u8>,
    pub(crate) dp: Vec<u8>,
    pub(crate) dq: Vec<u8>,
    pub(crate) qi: Vec<u8>,
}

impl fmt::Debug for RsaPrivateComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateComponents")
            .field("modulus_len", &self.n.len())
            .finish_non_exhaustive()
    }
}

/// Encode a PKCS#1 `RSAPublicKey` wrapped in a `SubjectPublicKeyInfo`
///
/// ```text
/// SubjectPublicKeyInfo ::= SEQUENCE {
///     algorithm         AlgorithmIdentifier,
///     subjectPublicKey  BIT STRING -- RSAPublicKey
/// }
///
/// RSAPublicKey ::= SEQUENCE {
///     modulus           INTEGER,
///     publicExponent    INTEGER
/// }
/// ```
pub(crate) fn create_subject_public_key_info(n: &[u8], e: &[u8]) -> Vec<u8> {
    let mut rsa_public_key = Vec::with_capacity(n.len() + e.len() + 16);
    encode_integer(n, &mut rsa_public_key);
    encode_integer(e, &mut rsa_public_key);

    let mut bit_string = Vec::with_capacity(rsa_public_key.len() + 8);
    bit_string.push(BIT_STRING_NO_UNUSED_BITS);
    encode_tlv(DER_TAG_SEQUENCE, &rsa_public_key, &mut bit_string);

    let mut content = Vec::with_capacity(RSA_ALGORITHM_IDENTIFIER.len() + bit_string.len() + 8);
    content.extend_from_slice(&RSA_ALGORITHM_IDENTIFIER);
    encode_tlv(DER_TAG_BIT_STRING, &bit_string, &mut content);

    let mut result = Vec::with_capacity(content.len() + 8);
    encode_tlv(DER_TAG_SEQUENCE, &content, &mut result);
    result
}

/// Encode a two-prime PKCS#1 `RSAPrivateKey`
///
/// ```text
/// RSAPrivateKey ::= SEQUENCE {
///     version           Version,
///     modulus           INTEGER,  -- n
///     publicExponent    INTEGER,  -- e
///     privateExponent   INTEGER,  -- d
///     prime1            INTEGER,  -- p
///     prime2            INTEGER,  -- q
///     exponent1         INTEGER,  -- d mod (p-1)
///     exponent2         INTEGER,  -- d mod (q-1)
///     coefficient       INTEGER,  -- (inverse of q) mod p
/// }
/// ```
pub(crate) fn create_rsa_private_key(key: &RsaPrivateComponents) -> Vec<u8> {
    let mut content = Vec::with_capacity(key.n.len() * 5);
    encode_integer(&[RSA_PRIVATE_KEY_VERSION_TWO_PRIME], &mut content);
    for value in [&key.n, &key.e, &key.d, &key.p, &key.q, &key.dp, &key.dq, &key.qi] {
        encode_integer(value, &mut content);
    }

    let mut result = Vec::with_capacity(content.len() + 8);
    encode_tlv(DER_TAG_SEQUENCE, &content, &mut result);
    result
}

/// Decode a two-prime PKCS#1 `RSAPrivateKey`, see [`create_rsa_private_key`]
/// for the structure. Multi-prime (version 1) keys are rejected.
pub(crate) fn decode_rsa_private_key(der: &[u8]) -> Result<RsaPrivateComponents, OpaqueError> {
    let key = pkcs1::RsaPrivateKey::try_from(der).context("decode RSAPrivateKey")?;
    if !matches!(key.version(), pkcs1::Version::TwoPrime) {
        return Err(OpaqueError::from_display(
            "only two-prime RSA private keys (version 0) are supported",
        ));
    }

    let uint = |value: pkcs1::UintRef<'_>| value.as_bytes().to_vec();
    Ok(RsaPrivateComponents {
        n: uint(key.modulus),
        e: uint(key.public_exponent),
        d: uint(key.private_exponent),
        p: uint(key.prime1),
        q: uint(key.prime2),
        dp: uint(key.exponent1),
        dq: uint(key.exponent2),
        qi: uint(key.coefficient),
    })
}

/// Unwrap the `privateKey` octets of a PKCS#8 `PrivateKeyInfo`
///
/// ```text
/// PrivateKeyInfo ::= SEQUENCE {
///     version                   Version,
///     privateKeyAlgorithm       AlgorithmIdentifier,
///     privateKey                OCTET STRING,
///     attributes           [0]  IMPLICIT Attributes OPTIONAL
/// }
/// ```
///
/// Fails if the algorithm is anything other than `rsaEncryption`.
pub(crate) fn unwrap_pkcs8(der: &[u8]) -> Result<&[u8], OpaqueError> {
    let info = pkcs8::PrivateKeyInfo::try_from(der).context("decode PrivateKeyInfo")?;
    if info.algorithm.oid != pkcs1::ALGORITHM_OID {
        return Err(OpaqueError::from_display(format!(
            "private key algorithm {} is not rsaEncryption",
            info.algorithm.oid
        )));
    }
    Ok(info.private_key)
}

/// Length encoding as defined in section 8.1.3 of X.690
fn encode_der_length(len: usize, out: &mut Vec<u8>) {
    if len <= DER_LENGTH_SHORT_FORM_MAX {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let significant = strip_leading_zeros(&bytes);
    out.push(DER_LENGTH_LONG_FORM | significant.len() as u8);
    out.extend_from_slice(significant);
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_der_length(content.len(), out);
    out.extend_from_slice(content);
}

/// Encode an unsigned big-endian value as a DER integer.
///
/// Leading zero octets are dropped and a single zero octet is
/// prepended again when the sign bit would otherwise be set.
fn encode_integer(value: &[u8], out: &mut Vec<u8>) {
    let value = strip_leading_zeros(value);
    let needs_leading_zero = value
        .first()
        .is_none_or(|first| first & INTEGER_SIGN_BIT_MASK != 0);

    out.push(DER_TAG_INTEGER);
    encode_der_length(value.len() + needs_leading_zero as usize, out);
    if needs_leading_zero {
        out.push(0);
    }
    out.extend_from_slice(value);
}

/// Strip leading zero octets, keeping a single octet for the value zero
pub(crate) fn strip_leading_zeros(value: &[u8]) -> &[u8] {
    let zeros = value.iter().take_while(|byte| **byte == 0).count();
    &value[zeros.min(value.len().saturating_sub(1))..]
}

#[cfg(test)]
mod tests {
    use super::*;

    use rustls_pki_types::{PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, pem::PemObject};
    use tokio_test::{assert_err, assert_ok};

    const PKCS8_PEM: &str = include_str!("../../tests/fixtures/rsa2048_pkcs8.pem");
    const PKCS1_PEM: &str = include_str!("../../tests/fixtures/rsa2048_pkcs1.pem");
    const EC_PEM: &str = include_str!("../../tests/fixtures/ec_p256_pkcs8.pem");

    fn components() -> RsaPrivateComponents {
        RsaPrivateComponents {
            n: vec![0xc5; 256],
            e: vec![0x01, 0x00, 0x01],
            d: vec![0x7f; 256],
            p: vec![0x80; 128],
            q: vec![0x01; 128],
            dp: vec![0x00, 0x42],
            dq: vec![0x42],
            qi: vec![0xff; 128],
        }
    }

    #[test]
    fn integer_encoding() {
        let mut out = Vec::new();
        encode_integer(&[0x01, 0x00, 0x01], &mut out);
        assert_eq!(out, [0x02, 0x03, 0x01, 0x00, 0x01]);

        out.clear();
        encode_integer(&[0x80], &mut out);
        assert_eq!(out, [0x02, 0x02, 0x00, 0x80]);

        out.clear();
        encode_integer(&[0x00, 0x00, 0x7f], &mut out);
        assert_eq!(out, [0x02, 0x01, 0x7f]);

        out.clear();
        encode_integer(&[], &mut out);
        assert_eq!(out, [0x02, 0x01, 0x00]);
    }

    #[test]
    fn length_encoding() {
        for (len, expected) in [
            (0usize, vec![0x00]),
            (127, vec![0x7f]),
            (128, vec![0x81, 0x80]),
            (255, vec![0x81, 0xff]),
            (256, vec![0x82, 0x01, 0x00]),
            (65_536, vec![0x83, 0x01, 0x00, 0x00]),
        ] {
            let mut out = Vec::new();
            encode_der_length(len, &mut out);
            assert_eq!(out, expected, "len {len}");
        }
    }

    #[test]
    fn subject_public_key_info_layout() {
        let n = [0xc5; 256];
        let spki = create_subject_public_key_info(&n, &[0x01, 0x00, 0x01]);

        // SEQUENCE, 2 length octets, algorithm identifier, BIT STRING
        assert_eq!(&spki[..2], &[DER_TAG_SEQUENCE, 0x82]);
        assert_eq!(&spki[4..4 + RSA_ALGORITHM_IDENTIFIER.len()], &RSA_ALGORITHM_IDENTIFIER);
        assert_eq!(spki[4 + RSA_ALGORITHM_IDENTIFIER.len()], DER_TAG_BIT_STRING);
        // modulus needs a leading zero because the high bit is set
        assert_eq!(spki.len(), 294);
        assert!(spki.ends_with(&[0x02, 0x03, 0x01, 0x00, 0x01]));
    }

    #[test]
    fn rsa_private_key_decodes_what_was_encoded() {
        let key = components();
        let der = create_rsa_private_key(&key);
        let decoded = decode_rsa_private_key(&der).unwrap();

        assert_eq!(decoded.n, key.n);
        assert_eq!(decoded.e, key.e);
        assert_eq!(decoded.d, key.d);
        assert_eq!(decoded.p, key.p);
        assert_eq!(decoded.q, key.q);
        // leading zeros are not significant
        assert_eq!(decoded.dp, vec![0x42]);
        assert_eq!(decoded.dq, key.dq);
        assert_eq!(decoded.qi, key.qi);
    }

    #[test]
    fn multi_prime_and_trailing_data_are_rejected() {
        let mut der = create_rsa_private_key(&components());
        let version_offset = 4;
        assert_eq!(&der[version_offset..version_offset + 3], &[0x02, 0x01, 0x00]);
        der[version_offset + 2] = 0x01;
        assert_err!(decode_rsa_private_key(&der));

        let mut der = create_rsa_private_key(&components());
        der.push(0x00);
        assert_err!(decode_rsa_private_key(&der));

        let der = create_rsa_private_key(&components());
        assert_err!(decode_rsa_private_key(&der[..der.len() - 1]));
    }

    #[test]
    fn pkcs8_unwraps_to_pkcs1() {
        let pkcs8 = PrivatePkcs8KeyDer::from_pem_slice(PKCS8_PEM.as_bytes()).unwrap();
        let pkcs1 = PrivatePkcs1KeyDer::from_pem_slice(PKCS1_PEM.as_bytes()).unwrap();

        let unwrapped = assert_ok!(unwrap_pkcs8(pkcs8.secret_pkcs8_der()));
        assert_eq!(unwrapped, pkcs1.secret_pkcs1_der());

        let from_pkcs8 = decode_rsa_private_key(unwrapped).unwrap();
        let from_pkcs1 = decode_rsa_private_key(pkcs1.secret_pkcs1_der()).unwrap();
        assert!(from_pkcs8 == from_pkcs1);
        assert_eq!(from_pkcs1.n.len(), 256);
        assert_eq!(from_pkcs1.e, [0x01, 0x00, 0x01]);
    }

    #[test]
    fn pkcs8_of_other_algorithms_is_rejected() {
        let ec = PrivatePkcs8KeyDer::from_pem_slice(EC_PEM.as_bytes()).unwrap();
        let err = unwrap_pkcs8(ec.secret_pkcs8_der()).unwrap_err();
        assert!(err.to_string().contains("rsaEncryption"), "{err}");

        // a bare RSAPrivateKey is not a PrivateKeyInfo
        assert_err!(unwrap_pkcs8(&create_rsa_private_key(&components())));
    }

    #[test]
    fn private_components_debug_is_redacted() {
        let debug = format!("{:?}", components());
        assert_eq!(debug, "RsaPrivateComponents { modulus_len: 256, .. }");
    }

    #[test]
    fn strip_keeps_single_zero() {
        assert_eq!(strip_leading_zeros(&[0, 0, 0]), &[0]);
        assert_eq!(strip_leading_zeros(&[0, 1, 0]), &[1, 0]);
        assert_eq!(strip_leading_zeros(&[]), &[] as &[u8]);
    }
}
