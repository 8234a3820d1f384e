pub(crate) use der_tags::*;
pub(crate) use rsa_encryption::RSA_ALGORITHM_IDENTIFIER;

mod der_tags {
    /// Identifier tag for a DER encoded integer.
    /// Defined in [ITU X.680](https://www.itu.int/ITU-T/studygroups/com17/languages/X.680-0207.pdf).
    pub(crate) const DER_TAG_INTEGER: u8 = 0x02;
    /// Identifier tag for a DER encoded bit string.
    pub(crate) const DER_TAG_BIT_STRING: u8 = 0x03;
    /// Identifier tag for a DER encoded (constructed) sequence.
    pub(crate) const DER_TAG_SEQUENCE: u8 = 0x30;
    /// Maximum length of a DER encoded length in short form.
    /// Defined in section 8.1.3 of [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf).
    pub(crate) const DER_LENGTH_SHORT_FORM_MAX: usize = 127;
    /// Flag set on the first length octet when the long form is used.
    pub(crate) const DER_LENGTH_LONG_FORM: u8 = 0x80;
    /// Octet that indicates that no unused bits are present in a bit string.
    pub(crate) const BIT_STRING_NO_UNUSED_BITS: u8 = 0x00;
}

/// DER encoded `AlgorithmIdentifier` for `rsaEncryption`.
///
/// OID `1.2.840.113549.1.1.1` from appendix C of
/// [RFC 8017](https://datatracker.ietf.org/doc/rfc8017/), with the NULL
/// parameter required by section 2.3.1 of [RFC 3279](https://www.rfc-editor.org/rfc/rfc3279.html).
mod rsa_encryption {
    const SEQUENCE_TAG: u8 = 0x30;
    const OBJECT_IDENTIFIER_TAG: u8 = 0x06;
    const NULL_TAG: u8 = 0x05;

    pub(crate) const RSA_ALGORITHM_IDENTIFIER: [u8; 15] = [
        SEQUENCE_TAG,
        0x0d,
        OBJECT_IDENTIFIER_TAG,
        0x09,
        // 1.2.840.113549.1.1.1
        0x2a,
        0x86,
        0x48,
        0x86,
        0xf7,
        0x0d,
        0x01,
        0x01,
        0x01,
        NULL_TAG,
        0x00,
    ];
}

/// High bit of the first content octet of a DER integer, set for negative values.
pub(crate) const INTEGER_SIGN_BIT_MASK: u8 = 0x80;

/// `Version` of a two-prime PKCS#1 `RSAPrivateKey`, see section A.1.2 of
/// [RFC 8017](https://datatracker.ietf.org/doc/rfc8017/).
/// Version 1 (`multi`) keys carry `otherPrimeInfos` and are not supported.
pub(crate) const RSA_PRIVATE_KEY_VERSION_TWO_PRIME: u8 = 0;
