//! Crypto logic used by jwkey.
//!
//! This includes but is not limited to:
//! - Javascript object signing and encryption (JOSE): JWS, JWK, JWA
//! - RSA key handles which publish themselves as a JWK and verify compact JWS
//! - Parsing of RSA key material (PEM, DER and JWK shaped input)
//!
//! # jwkey
//!
//! Crate used by the end-user `jwkey` crate and `jwkey` crate authors alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod jose;

pub mod dep {
    //! Dependencies for jwkey crypto modules.
    //!
    //! Exported for your convenience

    pub mod aws_lc_rs {
        //! Re-export of the [`aws-lc-rs`] crate.
        //!
        //! [`aws-lc-rs`]: https://docs.rs/aws-lc-rs

        #[doc(inline)]
        pub use aws_lc_rs::*;
    }

    pub mod pkcs1 {
        //! Re-export of the [`pkcs1`] crate.
        //!
        //! [`pkcs1`]: https://docs.rs/pkcs1

        #[doc(inline)]
        pub use pkcs1::*;
    }

    pub mod pkcs8 {
        //! Re-export of the [`pkcs8`] crate.
        //!
        //! [`pkcs8`]: https://docs.rs/pkcs8

        #[doc(inline)]
        pub use pkcs8::*;
    }

    pub mod pki_types {
        //! Re-export of the [`rustls-pki-types`] crate.
        //!
        //! [`rustls-pki-types`]: https://docs.rs/rustls-pki-types

        #[doc(inline)]
        pub use rustls_pki_types::*;
    }

    pub mod x509_parser {
        //! Re-export of the [`x509_parser`] crate.
        //!
        //! [`x509_parser`]: https://docs.rs/x509_parser

        #[doc(inline)]
        pub use x509_parser::*;
    }
}
