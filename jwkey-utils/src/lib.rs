//! Utilities crate for jwkey.
//!
//! Crate used by the end-user `jwkey` crate and `jwkey` crate authors alike.
//! Most notably it hosts the macros which generate the `with_*` / `set_*`
//! setter pairs found on the builders of the workspace.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

#[doc(hidden)]
#[macro_use]
pub mod macros;
