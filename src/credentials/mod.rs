//! Credential packing module
//!
//! Strips the application-master-to-resource-manager token out of the
//! current identity's delegation tokens and serializes the rest into an
//! immutable blob that launch contexts can cheaply duplicate.

mod packer;

pub use packer::{CredentialBlob, CredentialPacker, CredentialsSource, Token, AM_RM_TOKEN_KIND};
