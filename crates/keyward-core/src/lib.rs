//! # keyward-core
//!
//! Data model and policy configuration shared by every Keyward crate.
//!
//! Nothing in here performs I/O or cryptography: the token crate signs and
//! verifies, the store crate persists, and both agree on the types below.

// Configuration types shared across all Keyward crates
pub mod config;

// Principals, key pair records, roles and groups
pub mod model;

pub use config::{ConfigError, KeyConfig, TokenConfig};
pub use model::{
    Group, GroupId, KeyMaterial, KeyPairRecord, NewPrincipal, Principal, PrincipalId,
    PrincipalUpdate, Role, RoleId,
};
