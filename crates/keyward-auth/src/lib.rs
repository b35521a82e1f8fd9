//! # keyward-auth
//!
//! The pieces that sit between the HTTP layer and the token engine:
//!
//! - [`AccessGate`] turns an `Authorization` header and an optional required
//!   role into an allow/deny [`Decision`].
//! - [`AccountService`] registers principals, runs the login flow and rotates
//!   key pairs.
//! - [`password`] hashes and checks login passwords with argon2.
//!
//! Both services take a [`keyward_store::SharedStore`] at construction.

pub mod accounts;
pub mod error;
pub mod gate;
pub mod password;

pub use accounts::{AccountService, Registration};
pub use error::AuthError;
pub use gate::{AccessGate, Authorized, Decision, DenyReason, bearer_token};
