//! Credential checking for HTTP Basic authentication.

pub mod hasher;
pub mod provider;

pub use hasher::{Argon2Hasher, CredentialHasher};
pub use provider::{
    AccountAuthenticationProvider, AuthError, AuthenticatedPrincipal, UserDetails, UserLookup,
};
