//! Google credential handling for Matchline.
//!
//! A host stores credential fields behind an opaque handle. This crate
//! resolves the handle ([`CredentialResolver`]), validates the fields
//! ([`resolve_auth_options`]) and turns the result into access tokens
//! ([`AuthOptions::token_provider`]).
//!
//! ```rust
//! use matchline_auth::{resolve_auth_options, CredentialBundle, CredentialSource};
//!
//! let bundle = CredentialBundle::new()
//!     .with_key_file("/secrets/sa.json")
//!     .with_project_id("my-project");
//! let options = resolve_auth_options(&bundle).unwrap();
//! assert_eq!(options.source(), CredentialSource::KeyFile("/secrets/sa.json"));
//! ```

mod bundle;
mod options;
mod resolver;
mod token;

pub use bundle::CredentialBundle;
pub use options::{resolve_auth_options, AuthOptions, CredentialSource};
pub use resolver::{CredentialResolver, InMemoryCredentialResolver};
pub use token::{
    application_default, AuthorizedUserCredentials, AuthorizedUserTokenProvider,
    CredentialsFile, MetadataServerTokenProvider, ProjectOverride, ServiceAccountKey,
    ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider, CLOUD_PLATFORM_SCOPE,
    DEFAULT_TOKEN_URI,
};
