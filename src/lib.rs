#![doc = include_str!("../README.md")]

pub mod confidential;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod pkce;
pub mod token;
pub mod types;
pub mod well_known;

// Re-exports for convenient access
pub use confidential::{
    AuthenticationResult, AuthorizationCodeRequest, ConfidentialClient, TokenAcquirer,
};
pub use error::Error;
pub use oauth::{
    AuthClient, AuthorizationMessage, AuthorizationRequest, OidcConfig, TokenEndpointRequest,
    TokenResponse,
};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_nonce, generate_state};
pub use token::{IdTokenClaims, IdTokenValidator};
pub use types::{ClientSecret, SpaAuthCode, Subject};
pub use well_known::OpenIdConfiguration;
