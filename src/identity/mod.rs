//! Identity: who is calling.
//! Credential issuance (signup/login), bearer tokens, and the request-scoped principal.
//! Keep the public surface thin and split implementation across sub-modules.

mod handle;
mod principal;
mod provider;
mod token;
mod validate;

pub use handle::{choose_handle, HandleChoice, MAX_ATTEMPTS as HANDLE_ATTEMPTS};
pub use principal::{Principal, Role, RoleSet};
pub use provider::{
    CredentialIssuer, IssuedToken, LoginRequest, PrivateIdentity, PublicIdentity, SignupRequest, ALREADY_EXISTS,
};
pub use token::{bearer_token, Claims, TokenIssuer, TokenVerifier};
