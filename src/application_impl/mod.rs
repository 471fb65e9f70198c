mod argon2_hasher;
mod credential_verifier_impl;
mod jwt_codec;
mod session_service_impl;
mod token_issuer;
mod token_rotator;
mod token_validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use argon2_hasher::*;
pub use credential_verifier_impl::*;
pub use jwt_codec::*;
pub use session_service_impl::*;
pub use token_issuer::*;
pub use token_rotator::*;
pub use token_validator::*;
