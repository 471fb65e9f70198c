mod credential_service;
mod session_service;

pub use credential_service::*;
pub use session_service::*;
