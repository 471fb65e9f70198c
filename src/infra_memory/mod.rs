mod credential_repo_memory;
mod token_store_memory;

pub use credential_repo_memory::*;
pub use token_store_memory::*;
