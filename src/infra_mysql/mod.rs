mod credential_repo_mysql;
mod token_store_mysql;

pub use credential_repo_mysql::*;
pub use token_store_mysql::*;

mod util;
