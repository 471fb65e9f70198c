// store

mod token_store;

pub use token_store::*;

// repo

mod credential_repo;

pub use credential_repo::*;

// time

mod clock;

pub use clock::*;
