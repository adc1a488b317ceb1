//! Concrete delivery backends.
//!
//! - `compose`: writes unsent `.eml` drafts for a desktop mail client
//! - `postgres`: inserts draft rows into a PostgreSQL table
//! - `remote`: posts drafts to a token-authenticated HTTP API
//! - `memory`: captures messages in process

mod address;
mod compose;
mod credentials;
mod factory;
mod memory;
mod postgres;
mod remote;

pub use address::{parse_address_list, Mailbox};
pub use compose::ComposeBackend;
pub use credentials::{AccessClaims, CredentialProvider};
pub use factory::create_backends;
pub use memory::MemoryBackend;
pub use postgres::PostgresDraftBackend;
pub use remote::RemoteDraftBackend;
