pub mod diesel_pool;
pub mod memory;
pub mod postgres;
pub mod store;

pub use diesel_pool::{create_diesel_pool, DieselDatabaseConfig, DieselPool};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{PermissionStore, StoreError, Stores, TokenStore, UserStore};
