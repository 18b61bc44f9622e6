//! Adapter implementations
//!
//! Adapters implement the `AccountStore` port with concrete technologies:
//! - DuckDB for durable bank data
//! - Process memory for tests and throwaway runs

pub mod duckdb;
pub mod memory;

pub use self::duckdb::DuckDbStore;
pub use self::memory::MemoryStore;
