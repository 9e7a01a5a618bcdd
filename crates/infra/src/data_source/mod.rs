//! Data-source boundary.
//!
//! The mapper never talks to storage directly; every read and write goes
//! through a `DataSource` registered per class.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDataSource;
pub use r#trait::DataSource;
