pub mod domain;
pub mod fields;
pub mod store;
pub mod aggregate;
pub mod manager;
pub mod mock;
pub mod prelude;

pub use manager::StatsManager;
