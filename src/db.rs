pub mod store;
pub use store::{ActivityScope, CallFilter, FollowUpFilter, LeadFilter, SalesStore};
pub mod pg_store;
pub use pg_store::PgSalesStore;

#[cfg(test)]
pub mod memory_store;
#[cfg(test)]
pub use memory_store::MemoryStore;
