pub mod memory;
pub mod sled_store;

pub use ledger_core::chain::ChainStore;
pub use memory::MemoryStore;
pub use sled_store::SledStore;
