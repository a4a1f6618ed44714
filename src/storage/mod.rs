pub mod file;
pub mod memory;
pub mod store;

pub use file::{FileRecordStore, StoreLayout};
pub use memory::MemoryRecordStore;
pub use store::{OverflowState, RecordStore};
