// src/storage/mod.rs
pub mod file;
pub mod mock;
pub mod repository;
pub mod traits;

pub use file::FileRuleSource;
pub use mock::MemoryRuleSource;
pub use repository::InMemoryRuleRepository;
pub use traits::{RuleProvider, RulePublisher, RuleRepository};
