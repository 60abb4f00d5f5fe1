pub mod ledger;
pub mod memory;
pub mod models;
pub mod repository;
pub mod rules;

pub use ledger::SettlementLedger;
pub use memory::InMemoryLedgerRepository;
pub use models::{SplitKind, SplitRecord, SplitRule};
pub use repository::{LedgerRepository, SplitTotals};
