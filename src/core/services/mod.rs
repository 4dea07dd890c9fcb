pub mod ledger_service;
pub mod period_service;

pub use ledger_service::LedgerService;
pub use period_service::PeriodService;
