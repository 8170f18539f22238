pub mod audit;
pub mod compose;
pub mod directory;
pub mod dispatch;
pub mod engine;
pub mod ledger;
pub mod processor;
pub mod retry;

pub use crate::domain::model::{
    CustomerRecord, DispatchOutcome, DispatchStatus, Installment, LedgerSystem, Period,
    PeriodBuckets, PeriodStats, ReminderEntry, RunReport, SendResult,
};
pub use crate::domain::ports::{AuditSink, Mailer};
pub use crate::utils::error::Result;
