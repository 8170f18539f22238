use crate::core::compose::MailPayload;
use crate::domain::model::{DispatchOutcome, SendResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Delivery-provider seam. The production implementation talks to SendGrid;
/// tests substitute an in-memory fake.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, payload: &MailPayload) -> SendResult;
}

/// Best-effort audit persistence. Operations report success or failure, but
/// callers never propagate the error; at most they log it.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, outcome: &DispatchOutcome) -> Result<()>;
}
