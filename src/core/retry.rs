use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff policy shared by the ledger fetcher and the dispatch
/// client: a fixed attempt ceiling with a doubling delay between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

/// Outcome of a single attempt, as classified by the caller.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Terminal success.
    Done(T),
    /// Transient failure. `wait_hint` overrides the backoff schedule when the
    /// upstream supplied an explicit retry delay.
    Retry { wait_hint: Option<Duration> },
    /// Terminal failure; retrying would not help.
    Fatal(E),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The attempt ceiling was reached without a terminal outcome.
    Exhausted,
    Fatal(E),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// The policy both upstream integrations use: 5 attempts, 1s doubling.
    pub fn standard() -> Self {
        Self::new(5, Duration::from_secs(1))
    }

    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let mut backoff = self.initial_backoff;
        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => return Err(RetryError::Fatal(err)),
                Attempt::Retry { wait_hint } => {
                    if attempt == self.max_attempts {
                        break;
                    }
                    sleep(wait_hint.unwrap_or(backoff)).await;
                    backoff *= 2;
                }
            }
        }
        Err(RetryError::Exhausted)
    }
}
