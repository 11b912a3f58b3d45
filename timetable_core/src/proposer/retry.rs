use async_trait::async_trait;
use std::time::Duration;

use super::{AssignmentProposer, ProposalRequest, ProposerError, ProposerReply};

/// Wraps a proposer with a bounded number of attempts and a fixed pause
/// between them. A reply that parses, even an empty one, ends the loop.
pub struct RetryingProposer<P> {
    inner: P,
    max_attempts: u32,
    delay: Duration,
}

impl<P: AssignmentProposer> RetryingProposer<P> {
    pub fn new(inner: P, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: AssignmentProposer> AssignmentProposer for RetryingProposer<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<ProposerReply, ProposerError> {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            match self.inner.propose(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    log::warn!(
                        "[{}] {} attempt {}/{} failed: {}",
                        self.inner.name(),
                        request.label,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    last = e.to_string();
                }
            }
            if attempt < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(ProposerError::RetriesExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
