//! Stand-in provider for dry runs
//!
//! The binary never talks to a real provider. [`SimulatedProvider`] accepts
//! every unit and can be told to fail every Nth one, which is enough to
//! exercise the dispatch loop's failure reporting end to end.

use anyhow::anyhow;
use async_trait::async_trait;
use dispatchcrab::{DispatchOp, Flow, WorkUnit};
use std::fmt::Debug;

#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    fail_every: u64,
    stop_on_failure: bool,
    sent: u64,
    rejected: u64,
}

impl SimulatedProvider {
    /// `fail_every == 0` never fails
    pub fn new(fail_every: u64, stop_on_failure: bool) -> Self {
        SimulatedProvider {
            fail_every,
            stop_on_failure,
            ..Default::default()
        }
    }

    /// Units accepted so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[async_trait]
impl<T> DispatchOp<T> for SimulatedProvider
where
    T: Debug + Sync,
{
    type Error = anyhow::Error;

    async fn dispatch(&mut self, unit: &WorkUnit<T>) -> anyhow::Result<()> {
        if self.fail_every > 0 && unit.index % self.fail_every == 0 {
            self.rejected += 1;
            return Err(anyhow!(
                "simulated provider rejected unit {} ({:?}..{:?})",
                unit.index,
                unit.range_start,
                unit.range_end
            ));
        }

        tracing::trace!(unit = unit.index, "simulated send");
        self.sent += 1;
        Ok(())
    }

    fn on_failure(&mut self, _unit: &WorkUnit<T>, _error: &anyhow::Error) -> Flow {
        if self.stop_on_failure {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: u64) -> WorkUnit<u64> {
        WorkUnit {
            index,
            range_start: (index - 1) * 10,
            range_end: index * 10,
        }
    }

    #[tokio::test]
    async fn test_never_fails_by_default() {
        let mut provider = SimulatedProvider::new(0, false);
        for index in 1..=5 {
            provider.dispatch(&unit(index)).await.unwrap();
        }
        assert_eq!(provider.sent(), 5);
        assert_eq!(provider.rejected(), 0);
    }

    #[tokio::test]
    async fn test_fails_every_nth_unit() {
        let mut provider = SimulatedProvider::new(3, false);
        let mut failed = Vec::new();
        for index in 1..=7 {
            if provider.dispatch(&unit(index)).await.is_err() {
                failed.push(index);
            }
        }
        assert_eq!(failed, vec![3, 6]);
        assert_eq!(provider.sent(), 5);
    }

    #[tokio::test]
    async fn test_failure_flow_follows_setting() {
        let mut provider = SimulatedProvider::new(1, true);
        let err = provider.dispatch(&unit(1)).await.unwrap_err();

        assert!(err.to_string().contains("unit 1 (0..10)"));
        assert_eq!(provider.on_failure(&unit(1), &err), Flow::Stop);
    }
}
