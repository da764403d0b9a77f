use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::runtime::types::RuntimeError;

/// RAII guard that releases a dispatch slot when dropped.
///
/// A background unit holds this for the whole inference and persist phase.
pub struct DispatchPermit {
    /// Owned permit; dropping this struct releases it back to the semaphore.
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for DispatchPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPermit").finish()
    }
}

/// Bounds how many jobs run inference at the same time.
///
/// Jobs that cannot get a slot wait in [`acquire`](Self::acquire) and stay
/// `queued` until one is released.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    semaphore: Arc<Semaphore>,
}

impl DispatchGate {
    /// A gate with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot.
    ///
    /// Returns [`RuntimeError::Shutdown`] if the gate was closed.
    pub async fn acquire(&self) -> Result<DispatchPermit, RuntimeError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map(|permit| DispatchPermit { permit })
            .map_err(|_| RuntimeError::Shutdown)
    }

    /// Refuse every future acquisition; waiting units fail with `Shutdown`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn permits_bound_concurrency() {
        let gate = DispatchGate::new(2);
        let p1 = gate.acquire().await.expect("first permit");
        let _p2 = gate.acquire().await.expect("second permit");
        assert_eq!(gate.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err(), "third permit should wait");

        drop(p1);
        let _p3 = tokio::time::timeout(Duration::from_secs(1), gate.acquire())
            .await
            .expect("permit after release")
            .expect("gate open");
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let gate = DispatchGate::new(0);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn closed_gate_reports_shutdown() {
        let gate = DispatchGate::new(1);
        gate.close();
        assert!(matches!(gate.acquire().await, Err(RuntimeError::Shutdown)));
    }
}
