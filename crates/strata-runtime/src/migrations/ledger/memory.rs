use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{AppliedRecord, BoxFuture, LedgerStore};

/// In-process ledger.
///
/// Clones share the same records and lock, so two engines built from clones
/// contend with each other the way two processes would on a real store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    records: Arc<Mutex<Vec<AppliedRecord>>>,
    locked: Arc<AtomicBool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing records.
    pub fn with_records(records: Vec<AppliedRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            locked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy of the current records, in insertion order.
    pub async fn snapshot(&self) -> Vec<AppliedRecord> {
        self.records.lock().await.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

impl LedgerStore for MemoryLedger {
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn records(&self) -> BoxFuture<'_, Result<Vec<AppliedRecord>>> {
        Box::pin(async move { Ok(self.records.lock().await.clone()) })
    }

    fn record<'a>(&'a self, record: &'a AppliedRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            if records.iter().any(|r| r.identifier == record.identifier) {
                return Err(StrataError::Database(format!(
                    "Migration '{}' is already recorded",
                    record.identifier
                )));
            }
            records.push(record.clone());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.records
                .lock()
                .await
                .retain(|r| r.identifier != identifier);
            Ok(())
        })
    }

    fn try_lock(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.locked
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .map(|_| ())
                .map_err(|_| StrataError::LockContention)
        })
    }

    fn unlock(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.locked.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn force_unlock(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.locked.swap(false, Ordering::SeqCst)) })
    }
}
