use std::collections::HashSet;

use tokio::sync::Mutex;

use strata_core::error::{Result, StrataError};
use strata_core::migration::{BoxFuture, Direction, SchemaExecutor};
use strata_core::schema::SchemaOperation;

/// One call the engine made to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCall {
    pub identifier: String,
    pub direction: Direction,
    pub operations: Vec<SchemaOperation>,
}

/// Executor that records calls instead of touching a store.
///
/// Individual (identifier, direction) pairs can be set to fail.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutedCall>>,
    fail_on: HashSet<(String, Direction)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `identifier` fail when run in `direction`.
    pub fn fail_on(mut self, identifier: impl Into<String>, direction: Direction) -> Self {
        self.fail_on.insert((identifier.into(), direction));
        self
    }

    /// Every call so far, including failed ones.
    pub async fn calls(&self) -> Vec<ExecutedCall> {
        self.calls.lock().await.clone()
    }

    /// Identifiers run in `direction`, in call order.
    pub async fn identifiers(&self, direction: Direction) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.direction == direction)
            .map(|c| c.identifier.clone())
            .collect()
    }
}

impl SchemaExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute<'a>(
        &'a self,
        identifier: &'a str,
        direction: Direction,
        operations: &'a [SchemaOperation],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().await.push(ExecutedCall {
                identifier: identifier.to_string(),
                direction,
                operations: operations.to_vec(),
            });

            if self.fail_on.contains(&(identifier.to_string(), direction)) {
                return Err(StrataError::Database(format!(
                    "simulated failure in {}",
                    identifier
                )));
            }
            Ok(())
        })
    }

    fn preview(&self, operations: &[SchemaOperation]) -> Result<Vec<String>> {
        Ok(operations.iter().map(|op| op.describe()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails_on_request() {
        let executor = RecordingExecutor::new().fail_on("b", Direction::Down);

        executor.execute("a", Direction::Up, &[]).await.unwrap();
        executor.execute("b", Direction::Up, &[]).await.unwrap();
        assert!(executor.execute("b", Direction::Down, &[]).await.is_err());

        assert_eq!(executor.identifiers(Direction::Up).await, vec!["a", "b"]);
        assert_eq!(executor.calls().await.len(), 3);
    }
}
