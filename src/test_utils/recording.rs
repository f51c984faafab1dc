use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::Driver;
use crate::error::DatabaseError;
use crate::results::QueryResult;
use crate::types::SqlValue;

/// Handle to one connection opened by a [`RecordingDriver`].
#[derive(Debug, PartialEq, Eq)]
pub struct RecordedConnection {
    pub id: usize,
}

#[derive(Debug, Default)]
struct Recorder {
    statements: Vec<(usize, String)>,
    responses: HashMap<String, QueryResult>,
    failures: HashMap<String, DatabaseError>,
    refuse: Option<String>,
    latency: Option<Duration>,
    opened: usize,
    disconnected: Vec<usize>,
    in_flight: HashSet<usize>,
    overlaps: usize,
}

/// In-memory driver that records every statement it is asked to run.
///
/// Statements get the result scripted with [`RecordingDriver::respond_with`], the error
/// scripted with [`RecordingDriver::fail_on`], or an empty result. Clones share one recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn respond_with(&self, sql: impl Into<String>, result: QueryResult) {
        self.recorder().responses.insert(sql.into(), result);
    }

    pub fn fail_on(&self, sql: impl Into<String>, error: DatabaseError) {
        self.recorder().failures.insert(sql.into(), error);
    }

    /// Fail every later `connect` with a `ConnectionPool` error carrying `message`.
    pub fn refuse_connections(&self, message: impl Into<String>) {
        self.recorder().refuse = Some(message.into());
    }

    /// Let `connect` succeed again after [`RecordingDriver::refuse_connections`].
    pub fn accept_connections(&self) {
        self.recorder().refuse = None;
    }

    /// Delay every statement, so tests can cancel one mid-flight.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.recorder().latency = Some(latency);
        self
    }

    /// Every statement run so far, across all connections, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.recorder()
            .statements
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    #[must_use]
    pub fn statements_on(&self, connection_id: usize) -> Vec<String> {
        self.recorder()
            .statements
            .iter()
            .filter(|(id, _)| *id == connection_id)
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.recorder().opened
    }

    /// Ids of connections closed through `disconnect`.
    #[must_use]
    pub fn disconnected(&self) -> Vec<usize> {
        self.recorder().disconnected.clone()
    }

    /// Statements that started while another was still running on the same connection.
    #[must_use]
    pub fn overlapping_statements(&self) -> usize {
        self.recorder().overlaps
    }

    /// Forget recorded statements, keeping scripted responses.
    pub fn clear(&self) {
        self.recorder().statements.clear();
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    type Connection = RecordedConnection;

    async fn connect(&self, _connection_string: &str) -> Result<RecordedConnection, DatabaseError> {
        let mut recorder = self.recorder();
        if let Some(message) = &recorder.refuse {
            return Err(DatabaseError::connection_pool(message.clone()));
        }
        let id = recorder.opened;
        recorder.opened += 1;
        Ok(RecordedConnection { id })
    }

    async fn disconnect(&self, connection: RecordedConnection) -> Result<(), DatabaseError> {
        self.recorder().disconnected.push(connection.id);
        Ok(())
    }

    async fn run_query(
        &self,
        connection: &mut RecordedConnection,
        sql: &str,
        _params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        let latency = {
            let mut recorder = self.recorder();
            recorder.statements.push((connection.id, sql.to_string()));
            if !recorder.in_flight.insert(connection.id) {
                recorder.overlaps += 1;
            }
            recorder.latency
        };
        let in_flight = InFlight {
            driver: self,
            connection_id: connection.id,
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        drop(in_flight);

        let recorder = self.recorder();
        if let Some(err) = recorder.failures.get(sql) {
            return Err(err.clone());
        }
        Ok(recorder.responses.get(sql).cloned().unwrap_or_default())
    }
}

/// Clears a connection's in-flight mark when its statement finishes or is cancelled.
struct InFlight<'a> {
    driver: &'a RecordingDriver,
    connection_id: usize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.driver
            .recorder()
            .in_flight
            .remove(&self.connection_id);
    }
}
