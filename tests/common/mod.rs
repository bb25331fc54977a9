//! Scripted in-memory driver for exercising the executor without a server.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sproc_middleware::prelude::*;

/// What the next call on any mock connection should produce.
#[derive(Debug)]
pub enum Outcome {
    Status(ProcedureStatus),
    Scalar(RowValues),
    Rows(ResultSet, Option<ProcedureStatus>),
    Fail(SqlProcError),
}

/// One procedure call as the connection saw it.
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub kind: &'static str,
    pub procedure: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub outcomes: VecDeque<Outcome>,
    pub calls: Vec<SeenCall>,
    pub connect_error: Option<String>,
    pub connects: usize,
    pub closes: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: Outcome) -> &Self {
        self.state().outcomes.push_back(outcome);
        self
    }

    pub fn refuse_connections(&self, message: &str) {
        self.state().connect_error = Some(message.to_string());
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl ProcedureDriver for MockDriver {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, SqlProcError> {
        let mut state = self.state();
        if let Some(message) = &state.connect_error {
            return Err(SqlProcError::ConnectionError(message.clone()));
        }
        state.connects += 1;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn next(&self, kind: &'static str, call: ProcedureCall<'_>) -> Option<Outcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SeenCall {
            kind,
            procedure: call.procedure.to_string(),
            params: call.params.to_vec(),
        });
        state.outcomes.pop_front()
    }
}

fn unexpected(kind: &str, outcome: Option<Outcome>) -> SqlProcError {
    SqlProcError::ExecutionError(format!("mock: {kind} got {outcome:?}"))
}

#[async_trait]
impl ProcedureConnection for MockConnection {
    async fn execute_non_query(
        &mut self,
        call: ProcedureCall<'_>,
    ) -> Result<ProcedureStatus, SqlProcError> {
        match self.next("non_query", call) {
            Some(Outcome::Status(status)) => Ok(status),
            Some(Outcome::Fail(err)) => Err(err),
            other => Err(unexpected("non_query", other)),
        }
    }

    async fn execute_scalar(&mut self, call: ProcedureCall<'_>) -> Result<RowValues, SqlProcError> {
        match self.next("scalar", call) {
            Some(Outcome::Scalar(value)) => Ok(value),
            Some(Outcome::Fail(err)) => Err(err),
            other => Err(unexpected("scalar", other)),
        }
    }

    async fn execute_reader(
        &mut self,
        call: ProcedureCall<'_>,
        capture_status: bool,
        row_limit: Option<usize>,
    ) -> Result<(ResultSet, Option<ProcedureStatus>), SqlProcError> {
        match self.next("reader", call) {
            Some(Outcome::Rows(mut rs, status)) => {
                if let Some(limit) = row_limit {
                    rs.truncate(limit);
                }
                Ok((rs, if capture_status { status } else { None }))
            }
            Some(Outcome::Fail(err)) => Err(err),
            other => Err(unexpected("reader", other)),
        }
    }

    async fn begin_transaction(&mut self) -> Result<(), SqlProcError> {
        self.state.lock().unwrap().begins += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlProcError> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlProcError> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn close(self) -> Result<(), SqlProcError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub fn status(rows_affected: u64, return_value: i64) -> ProcedureStatus {
    ProcedureStatus {
        rows_affected,
        return_value: RowValues::Int(return_value),
        outputs: HashMap::new(),
    }
}

pub fn server_error(number: u32, message: &str) -> SqlProcError {
    SqlProcError::Server {
        number,
        state: 0,
        class: 16,
        message: message.to_string(),
    }
}

pub fn users(rows: &[(i64, &str)]) -> ResultSet {
    ResultSet::from_rows(
        vec!["Id".to_string(), "Name".to_string(), "Active".to_string()],
        rows.iter()
            .map(|(id, name)| {
                vec![
                    RowValues::Int(*id),
                    RowValues::Text((*name).to_string()),
                    RowValues::Bool(true),
                ]
            })
            .collect(),
    )
}

pub fn template(keys: &[&str]) -> Record {
    keys.iter()
        .map(|k| ((*k).to_string(), RowValues::Null))
        .collect()
}
