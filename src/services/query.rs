use std::future::Future;

use crate::cache::QueryKey;
use crate::error::{ApiError, TransitionError};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus<T> {
    Idle,
    Loading,
    Success(T),
    Error(ApiError),
}

impl<T> QueryStatus<T> {
    pub fn name(&self) -> &'static str {
        match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Success(_) => "success",
            QueryStatus::Error(_) => "error",
        }
    }
}

/// One read as the front end observes it: `Idle -> Loading -> Success | Error`.
#[derive(Debug, Clone)]
pub struct Query<T> {
    key: QueryKey,
    status: QueryStatus<T>,
}

impl<T> Query<T> {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// A different key is a different read, so the query restarts from idle.
    pub fn track(&mut self, key: QueryKey) {
        if self.key != key {
            self.key = key;
            self.status = QueryStatus::Idle;
        }
    }

    pub fn status(&self) -> &QueryStatus<T> {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match &self.status {
            QueryStatus::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match &self.status {
            QueryStatus::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.is_loading() {
            return Err(TransitionError::new("loading", "start"));
        }
        self.status = QueryStatus::Loading;
        Ok(())
    }

    /// Only a settled query can be fetched again.
    pub fn refetch(&mut self) -> Result<(), TransitionError> {
        match self.status {
            QueryStatus::Success(_) | QueryStatus::Error(_) => self.start(),
            _ => Err(TransitionError::new(self.status.name(), "refetch")),
        }
    }

    pub fn settle(&mut self, result: Result<T, ApiError>) -> Result<(), TransitionError> {
        if !self.is_loading() {
            return Err(TransitionError::new(self.status.name(), "settle"));
        }
        self.status = match result {
            Ok(data) => QueryStatus::Success(data),
            Err(err) => QueryStatus::Error(err),
        };
        Ok(())
    }

    /// Starts, awaits `fetch` and settles with its outcome.
    pub async fn run<F>(&mut self, fetch: F) -> Result<&QueryStatus<T>, TransitionError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.start()?;
        let result = fetch.await;
        self.settle(result)?;
        Ok(&self.status)
    }
}
