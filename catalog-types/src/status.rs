use crate::{Destination, ErrorCode, Family, ImportLineError, Target};
use actix::prelude::*;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod service;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Idle,
    Started,
    Completed,
    Aborted,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LineResult {
    pub line: usize,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Natural keys of the nodes produced by the line
    pub keys: Vec<String>,
}

impl LineResult {
    pub fn ok(line: usize, keys: Vec<String>) -> Self {
        Self {
            line,
            severity: Severity::Info,
            code: None,
            message: None,
            keys,
        }
    }

    pub fn line_error(line: usize, err: &ImportLineError) -> Self {
        Self {
            line,
            severity: Severity::Error,
            code: Some(err.code),
            message: Some(err.message.clone()),
            keys: vec![],
        }
    }

    pub fn run_error<S: ToString>(line: usize, message: S) -> Self {
        Self {
            line,
            severity: Severity::Error,
            code: None,
            message: Some(message.to_string()),
            keys: vec![],
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Progress of one import run, per (session, family, destination).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessStatus {
    pub session: Uuid,
    pub target: Target,
    pub state: ProcessState,
    /// Set by an abort request, observed by the run at its next line boundary
    pub abort_requested: bool,
    pub filename: Option<String>,
    pub categories: Vec<String>,
    pub results: Vec<LineResult>,
    /// High-water mark of `results` already pushed
    pub lines_sent: usize,
    /// Milliseconds since epoch of the last push
    pub timestamp: Option<i64>,
}

impl ProcessStatus {
    pub fn fresh(session: Uuid, target: Target, categories: Vec<String>) -> Self {
        Self {
            session,
            target,
            state: ProcessState::Idle,
            abort_requested: false,
            filename: None,
            categories,
            results: vec![],
            lines_sent: 0,
            timestamp: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state == ProcessState::Started
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ProcessState::Completed | ProcessState::Aborted)
    }

    pub fn start(&mut self, filename: String) {
        self.state = ProcessState::Started;
        self.abort_requested = false;
        self.filename = Some(filename);
        self.results.clear();
        self.lines_sent = 0;
        self.timestamp = None;
    }

    /// Returns false when nothing is running.
    pub fn request_abort(&mut self) -> bool {
        if self.is_started() {
            self.abort_requested = true;
            true
        } else {
            false
        }
    }

    /// Appends a line result and moves the state forward. Returns the payload to push, if any.
    pub fn record(
        &mut self,
        result: LineResult,
        last_line: bool,
        now_ms: i64,
        interval_ms: i64,
    ) -> Option<ProcessStatusDto> {
        self.results.push(result);
        if self.abort_requested {
            self.state = ProcessState::Aborted;
        } else if last_line {
            self.state = ProcessState::Completed;
        }
        let due = self.timestamp.map_or(true, |t| now_ms - t > interval_ms);
        if due || self.is_finished() {
            Some(self.take_unsent(now_ms))
        } else {
            None
        }
    }

    /// Terminal transition after the run stopped. Always yields a push payload.
    pub fn finish(&mut self, failure: Option<LineResult>, now_ms: i64) -> ProcessStatusDto {
        if let Some(failure) = failure {
            self.results.push(failure);
            self.state = ProcessState::Aborted;
        } else if self.is_started() {
            self.state = if self.abort_requested {
                ProcessState::Aborted
            } else {
                ProcessState::Completed
            };
        }
        self.take_unsent(now_ms)
    }

    fn take_unsent(&mut self, now_ms: i64) -> ProcessStatusDto {
        let from = self.lines_sent.min(self.results.len());
        let slice = self.results[from..].to_vec();
        self.lines_sent = self.results.len();
        self.timestamp = Some(now_ms);
        self.to_dto(Some(slice))
    }

    /// Status without the bulk result payload.
    pub fn summary(&self) -> ProcessStatusDto {
        self.to_dto(None)
    }

    fn to_dto(&self, results: Option<Vec<LineResult>>) -> ProcessStatusDto {
        ProcessStatusDto {
            session: self.session,
            family: self.target.family,
            destination: self.target.destination,
            state: self.state,
            started: self.is_started(),
            completed: self.state == ProcessState::Completed,
            aborted: self.state == ProcessState::Aborted || self.abort_requested,
            filename: self.filename.clone(),
            categories: self.categories.clone(),
            results,
            lines_sent: self.lines_sent,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProcessStatusDto {
    pub session: Uuid,
    pub family: Family,
    pub destination: Destination,
    pub state: ProcessState,
    pub started: bool,
    pub completed: bool,
    pub aborted: bool,
    pub filename: Option<String>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub results: Option<Vec<LineResult>>,
    pub lines_sent: usize,
    pub timestamp: Option<i64>,
}

/// Issued on the system broker each time a status push is due.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct ImportStatusPublished {
    pub topic: String,
    pub status: ProcessStatusDto,
}
