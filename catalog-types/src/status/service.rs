use super::{ImportStatusPublished, LineResult, ProcessStatus, ProcessStatusDto};
use crate::Target;
use actix::prelude::*;
use actix_broker::BrokerIssue;
use derive_more::{Display, Error};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct TrackedStatus {
    status: ProcessStatus,
    cancel: CancellationToken,
}

struct SessionEntry {
    created: Instant,
    last_accessed: Instant,
    max_inactive: Option<Duration>,
    statuses: HashMap<Target, TrackedStatus>,
}

impl SessionEntry {
    fn new(max_inactive: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            created: now,
            last_accessed: now,
            max_inactive,
            statuses: HashMap::new(),
        }
    }

    fn has_started(&self) -> bool {
        self.statuses.values().any(|t| t.status.is_started())
    }

    fn expired(&self, now: Instant) -> bool {
        match self.max_inactive {
            Some(max) => now.duration_since(self.last_accessed) > max,
            None => false,
        }
    }
}

/// Cross-session registry of import statuses. Every read-modify-write on the status map
/// goes through this actor's mailbox.
pub struct ProcessStatusService {
    sessions: HashMap<Uuid, SessionEntry>,
    push_interval: Duration,
    max_inactive: Option<Duration>,
}

impl ProcessStatusService {
    pub fn new(push_interval: Duration, max_inactive: Option<Duration>) -> Self {
        Self {
            sessions: HashMap::new(),
            push_interval,
            max_inactive,
        }
    }

    fn session(&mut self, session: Uuid) -> &mut SessionEntry {
        let max_inactive = self.max_inactive;
        let entry = self
            .sessions
            .entry(session)
            .or_insert_with(|| SessionEntry::new(max_inactive));
        entry.last_accessed = Instant::now();
        entry
    }

    fn tracked(
        &mut self,
        session: Uuid,
        target: Target,
        categories: Vec<String>,
    ) -> &mut TrackedStatus {
        self.session(session)
            .statuses
            .entry(target)
            .or_insert_with(|| TrackedStatus {
                status: ProcessStatus::fresh(session, target, categories),
                cancel: CancellationToken::new(),
            })
    }

    fn restart(&mut self, session: Uuid, target: Target, categories: Vec<String>) -> ProcessStatusDto {
        let tracked = self.tracked(session, target, categories.clone());
        if tracked.status.is_started() {
            log::info!("{session} [PUT import] {target}: run in progress, keeping status");
        } else {
            log::info!("{session} [PUT import] {target}: restarted");
            *tracked = TrackedStatus {
                status: ProcessStatus::fresh(session, target, categories),
                cancel: CancellationToken::new(),
            };
        }
        tracked.status.summary()
    }

    fn running_elsewhere(&self, target: &Target) -> Option<Uuid> {
        self.sessions.iter().find_map(|(id, s)| {
            s.statuses
                .get(target)
                .filter(|t| t.status.is_started())
                .map(|_| *id)
        })
    }

    fn publish(&self, status: ProcessStatusDto) {
        let topic = Target::new(status.family, status.destination).topic();
        log::debug!("{} [PUSH {topic}] {status:?}", status.session);
        self.issue_system_async(ImportStatusPublished { topic, status });
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.has_started() || !s.expired(now));
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            log::info!("Evicted {evicted} inactive session(s)");
        }
    }
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl Actor for ProcessStatusService {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.run_interval(SWEEP_INTERVAL, |act, _| act.sweep());
    }
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[display("Import for {target} is already running in session {session}")]
    Concurrent { target: Target, session: Uuid },
}

/// Handle given to the run that was allowed to start.
#[derive(Clone, Debug)]
pub struct RunHandle {
    pub status: ProcessStatusDto,
    pub cancel: CancellationToken,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Touch(pub Uuid);

#[derive(Message)]
#[rtype(result = "ProcessStatusDto")]
pub struct GetStatus {
    pub session: Uuid,
    pub target: Target,
    pub categories: Vec<String>,
}

#[derive(Message)]
#[rtype(result = "ProcessStatusDto")]
pub struct Restart {
    pub session: Uuid,
    pub target: Target,
    pub categories: Vec<String>,
}

#[derive(Message)]
#[rtype(result = "ProcessStatusDto")]
pub struct Abort {
    pub session: Uuid,
    pub target: Target,
    pub categories: Vec<String>,
}

#[derive(Message)]
#[rtype(result = "Result<RunHandle, StartError>")]
pub struct Start {
    pub session: Uuid,
    pub target: Target,
    pub filename: String,
    pub categories: Vec<String>,
}

#[derive(Message)]
#[rtype(result = "LineAck")]
pub struct LineProcessed {
    pub session: Uuid,
    pub target: Target,
    pub result: LineResult,
    pub last_line: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, MessageResponse)]
pub struct LineAck {
    pub aborted: bool,
}

#[derive(Message)]
#[rtype(result = "Option<ProcessStatusDto>")]
pub struct Finish {
    pub session: Uuid,
    pub target: Target,
    pub failure: Option<LineResult>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Sweep;

impl Handler<Touch> for ProcessStatusService {
    type Result = ();

    fn handle(&mut self, Touch(session): Touch, _: &mut Self::Context) -> Self::Result {
        self.session(session);
    }
}

impl Handler<GetStatus> for ProcessStatusService {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, msg: GetStatus, _: &mut Self::Context) -> Self::Result {
        let tracked = self.tracked(msg.session, msg.target, msg.categories);
        MessageResult(tracked.status.summary())
    }
}

impl Handler<Restart> for ProcessStatusService {
    type Result = MessageResult<Restart>;

    fn handle(&mut self, msg: Restart, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.restart(msg.session, msg.target, msg.categories))
    }
}

impl Handler<Abort> for ProcessStatusService {
    type Result = MessageResult<Abort>;

    fn handle(&mut self, msg: Abort, _: &mut Self::Context) -> Self::Result {
        let Abort {
            session,
            target,
            categories,
        } = msg;
        let tracked = self.tracked(session, target, categories.clone());
        if tracked.status.request_abort() {
            log::info!("{session} [DELETE import] {target}: abort requested");
            tracked.cancel.cancel();
            return MessageResult(tracked.status.summary());
        }
        MessageResult(self.restart(session, target, categories))
    }
}

impl Handler<Start> for ProcessStatusService {
    type Result = Result<RunHandle, StartError>;

    fn handle(&mut self, msg: Start, _: &mut Self::Context) -> Self::Result {
        let Start {
            session,
            target,
            filename,
            categories,
        } = msg;
        if let Some(running) = self.running_elsewhere(&target) {
            log::warn!("{session} [POST import] {target}: rejected, running in {running}");
            return Err(StartError::Concurrent {
                target,
                session: running,
            });
        }
        let entry = self.session(session);
        if let Some(max) = entry.max_inactive.as_mut() {
            *max += entry.created.elapsed();
        }
        let tracked = self.tracked(session, target, categories.clone());
        *tracked = TrackedStatus {
            status: ProcessStatus::fresh(session, target, categories),
            cancel: CancellationToken::new(),
        };
        tracked.status.start(filename);
        log::info!("{session} [POST import] {target}: started");
        Ok(RunHandle {
            status: tracked.status.summary(),
            cancel: tracked.cancel.clone(),
        })
    }
}

impl Handler<LineProcessed> for ProcessStatusService {
    type Result = LineAck;

    fn handle(&mut self, msg: LineProcessed, _: &mut Self::Context) -> Self::Result {
        let LineProcessed {
            session,
            target,
            result,
            last_line,
        } = msg;
        let interval = self.push_interval.as_millis() as i64;
        let Some(tracked) = self
            .sessions
            .get_mut(&session)
            .and_then(|s| s.statuses.get_mut(&target))
        else {
            log::warn!("{session} {target}: line result for unknown status");
            return LineAck { aborted: true };
        };
        let aborted = tracked.status.abort_requested;
        let push = tracked.status.record(result, last_line, now_ms(), interval);
        if aborted {
            tracked.cancel.cancel();
        }
        if let Some(push) = push {
            self.publish(push);
        }
        self.session(session);
        LineAck { aborted }
    }
}

impl Handler<Finish> for ProcessStatusService {
    type Result = Option<ProcessStatusDto>;

    fn handle(&mut self, msg: Finish, _: &mut Self::Context) -> Self::Result {
        let Finish {
            session,
            target,
            failure,
        } = msg;
        let tracked = self
            .sessions
            .get_mut(&session)
            .and_then(|s| s.statuses.get_mut(&target))?;
        let push = tracked.status.finish(failure, now_ms());
        log::info!("{session} [import] {target}: {}", tracked.status.state);
        let summary = tracked.status.summary();
        self.publish(push);
        Some(summary)
    }
}

impl Handler<Sweep> for ProcessStatusService {
    type Result = ();

    fn handle(&mut self, _: Sweep, _: &mut Self::Context) -> Self::Result {
        self.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ProcessState;
    use crate::{Destination, Family};

    fn target() -> Target {
        Target::new(Family::Standard, Destination::WooCommerce)
    }

    fn start(session: Uuid) -> Start {
        Start {
            session,
            target: target(),
            filename: "products.csv".to_string(),
            categories: vec!["Product".to_string()],
        }
    }

    #[actix_rt::test]
    async fn second_session_cannot_start_same_target() {
        let addr = ProcessStatusService::new(Duration::from_millis(1000), None).start();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        addr.send(start(a)).await.expect("mailbox").expect("first start");
        let rejected = addr.send(start(b)).await.expect("mailbox");
        assert_eq!(
            rejected.err(),
            Some(StartError::Concurrent {
                target: target(),
                session: a
            })
        );
        let other = Start {
            target: Target::new(Family::Standard, Destination::Ebay),
            ..start(b)
        };
        assert!(addr.send(other).await.expect("mailbox").is_ok());
    }

    #[actix_rt::test]
    async fn finished_run_releases_target() {
        let addr = ProcessStatusService::new(Duration::from_millis(1000), None).start();
        let a = Uuid::new_v4();
        addr.send(start(a)).await.expect("mailbox").expect("start");
        addr.send(LineProcessed {
            session: a,
            target: target(),
            result: LineResult::ok(1, vec![]),
            last_line: true,
        })
        .await
        .expect("mailbox");
        let status = addr
            .send(GetStatus {
                session: a,
                target: target(),
                categories: vec![],
            })
            .await
            .expect("mailbox");
        assert!(status.completed);
        assert!(addr.send(start(Uuid::new_v4())).await.expect("mailbox").is_ok());
    }

    #[actix_rt::test]
    async fn abort_cancels_running_import() {
        let addr = ProcessStatusService::new(Duration::from_millis(1000), None).start();
        let a = Uuid::new_v4();
        let handle = addr.send(start(a)).await.expect("mailbox").expect("start");
        let status = addr
            .send(Abort {
                session: a,
                target: target(),
                categories: vec![],
            })
            .await
            .expect("mailbox");
        assert!(status.aborted);
        assert!(handle.cancel.is_cancelled());
        let ack = addr
            .send(LineProcessed {
                session: a,
                target: target(),
                result: LineResult::ok(1, vec![]),
                last_line: false,
            })
            .await
            .expect("mailbox");
        assert!(ack.aborted);
        let status = addr
            .send(Finish {
                session: a,
                target: target(),
                failure: None,
            })
            .await
            .expect("mailbox")
            .expect("status");
        assert!(status.aborted);
        assert!(!status.started);
        assert_eq!(status.state, ProcessState::Aborted);
    }

    #[actix_rt::test]
    async fn restart_keeps_running_status() {
        let addr = ProcessStatusService::new(Duration::from_millis(1000), None).start();
        let a = Uuid::new_v4();
        addr.send(start(a)).await.expect("mailbox").expect("start");
        let status = addr
            .send(Restart {
                session: a,
                target: target(),
                categories: vec![],
            })
            .await
            .expect("mailbox");
        assert!(status.started);
        addr.send(Finish {
            session: a,
            target: target(),
            failure: None,
        })
        .await
        .expect("mailbox");
        let status = addr
            .send(Restart {
                session: a,
                target: target(),
                categories: vec![],
            })
            .await
            .expect("mailbox");
        assert_eq!(status.state, ProcessState::Idle);
    }

    #[actix_rt::test]
    async fn sweep_never_evicts_running_import() {
        let addr = ProcessStatusService::new(Duration::from_millis(1000), Some(Duration::ZERO))
            .start();
        let running = Uuid::new_v4();
        let idle = Uuid::new_v4();
        addr.send(start(running)).await.expect("mailbox").expect("start");
        addr.send(Touch(idle)).await.expect("mailbox");
        tokio_sleep(5).await;
        addr.send(Sweep).await.expect("mailbox");
        let rejected = addr.send(start(idle)).await.expect("mailbox");
        assert!(rejected.is_err());
    }

    async fn tokio_sleep(ms: u64) {
        actix_rt::time::sleep(Duration::from_millis(ms)).await;
    }
}
