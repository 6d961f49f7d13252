//! State machine behind the job list view.
//!
//! The controller owns the fetched collection and every piece of view state.
//! Network calls run in spawned tasks and report back as [`Completion`]s on a
//! channel; the owning event loop feeds those to [`ListController::apply`], so
//! all mutation happens in one place, one completion at a time.
//!
//! List fetches are tagged with a sequence number. Only the response to the
//! most recently issued fetch is applied; anything older is dropped no matter
//! when it arrives.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, JobsApi};
use crate::config::Config;
use crate::filter;
use crate::models::{ApplicationStatus, JobApplication};
use crate::notify::{Level, Notification, NotificationId, Notifier};
use crate::paginate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    /// The last fetch failed. The previously loaded collection stays visible.
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("page size must be greater than zero")]
    InvalidPageSize,
    #[error("a change to job {0} is already in progress")]
    MutationInFlight(String),
    #[error("job {0} is not in the current list")]
    UnknownJob(String),
}

/// Result of a background operation, delivered back to the owning loop.
#[derive(Debug)]
pub enum Completion {
    Listed {
        seq: u64,
        result: Result<Vec<JobApplication>, ApiError>,
    },
    Deleted {
        job_id: String,
        result: Result<(), ApiError>,
    },
    StatusChanged {
        job_id: String,
        status: ApplicationStatus,
        result: Result<(), ApiError>,
    },
    NotificationExpired(NotificationId),
}

/// A confirmed mutation, remembered until a fetch issued after it lands.
#[derive(Debug, Clone, Copy)]
enum LocalPatch {
    Deleted,
    Status(ApplicationStatus),
}

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub phase: Phase,
    pub query: String,
    pub status_filter: Option<ApplicationStatus>,
    pub visible: Vec<JobApplication>,
    pub total_matches: usize,
    pub page: usize,
    pub page_count: usize,
    pub page_size: NonZeroUsize,
    pub busy: HashSet<String>,
    pub notifications: Vec<Notification>,
}

impl ViewSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }
}

pub struct ListController<A> {
    api: Arc<A>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,

    phase: Phase,
    initialized: bool,
    jobs: Vec<JobApplication>,

    query: String,
    status_filter: Option<ApplicationStatus>,
    page: usize,
    page_size: NonZeroUsize,
    search_debounce: Duration,

    latest_fetch: Arc<AtomicU64>,
    patches: HashMap<String, (u64, LocalPatch)>,
    in_flight: HashSet<String>,
    notifier: Notifier,
}

impl<A: JobsApi + 'static> ListController<A> {
    pub fn new(api: Arc<A>, config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            tx,
            rx,
            phase: Phase::Idle,
            initialized: false,
            jobs: Vec::new(),
            query: String::new(),
            status_filter: None,
            page: 0,
            page_size: config.page_size,
            search_debounce: config.search_debounce,
            latest_fetch: Arc::new(AtomicU64::new(0)),
            patches: HashMap::new(),
            in_flight: HashSet::new(),
            notifier: Notifier::new(config.notification_ttl),
        }
    }

    /// Issue the first fetch with whatever criteria are already set.
    /// Only the first call does anything.
    pub fn initialize(&mut self) {
        if self.initialized {
            warn!("list view already initialized; ignoring");
            return;
        }
        self.initialized = true;
        self.dispatch_fetch(Duration::ZERO);
    }

    /// Refetch with the current criteria.
    pub fn refresh(&mut self) {
        self.initialized = true;
        self.dispatch_fetch(Duration::ZERO);
    }

    pub fn set_query(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.query {
            return;
        }
        self.query = text;
        self.page = 0;
        if self.initialized {
            self.dispatch_fetch(self.search_debounce);
        }
    }

    pub fn set_status_filter(&mut self, status: Option<ApplicationStatus>) {
        if status == self.status_filter {
            return;
        }
        self.status_filter = status;
        self.page = 0;
        if self.initialized {
            self.dispatch_fetch(Duration::ZERO);
        }
    }

    pub fn set_page(&mut self, index: usize) {
        self.page = index.min(paginate::last_page(self.total_match_count(), self.page_size));
    }

    /// Changing the page size always returns to the first page.
    pub fn set_page_size(&mut self, size: usize) -> Result<(), ControllerError> {
        self.page_size = NonZeroUsize::new(size).ok_or(ControllerError::InvalidPageSize)?;
        self.page = 0;
        Ok(())
    }

    pub fn request_delete(&mut self, job_id: &str) -> Result<(), ControllerError> {
        self.begin_mutation(job_id)?;

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            let result = api.delete_job(&job_id).await;
            let _ = tx.send(Completion::Deleted { job_id, result });
        });
        Ok(())
    }

    /// Ask the server to change a job's status. The local record keeps its
    /// old status until the server confirms.
    pub fn request_status_change(
        &mut self,
        job_id: &str,
        status: ApplicationStatus,
    ) -> Result<(), ControllerError> {
        self.begin_mutation(job_id)?;

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            let result = api.update_status(&job_id, status).await;
            let _ = tx.send(Completion::StatusChanged {
                job_id,
                status,
                result,
            });
        });
        Ok(())
    }

    /// Apply every completion that has already arrived. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it.
    pub async fn process_next(&mut self) {
        if let Some(completion) = self.rx.recv().await {
            self.apply(completion);
        }
    }

    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Listed { seq, result } => self.on_listed(seq, result),
            Completion::Deleted { job_id, result } => self.on_deleted(job_id, result),
            Completion::StatusChanged {
                job_id,
                status,
                result,
            } => self.on_status_changed(job_id, status, result),
            Completion::NotificationExpired(id) => {
                self.notifier.expire(id);
            }
        }
    }

    pub fn dismiss_notification(&mut self, id: NotificationId) -> bool {
        self.notifier.dismiss(id)
    }

    pub fn dismiss_latest_notification(&mut self) -> bool {
        self.notifier.dismiss_latest()
    }

    /// Release every pending notification timer. Call when the view goes away.
    pub fn shutdown(&mut self) {
        self.notifier.clear();
    }

    fn dispatch_fetch(&mut self, debounce: Duration) {
        let seq = self.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1;
        self.phase = Phase::Loading;
        debug!(
            seq,
            query = %self.query,
            status = ?self.status_filter,
            "dispatching job list fetch"
        );

        let api = Arc::clone(&self.api);
        let latest = Arc::clone(&self.latest_fetch);
        let tx = self.tx.clone();
        let query = self.query.clone();
        let status = self.status_filter;
        tokio::spawn(async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
                if latest.load(Ordering::SeqCst) != seq {
                    debug!(seq, "fetch superseded before it was sent");
                    return;
                }
            }
            let result = api.list_jobs(&query, status).await;
            let _ = tx.send(Completion::Listed { seq, result });
        });
    }

    fn begin_mutation(&mut self, job_id: &str) -> Result<(), ControllerError> {
        if !self.jobs.iter().any(|j| j.job_id == job_id) {
            return Err(ControllerError::UnknownJob(job_id.to_string()));
        }
        if !self.in_flight.insert(job_id.to_string()) {
            return Err(ControllerError::MutationInFlight(job_id.to_string()));
        }
        Ok(())
    }

    fn on_listed(&mut self, seq: u64, result: Result<Vec<JobApplication>, ApiError>) {
        let latest = self.latest_fetch.load(Ordering::SeqCst);
        if seq != latest {
            debug!(seq, latest, "discarding stale job list response");
            return;
        }

        match result {
            Ok(mut jobs) => {
                self.reapply_patches(seq, &mut jobs);
                info!(count = jobs.len(), "job list loaded");
                self.jobs = jobs;
                self.phase = Phase::Ready;
            }
            Err(err) => {
                warn!(error = %err, "failed to load job list");
                let message = err.user_message();
                self.phase = Phase::Failed(message.clone());
                self.notify(Level::Error, message, None);
            }
        }
    }

    /// A fetch issued before a mutation was confirmed may predate it on the
    /// server. Re-apply such mutations; forget the ones this fetch already
    /// reflects.
    fn reapply_patches(&mut self, seq: u64, jobs: &mut Vec<JobApplication>) {
        self.patches.retain(|_, (confirmed_at, _)| seq <= *confirmed_at);
        for (job_id, (_, patch)) in &self.patches {
            match patch {
                LocalPatch::Deleted => jobs.retain(|j| &j.job_id != job_id),
                LocalPatch::Status(status) => {
                    if let Some(job) = jobs.iter_mut().find(|j| &j.job_id == job_id) {
                        job.application_status = *status;
                    }
                }
            }
        }
    }

    fn on_deleted(&mut self, job_id: String, result: Result<(), ApiError>) {
        self.in_flight.remove(&job_id);
        match result {
            Ok(()) => {
                self.jobs.retain(|j| j.job_id != job_id);
                self.record_patch(&job_id, LocalPatch::Deleted);
                info!(job_id = %job_id, "job deleted");
                let message = format!("Job with job id {} deleted successfully", job_id);
                self.notify(Level::Success, message, Some(job_id));
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "failed to delete job");
                self.notify(Level::Error, err.user_message(), Some(job_id));
            }
        }
    }

    fn on_status_changed(
        &mut self,
        job_id: String,
        status: ApplicationStatus,
        result: Result<(), ApiError>,
    ) {
        self.in_flight.remove(&job_id);
        match result {
            Ok(()) => {
                if let Some(job) = self.jobs.iter_mut().find(|j| j.job_id == job_id) {
                    job.application_status = status;
                }
                self.record_patch(&job_id, LocalPatch::Status(status));
                info!(job_id = %job_id, status = %status, "job status updated");
                let message = format!("Status of job {} updated to {}", job_id, status);
                self.notify(Level::Success, message, Some(job_id));
            }
            Err(err) => {
                warn!(
                    job_id = %job_id,
                    status = %status,
                    error = %err,
                    "failed to update job status"
                );
                self.notify(Level::Error, err.user_message(), Some(job_id));
            }
        }
    }

    fn record_patch(&mut self, job_id: &str, patch: LocalPatch) {
        let confirmed_at = self.latest_fetch.load(Ordering::SeqCst);
        self.patches.insert(job_id.to_string(), (confirmed_at, patch));
    }

    fn notify(
        &mut self,
        level: Level,
        message: String,
        job_id: Option<String>,
    ) -> NotificationId {
        let tx = self.tx.clone();
        self.notifier.push(level, message, job_id, move |id| {
            let _ = tx.send(Completion::NotificationExpired(id));
        })
    }
}

impl<A> ListController<A> {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status_filter(&self) -> Option<ApplicationStatus> {
        self.status_filter
    }

    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    /// The authoritative collection as last fetched and patched.
    pub fn jobs(&self) -> &[JobApplication] {
        &self.jobs
    }

    pub fn working_set(&self) -> Vec<&JobApplication> {
        filter::working_set(&self.jobs, &self.query, self.status_filter)
    }

    pub fn total_match_count(&self) -> usize {
        self.working_set().len()
    }

    /// Current page index, clamped to the working set.
    pub fn page(&self) -> usize {
        self.page
            .min(paginate::last_page(self.total_match_count(), self.page_size))
    }

    pub fn page_count(&self) -> usize {
        paginate::page_count(self.total_match_count(), self.page_size)
    }

    pub fn visible_records(&self) -> Vec<&JobApplication> {
        let set = self.working_set();
        let page = self.page.min(paginate::last_page(set.len(), self.page_size));
        paginate::window(&set, page, self.page_size).to_vec()
    }

    /// True while a delete or status change for this job awaits the server.
    pub fn is_mutating(&self, job_id: &str) -> bool {
        self.in_flight.contains(job_id)
    }

    pub fn notifications(&self) -> &[Notification] {
        self.notifier.active()
    }

    pub fn pending_timer_count(&self) -> usize {
        self.notifier.pending_timers()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let set = self.working_set();
        let page = self.page.min(paginate::last_page(set.len(), self.page_size));
        ViewSnapshot {
            phase: self.phase.clone(),
            query: self.query.clone(),
            status_filter: self.status_filter,
            visible: paginate::window(&set, page, self.page_size)
                .iter()
                .map(|j| (*j).clone())
                .collect(),
            total_matches: set.len(),
            page,
            page_count: paginate::page_count(set.len(), self.page_size),
            page_size: self.page_size,
            busy: self.in_flight.clone(),
            notifications: self.notifier.active().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;

    use tokio::sync::oneshot;

    use crate::filter::tests::job;
    use crate::models::Analytics;
    use crate::validate::ValidatedJob;

    type Reply<T> = oneshot::Sender<Result<T, ApiError>>;

    struct ListCall {
        search: String,
        status: Option<ApplicationStatus>,
        reply: Reply<Vec<JobApplication>>,
    }

    /// A fake service whose calls block until the test answers them, so the
    /// test decides completion order.
    #[derive(Default)]
    struct ScriptedApi {
        lists: Mutex<VecDeque<ListCall>>,
        deletes: Mutex<VecDeque<(String, Reply<()>)>>,
        status_updates: Mutex<VecDeque<(String, ApplicationStatus, Reply<()>)>>,
    }

    async fn await_reply<T>(rx: oneshot::Receiver<Result<T, ApiError>>) -> Result<T, ApiError> {
        rx.await
            .unwrap_or_else(|_| Err(ApiError::Transport("reply dropped".to_string())))
    }

    impl JobsApi for ScriptedApi {
        fn list_jobs(
            &self,
            search: &str,
            status: Option<ApplicationStatus>,
        ) -> impl Future<Output = Result<Vec<JobApplication>, ApiError>> + Send {
            let (reply, rx) = oneshot::channel();
            self.lists.lock().unwrap().push_back(ListCall {
                search: search.to_string(),
                status,
                reply,
            });
            await_reply(rx)
        }

        fn delete_job(&self, job_id: &str) -> impl Future<Output = Result<(), ApiError>> + Send {
            let (reply, rx) = oneshot::channel();
            self.deletes
                .lock()
                .unwrap()
                .push_back((job_id.to_string(), reply));
            await_reply(rx)
        }

        fn update_status(
            &self,
            job_id: &str,
            status: ApplicationStatus,
        ) -> impl Future<Output = Result<(), ApiError>> + Send {
            let (reply, rx) = oneshot::channel();
            self.status_updates
                .lock()
                .unwrap()
                .push_back((job_id.to_string(), status, reply));
            await_reply(rx)
        }

        async fn job_details(&self, _job_id: &str) -> Result<JobApplication, ApiError> {
            Err(ApiError::Transport("not scripted".to_string()))
        }

        async fn update_job(&self, _job_id: &str, _job: &ValidatedJob) -> Result<(), ApiError> {
            Err(ApiError::Transport("not scripted".to_string()))
        }

        async fn create_job(&self, _job: &ValidatedJob) -> Result<(), ApiError> {
            Err(ApiError::Transport("not scripted".to_string()))
        }

        async fn list_companies(&self) -> Result<Vec<String>, ApiError> {
            Err(ApiError::Transport("not scripted".to_string()))
        }

        async fn analytics(&self) -> Result<Analytics, ApiError> {
            Err(ApiError::Transport("not scripted".to_string()))
        }
    }

    /// Let spawned tasks run until `take` yields something.
    async fn wait_for<T>(mut take: impl FnMut() -> Option<T>) -> T {
        for _ in 0..1000 {
            if let Some(value) = take() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected call never arrived");
    }

    async fn next_list(api: &ScriptedApi) -> ListCall {
        wait_for(|| api.lists.lock().unwrap().pop_front()).await
    }

    async fn next_delete(api: &ScriptedApi) -> (String, Reply<()>) {
        wait_for(|| api.deletes.lock().unwrap().pop_front()).await
    }

    async fn next_status_update(api: &ScriptedApi) -> (String, ApplicationStatus, Reply<()>) {
        wait_for(|| api.status_updates.lock().unwrap().pop_front()).await
    }

    fn config() -> Config {
        Config {
            search_debounce: Duration::ZERO,
            ..Config::default()
        }
    }

    fn acme_jobs() -> Vec<JobApplication> {
        let a = job("A", "Engineer", "Acme", "2024-01-05");
        let mut b = job("B", "Analyst", "Acme", "2024-02-01");
        b.application_status = ApplicationStatus::Rejected;
        vec![a, b]
    }

    fn visible_ids<A>(ctl: &ListController<A>) -> Vec<String> {
        ctl.visible_records()
            .iter()
            .map(|j| j.job_id.clone())
            .collect()
    }

    async fn loaded(jobs: Vec<JobApplication>) -> (Arc<ScriptedApi>, ListController<ScriptedApi>) {
        let api = Arc::new(ScriptedApi::default());
        let mut ctl = ListController::new(Arc::clone(&api), &config());
        ctl.initialize();
        next_list(&api).await.reply.send(Ok(jobs)).unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.phase(), &Phase::Ready);
        (api, ctl)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_loads_and_sorts() {
        let api = Arc::new(ScriptedApi::default());
        let mut ctl = ListController::new(Arc::clone(&api), &config());
        assert_eq!(ctl.phase(), &Phase::Idle);

        ctl.initialize();
        assert!(ctl.is_loading());

        let call = next_list(&api).await;
        assert_eq!(call.search, "");
        assert_eq!(call.status, None);
        call.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;

        assert!(!ctl.is_loading());
        assert_eq!(ctl.error_message(), None);
        assert_eq!(visible_ids(&ctl), ["B", "A"]);
        assert_eq!(ctl.total_match_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_twice_fetches_once() {
        let api = Arc::new(ScriptedApi::default());
        let mut ctl = ListController::new(Arc::clone(&api), &config());
        ctl.initialize();
        ctl.initialize();
        let _first = next_list(&api).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(api.lists.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_fetch_wins_when_earlier_completes_last() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.set_query("eng");
        let first = next_list(&api).await;
        ctl.set_query("ana");
        let second = next_list(&api).await;
        assert_eq!(first.search, "eng");
        assert_eq!(second.search, "ana");

        second
            .reply
            .send(Ok(vec![job("N", "Analyst", "Newco", "2024-03-01")]))
            .unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.phase(), &Phase::Ready);
        assert_eq!(visible_ids(&ctl), ["N"]);

        first
            .reply
            .send(Ok(vec![job("O", "Engineer", "Oldco", "2024-03-02")]))
            .unwrap();
        ctl.process_next().await;
        assert_eq!(visible_ids(&ctl), ["N"]);
        assert_eq!(ctl.jobs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_fetch_completing_first_is_ignored() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.set_status_filter(Some(ApplicationStatus::Applied));
        let first = next_list(&api).await;
        ctl.set_status_filter(Some(ApplicationStatus::Rejected));
        let second = next_list(&api).await;
        assert_eq!(second.status, Some(ApplicationStatus::Rejected));

        first.reply.send(Ok(vec![job("X", "Engineer", "Acme", "2024-01-01")])).unwrap();
        ctl.process_next().await;
        // still waiting on the latest request
        assert!(ctl.is_loading());
        assert_eq!(ctl.jobs().len(), 2);

        second.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        assert_eq!(visible_ids(&ctl), ["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_typing_sends_one_request() {
        let api = Arc::new(ScriptedApi::default());
        let config = Config {
            search_debounce: Duration::from_millis(250),
            ..Config::default()
        };
        let mut ctl = ListController::new(Arc::clone(&api), &config);
        ctl.initialize();
        next_list(&api).await.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;

        ctl.set_query("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctl.set_query("ac");
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctl.set_query("acm");

        let call = next_list(&api).await;
        assert_eq!(call.search, "acm");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(api.lists.lock().unwrap().is_empty());

        call.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.phase(), &Phase::Ready);
        assert_eq!(ctl.total_match_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_delete_removes_record_and_notifies() {
        let (api, mut ctl) = loaded(acme_jobs()).await;
        let before = ctl.total_match_count();

        ctl.request_delete("A").unwrap();
        assert!(ctl.is_mutating("A"));
        let (job_id, reply) = next_delete(&api).await;
        assert_eq!(job_id, "A");
        reply.send(Ok(())).unwrap();
        ctl.process_next().await;

        assert!(!ctl.is_mutating("A"));
        assert_eq!(ctl.total_match_count(), before - 1);
        assert!(ctl.visible_records().iter().all(|j| j.job_id != "A"));
        assert_eq!(ctl.phase(), &Phase::Ready);

        let notes = ctl.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, Level::Success);
        assert_eq!(notes[0].job_id.as_deref(), Some("A"));
        assert_eq!(notes[0].message, "Job with job id A deleted successfully");
        // no refetch for a confirmed delete
        assert!(api.lists.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_keeps_collection() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.request_delete("B").unwrap();
        let (_, reply) = next_delete(&api).await;
        reply
            .send(Err(ApiError::Server {
                status: 404,
                message: Some("Job not found".to_string()),
            }))
            .unwrap();
        ctl.process_next().await;

        assert_eq!(ctl.total_match_count(), 2);
        assert!(!ctl.is_mutating("B"));
        let notes = ctl.notifications();
        assert_eq!(notes[0].level, Level::Error);
        assert_eq!(notes[0].message, "Job not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_change_is_not_optimistic() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.request_status_change("A", ApplicationStatus::TechInterview)
            .unwrap();
        let (job_id, status, reply) = next_status_update(&api).await;
        assert_eq!((job_id.as_str(), status), ("A", ApplicationStatus::TechInterview));

        let status_of_a = |ctl: &ListController<ScriptedApi>| {
            ctl.jobs()
                .iter()
                .find(|j| j.job_id == "A")
                .map(|j| j.application_status)
        };
        assert_eq!(status_of_a(&ctl), Some(ApplicationStatus::Applied));

        reply
            .send(Err(ApiError::Transport("connection reset".to_string())))
            .unwrap();
        ctl.process_next().await;
        assert_eq!(status_of_a(&ctl), Some(ApplicationStatus::Applied));
        assert_eq!(ctl.notifications()[0].level, Level::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_status_change_patches_in_place() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.request_status_change("A", ApplicationStatus::Accepted)
            .unwrap();
        let (_, _, reply) = next_status_update(&api).await;
        reply.send(Ok(())).unwrap();
        ctl.process_next().await;

        let a = ctl.jobs().iter().find(|j| j.job_id == "A").unwrap();
        assert_eq!(a.application_status, ApplicationStatus::Accepted);
        assert_eq!(ctl.phase(), &Phase::Ready);
        assert!(api.lists.lock().unwrap().is_empty());
        assert_eq!(
            ctl.notifications()[0].message,
            "Status of job A updated to Accepted"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_mutation_on_busy_job_is_rejected() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.request_delete("A").unwrap();
        assert_eq!(
            ctl.request_status_change("A", ApplicationStatus::Rejected),
            Err(ControllerError::MutationInFlight("A".to_string()))
        );
        // a different job is independent
        ctl.request_status_change("B", ApplicationStatus::Accepted)
            .unwrap();
        assert_eq!(
            ctl.request_delete("missing"),
            Err(ControllerError::UnknownJob("missing".to_string()))
        );

        let (_, reply) = next_delete(&api).await;
        reply.send(Ok(())).unwrap();
        ctl.process_next().await;
        assert!(!ctl.is_mutating("A"));
        assert!(ctl.is_mutating("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_keeps_previous_records() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.refresh();
        next_list(&api)
            .await
            .reply
            .send(Err(ApiError::Malformed {
                endpoint: "show_jobs".to_string(),
                detail: "missing field `jobs`".to_string(),
            }))
            .unwrap();
        ctl.process_next().await;

        assert!(ctl.error_message().is_some());
        assert_eq!(visible_ids(&ctl), ["B", "A"]);
        assert_eq!(ctl.notifications().len(), 1);

        ctl.refresh();
        next_list(&api).await.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_reports_error() {
        let api = Arc::new(ScriptedApi::default());
        let mut ctl = ListController::new(Arc::clone(&api), &config());
        ctl.initialize();
        next_list(&api)
            .await
            .reply
            .send(Err(ApiError::Server {
                status: 500,
                message: None,
            }))
            .unwrap();
        ctl.process_next().await;

        assert_eq!(ctl.error_message(), Some("Request failed (HTTP 500)"));
        assert!(ctl.visible_records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_listing_does_not_resurrect_deleted_job() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.refresh();
        let pending_fetch = next_list(&api).await;

        ctl.request_delete("A").unwrap();
        let (_, reply) = next_delete(&api).await;
        reply.send(Ok(())).unwrap();
        ctl.process_next().await;

        // the listing was answered before the delete reached the server
        pending_fetch.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        assert_eq!(visible_ids(&ctl), ["B"]);

        // a fetch issued after the delete is taken as-is
        ctl.refresh();
        next_list(&api).await.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        assert_eq!(visible_ids(&ctl), ["B", "A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paging_through_working_set() {
        let (_api, mut ctl) = loaded(acme_jobs()).await;
        ctl.set_query("acme");
        ctl.set_page_size(1).unwrap();

        ctl.set_page(0);
        assert_eq!(visible_ids(&ctl), ["B"]);
        ctl.set_page(1);
        assert_eq!(visible_ids(&ctl), ["A"]);
        assert_eq!(ctl.page_count(), 2);

        ctl.set_page(9);
        assert_eq!(ctl.page(), 1);

        ctl.set_page_size(5).unwrap();
        assert_eq!(ctl.page(), 0);
        assert_eq!(ctl.set_page_size(0), Err(ControllerError::InvalidPageSize));
        assert_eq!(ctl.page_size().get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_clamped_after_delete_shrinks_set() {
        let (api, mut ctl) = loaded(acme_jobs()).await;
        ctl.set_page_size(1).unwrap();
        ctl.set_page(1);
        assert_eq!(visible_ids(&ctl), ["A"]);

        ctl.request_delete("A").unwrap();
        let (_, reply) = next_delete(&api).await;
        reply.send(Ok(())).unwrap();
        ctl.process_next().await;

        assert_eq!(ctl.page(), 0);
        assert_eq!(visible_ids(&ctl), ["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_expire_independently() {
        let (api, mut ctl) = loaded(acme_jobs()).await;

        ctl.request_delete("A").unwrap();
        next_delete(&api).await.1.send(Ok(())).unwrap();
        ctl.process_next().await;
        let first = ctl.notifications()[0].id;

        tokio::time::sleep(Duration::from_secs(3)).await;
        ctl.request_delete("B").unwrap();
        next_delete(&api).await.1.send(Ok(())).unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.notifications().len(), 2);
        let second = ctl.notifications()[1].id;

        // first timer fires at t=5s and clears only its own notification
        ctl.process_next().await;
        assert_eq!(ctl.notifications().len(), 1);
        assert_eq!(ctl.notifications()[0].id, second);
        assert_ne!(first, second);

        assert!(ctl.dismiss_notification(second));
        assert_eq!(ctl.pending_timer_count(), 0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ctl.pump(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_timers() {
        let (api, mut ctl) = loaded(acme_jobs()).await;
        ctl.request_delete("A").unwrap();
        next_delete(&api).await.1.send(Err(ApiError::Transport("down".into()))).unwrap();
        ctl.process_next().await;
        assert_eq!(ctl.pending_timer_count(), 1);

        ctl.shutdown();
        assert_eq!(ctl.pending_timer_count(), 0);
        assert!(ctl.notifications().is_empty());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ctl.pump(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_criteria_set_before_initialize_are_used() {
        let api = Arc::new(ScriptedApi::default());
        let mut ctl = ListController::new(Arc::clone(&api), &config());
        ctl.set_query("acme");
        ctl.set_status_filter(Some(ApplicationStatus::Rejected));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(api.lists.lock().unwrap().is_empty());

        ctl.initialize();
        let call = next_list(&api).await;
        assert_eq!(call.search, "acme");
        assert_eq!(call.status, Some(ApplicationStatus::Rejected));

        call.reply.send(Ok(acme_jobs())).unwrap();
        ctl.process_next().await;
        let snapshot = ctl.snapshot();
        assert_eq!(snapshot.total_matches, 1);
        assert_eq!(snapshot.visible[0].job_id, "B");
        assert!(!snapshot.is_loading());
    }
}
