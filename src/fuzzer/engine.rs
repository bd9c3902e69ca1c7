//! Core fuzzer engine with concurrent request handling
//!
//! Each job is dispatched by one producer draining the dictionary into a
//! bounded channel and a fixed pool of workers consuming it. Closing the
//! channel and joining every worker is the barrier between jobs; provider
//! output is only promoted to new jobs after it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::jobs::JobManager;
use super::matcher::{Filter, LegacyBaseline, Matcher};
use super::mutator::Mutator;
use super::payload::Payload;
use super::results::{FuzzResult, FuzzResultSet};
use super::scanners::Scanner;
use super::template::RequestTemplate;
use super::FuzzerStats;
use crate::error::{FuzzError, TransportError};
use crate::http::Transport;

/// Fuzzer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzerState {
    Idle,
    Running,
    /// Stop requested; no new work is handed out
    Stopping,
    Completed,
}

/// Fuzzer configuration
#[derive(Debug, Clone)]
pub struct FuzzerConfig {
    /// Worker pool size
    pub threads: usize,
    /// Delay each worker waits after a request, in milliseconds
    pub delay_ms: u64,
    /// Per-request timeout override in seconds
    pub timeout_secs: Option<u64>,
    /// Index of the first request
    pub index_base: usize,
    /// Deepest recursion level promoted to a job
    pub max_rlevel: usize,
    /// Methods each job is run with; empty means the template's own
    pub methods: Vec<String>,
    /// Proxies rotated by request index
    pub proxies: Vec<String>,
    /// Maximum response body size to keep (bytes)
    pub max_response_size: usize,
    /// Send a baseline request and apply the legacy delta check
    pub legacy_delta: bool,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            delay_ms: 0,
            timeout_secs: None,
            index_base: 1,
            max_rlevel: 0,
            methods: Vec::new(),
            proxies: Vec::new(),
            max_response_size: 10 * 1024 * 1024, // 10MB
            legacy_delta: false,
        }
    }
}

/// Live stream of matched results
pub trait ResultSink: Send + Sync {
    fn on_result(&self, result: &FuzzResult);

    fn on_job_start(&self, _label: &str, _total_requests: usize) {}
}

/// Sink that discards everything
pub struct NullSink;

impl ResultSink for NullSink {
    fn on_result(&self, _result: &FuzzResult) {}
}

/// Context handed to the error callback when a request fails
#[derive(Debug, Clone)]
pub struct RequestFailure {
    pub host: String,
    pub payload: Payload,
    pub index: usize,
    pub error: TransportError,
}

/// What to do after a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Continue,
    Abort,
}

pub type ErrorCallback = Arc<dyn Fn(&RequestFailure) -> ErrorAction + Send + Sync>;

/// Default callback: abort on the first failure, or log and keep going
pub fn error_policy(abort_on_error: bool) -> ErrorCallback {
    Arc::new(move |failure: &RequestFailure| {
        if abort_on_error {
            ErrorAction::Abort
        } else {
            tracing::debug!(index = failure.index, "Skipping failed request");
            ErrorAction::Continue
        }
    })
}

/// How a run ended; results are kept in every case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Aborted(String),
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct FuzzReport {
    /// URL template the run targeted
    pub target: String,
    pub results: FuzzResultSet,
    pub stats: FuzzerStats,
    pub outcome: RunOutcome,
}

#[derive(Debug)]
struct Control {
    state: RwLock<FuzzerState>,
    abort_reason: Mutex<Option<String>>,
}

impl Control {
    fn is_stopping(&self) -> bool {
        *self.state.read() == FuzzerState::Stopping
    }

    fn abort(&self, reason: String) {
        let mut abort_reason = self.abort_reason.lock();
        if abort_reason.is_none() {
            tracing::error!(reason = %reason, "Aborting run");
            *abort_reason = Some(reason);
        }
        *self.state.write() = FuzzerState::Stopping;
    }
}

/// Cloneable handle requesting a graceful stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            control: Arc::new(Control {
                state: RwLock::new(FuzzerState::Idle),
                abort_reason: Mutex::new(None),
            }),
        }
    }

    /// Stop handing out work; in-flight requests finish and are reported
    pub fn stop(&self) {
        let mut state = self.control.state.write();
        if matches!(*state, FuzzerState::Idle | FuzzerState::Running) {
            tracing::warn!("Stop requested, draining in-flight requests");
            *state = FuzzerState::Stopping;
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit on the work queue
struct WorkItem {
    index: usize,
    payload: Payload,
}

/// Shared by every worker of one dispatch
struct WorkerContext {
    job: String,
    template: RequestTemplate,
    transport: Arc<dyn Transport>,
    matcher: Arc<Matcher>,
    filter: Arc<Filter>,
    scanners: Arc<Vec<Arc<dyn Scanner>>>,
    sink: Arc<dyn ResultSink>,
    on_error: ErrorCallback,
    proxies: Arc<Vec<String>>,
    timeout_secs: Option<u64>,
    delay: Duration,
    max_response_size: usize,
    control: Arc<Control>,
    results: Arc<Mutex<FuzzResultSet>>,
    stats: Arc<RwLock<FuzzerStats>>,
}

/// Fuzzer engine
pub struct Fuzzer {
    /// Configuration
    config: FuzzerConfig,
    template: RequestTemplate,
    transport: Arc<dyn Transport>,
    matcher: Matcher,
    filter: Arc<Filter>,
    scanners: Arc<Vec<Arc<dyn Scanner>>>,
    sink: Arc<dyn ResultSink>,
    on_error: ErrorCallback,
    /// Current state
    control: Arc<Control>,
    /// Statistics
    stats: Arc<RwLock<FuzzerStats>>,
}

impl Fuzzer {
    /// Create a new fuzzer
    pub fn new(config: FuzzerConfig, template: RequestTemplate, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            template,
            transport,
            matcher: Matcher::new(),
            filter: Arc::new(Filter::new()),
            scanners: Arc::new(Vec::new()),
            sink: Arc::new(NullSink),
            on_error: error_policy(false),
            control: StopHandle::new().control,
            stats: Arc::new(RwLock::new(FuzzerStats::default())),
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_scanners(mut self, scanners: Vec<Arc<dyn Scanner>>) -> Self {
        self.scanners = Arc::new(scanners);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_error_callback(mut self, on_error: ErrorCallback) -> Self {
        self.on_error = on_error;
        self
    }

    /// Share an externally created stop handle
    pub fn with_stop_handle(mut self, handle: StopHandle) -> Self {
        self.control = handle.control;
        self
    }

    /// Job manager seeded with `wordlist`, with every scanner's provider registered
    pub fn job_manager(&self, mutator: Arc<Mutator>, wordlist: Vec<String>) -> JobManager {
        let mut jobs = JobManager::new(mutator, wordlist, self.config.max_rlevel);
        for scanner in self.scanners.iter() {
            if let Some(provider) = scanner.provider() {
                jobs.add_provider(provider.clone());
            }
        }
        jobs
    }

    /// Run fuzzing attack over a wordlist
    pub async fn run(&self, mutator: Arc<Mutator>, wordlist: Vec<String>) -> Result<FuzzReport, FuzzError> {
        let mut jobs = self.job_manager(mutator, wordlist);
        self.run_jobs(&mut jobs).await
    }

    /// Run every job `jobs` yields, promoting provider output between jobs
    pub async fn run_jobs(&self, jobs: &mut JobManager) -> Result<FuzzReport, FuzzError> {
        // Reset state
        {
            let mut state = self.control.state.write();
            if *state != FuzzerState::Stopping {
                *state = FuzzerState::Running;
            }
            *self.control.abort_reason.lock() = None;
            let mut stats = self.stats.write();
            *stats = FuzzerStats::default();
            stats.start_time = Some(Instant::now());
        }

        let mut matcher = self.matcher.clone();
        if self.config.legacy_delta {
            let baseline = self.baseline().await?;
            tracing::info!(size = baseline.size, time_ms = baseline.time.as_millis() as u64, "Baseline recorded");
            matcher = matcher.with_legacy_baseline(baseline);
        }
        let matcher = Arc::new(matcher);

        let results = Arc::new(Mutex::new(FuzzResultSet::new()));
        let methods: Vec<Option<&str>> = if self.config.methods.is_empty() {
            vec![None]
        } else {
            self.config.methods.iter().map(|m| Some(m.as_str())).collect()
        };
        let mut next_index = self.config.index_base;

        while !self.control.is_stopping() {
            let Some(label) = jobs.get_job().map(str::to_string) else {
                break;
            };
            let total = jobs.total_requests() * methods.len();
            {
                let mut stats = self.stats.write();
                stats.requests_total += total;
                stats.jobs_run += 1;
            }
            tracing::info!(job = %label, total_requests = total, "Starting job");
            self.sink.on_job_start(&label, total);

            for (i, method) in methods.iter().enumerate() {
                if self.control.is_stopping() {
                    break;
                }
                if i > 0 {
                    jobs.dictionary_mut().reload();
                }
                let template = match method {
                    Some(method) => self.template.with_method(method),
                    None => self.template.clone(),
                };
                let context = Arc::new(WorkerContext {
                    job: label.clone(),
                    template,
                    transport: self.transport.clone(),
                    matcher: matcher.clone(),
                    filter: self.filter.clone(),
                    scanners: self.scanners.clone(),
                    sink: self.sink.clone(),
                    on_error: self.on_error.clone(),
                    proxies: Arc::new(self.config.proxies.clone()),
                    timeout_secs: self.config.timeout_secs,
                    delay: Duration::from_millis(self.config.delay_ms),
                    max_response_size: self.config.max_response_size,
                    control: self.control.clone(),
                    results: results.clone(),
                    stats: self.stats.clone(),
                });
                self.dispatch(jobs, context, &mut next_index).await;
            }

            if !self.control.is_stopping() {
                let promotion = jobs.check_for_new_jobs();
                if promotion.jobs > 0 || promotion.dropped > 0 {
                    tracing::info!(
                        jobs = promotion.jobs,
                        promoted = promotion.promoted,
                        dropped = promotion.dropped,
                        "Checked providers for new jobs"
                    );
                }
                let mut stats = self.stats.write();
                stats.promoted += promotion.promoted;
                stats.dropped_beyond_depth += promotion.dropped;
            }
        }

        if jobs.has_pending_jobs() || jobs.has_pending_jobs_from_providers() {
            tracing::warn!("Run ended with unprocessed jobs");
        }

        let outcome = match self.control.abort_reason.lock().take() {
            Some(reason) => RunOutcome::Aborted(reason),
            None if self.control.is_stopping() => RunOutcome::Cancelled,
            None => RunOutcome::Completed,
        };
        *self.control.state.write() = FuzzerState::Completed;

        let stats = {
            let mut stats = self.stats.write();
            stats.refresh();
            stats.clone()
        };
        let results = std::mem::take(&mut *results.lock());
        tracing::info!(
            outcome = ?outcome,
            sent = stats.requests_sent,
            matched = stats.matched,
            filtered = stats.filtered,
            errors = stats.errors,
            progress = format!("{:.0}%", stats.progress() * 100.0),
            "Run finished"
        );

        Ok(FuzzReport {
            target: self.template.url.render("").into_owned(),
            results,
            stats,
            outcome,
        })
    }

    /// Drain the current dictionary through the worker pool and wait for it
    async fn dispatch(&self, jobs: &mut JobManager, context: Arc<WorkerContext>, next_index: &mut usize) {
        let threads = self.config.threads.max(1);
        let (tx, rx) = mpsc::channel::<WorkItem>(threads * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles: Vec<_> = (0..threads)
            .map(|_| tokio::spawn(worker(context.clone(), rx.clone())))
            .collect();

        let dictionary = jobs.dictionary_mut();
        'produce: while !self.control.is_stopping() {
            let Some(variants) = dictionary.next() else {
                break;
            };
            for payload in variants {
                if self.control.is_stopping() {
                    break 'produce;
                }
                let item = WorkItem {
                    index: *next_index,
                    payload,
                };
                *next_index += 1;
                if tx.send(item).await.is_err() {
                    break 'produce;
                }
            }
        }

        drop(tx);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
    }

    /// Send the template with an empty payload
    async fn baseline(&self) -> Result<LegacyBaseline, FuzzError> {
        if self.template.fuzzes_url() {
            tracing::warn!("Legacy delta check is meant for non-URL fuzzing");
        }
        let mut request = self.template.render("");
        request.timeout = self.config.timeout_secs;
        let response = self.transport.send(&request).await?;
        Ok(LegacyBaseline {
            size: response.size(),
            time: response.elapsed,
        })
    }

    /// Get current state
    pub fn state(&self) -> FuzzerState {
        *self.control.state.read()
    }
}

async fn worker(context: Arc<WorkerContext>, queue: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>) {
    loop {
        let item = queue.lock().await.recv().await;
        let Some(item) = item else {
            break;
        };
        // Abandon queued work once stopping
        if context.control.is_stopping() {
            continue;
        }

        context.process(item).await;

        if !context.delay.is_zero() {
            tokio::time::sleep(context.delay).await;
        }
    }
}

impl WorkerContext {
    async fn process(&self, item: WorkItem) {
        let start = Instant::now();
        let mut request = self.template.render(item.payload.value());
        let build_time = start.elapsed();

        if !self.proxies.is_empty() {
            request.proxy = Some(self.proxies[item.index % self.proxies.len()].clone());
        }
        request.timeout = self.timeout_secs;

        let result = FuzzResult::new(item.index, &self.job, &request.method, &request.url)
            .with_payload(&item.payload)
            .with_build_time(build_time);

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(error) => {
                {
                    let mut stats = self.stats.write();
                    stats.errors += 1;
                    stats.record_sent();
                }
                let failure = RequestFailure {
                    host: request.host(),
                    payload: item.payload,
                    index: item.index,
                    error,
                };
                tracing::warn!(
                    host = %failure.host,
                    payload = %failure.payload,
                    index = failure.index,
                    error = %failure.error,
                    "Request failed"
                );
                if (self.on_error)(&failure) == ErrorAction::Abort {
                    self.control
                        .abort(format!("request {} to {} failed: {}", failure.index, failure.host, failure.error));
                }
                self.results.lock().add_failure(result.with_error(failure.error.to_string()));
                return;
            }
        };

        // Rules and scanners see the whole body; only the reported copy is cut
        let mut result = result.with_response(&response);
        self.results.lock().observe(result.status_code);

        if !self.filter.check(&result) {
            let mut stats = self.stats.write();
            stats.filtered += 1;
            stats.record_sent();
            return;
        }
        if !self.matcher.is_match(&result) {
            self.stats.write().record_sent();
            return;
        }

        result.matched = true;
        for scanner in self.scanners.iter() {
            if let Some(found) = scanner.scan(&result, &item.payload) {
                result.scanners_res.insert(scanner.name().to_string(), found);
            }
        }
        result.truncate_body(self.max_response_size);

        self.sink.on_result(&result);
        self.results.lock().add_result(result);

        let mut stats = self.stats.write();
        stats.matched += 1;
        stats.record_sent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzer::scanners::{RecursionScanner, ReflectionScanner};
    use crate::fuzzer::{MutationConfig, DEFAULT_MARKER, WORDLIST_JOB};
    use crate::http::{FuzzRequest, Response};
    use async_trait::async_trait;

    type Responder = Box<dyn Fn(&FuzzRequest) -> Result<Response, TransportError> + Send + Sync>;

    /// Records every request and answers from a closure
    struct MockTransport {
        requests: Mutex<Vec<FuzzRequest>>,
        sent_at: Mutex<Vec<tokio::time::Instant>>,
        respond: Responder,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl MockTransport {
        fn new(respond: impl Fn(&FuzzRequest) -> Result<Response, TransportError> + Send + Sync + 'static) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                sent_at: Mutex::new(Vec::new()),
                respond: Box::new(respond),
                stop_after: None,
            }
        }

        fn ok() -> Self {
            Self::new(|_| Ok(Response::new(200, "ok")))
        }

        fn urls(&self) -> Vec<String> {
            self.requests.lock().iter().map(|r| r.url.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: &FuzzRequest) -> Result<Response, TransportError> {
            self.sent_at.lock().push(tokio::time::Instant::now());
            let sent = {
                let mut requests = self.requests.lock();
                requests.push(request.clone());
                requests.len()
            };
            if let Some((limit, handle)) = &self.stop_after {
                if sent >= *limit {
                    handle.stop();
                }
            }
            (self.respond)(request)
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fuzzer(config: FuzzerConfig, transport: Arc<MockTransport>) -> Fuzzer {
        let template = RequestTemplate::new("http://x/$", "GET", DEFAULT_MARKER);
        Fuzzer::new(config, template, transport)
    }

    #[tokio::test]
    async fn test_two_word_run_end_to_end() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(FuzzerConfig::default(), transport.clone());

        let mut jobs = fuzzer.job_manager(Arc::new(Mutator::default()), words(&["admin", "backup"]));
        let report = fuzzer.run_jobs(&mut jobs).await.unwrap();

        assert_eq!(transport.urls(), vec!["http://x/admin", "http://x/backup"]);
        let indices: Vec<_> = report.results.sorted_by_index().iter().map(|r| r.request_num).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(report.results.results.iter().all(|r| r.job == WORDLIST_JOB));
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.stats.requests_sent, 2);
        assert_eq!(report.stats.requests_total, 2);

        assert!(jobs.dictionary().is_empty());
        assert!(!jobs.has_pending_jobs());
        assert!(!jobs.has_pending_jobs_from_providers());
        assert_eq!(fuzzer.state(), FuzzerState::Completed);
    }

    #[tokio::test]
    async fn test_mutation_variants_dispatch_in_order() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(
            FuzzerConfig {
                index_base: 0,
                ..Default::default()
            },
            transport.clone(),
        );
        let mutator = Mutator::new(MutationConfig::default().with_prefixes(words(&["a-", "b-"])));

        let report = fuzzer.run(Arc::new(mutator), words(&["x", "y"])).await.unwrap();

        assert_eq!(
            transport.urls(),
            vec!["http://x/a-x", "http://x/b-x", "http://x/a-y", "http://x/b-y"]
        );
        assert_eq!(report.results.sorted_by_index()[0].request_num, 0);
        assert_eq!(report.stats.requests_total, 4);
    }

    #[tokio::test]
    async fn test_worker_pool_tags_every_request_once() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(
            FuzzerConfig {
                threads: 4,
                ..Default::default()
            },
            transport.clone(),
        );
        let wordlist: Vec<String> = (0..20).map(|n| n.to_string()).collect();

        let report = fuzzer.run(Arc::new(Mutator::default()), wordlist).await.unwrap();

        let indices: Vec<_> = report.results.sorted_by_index().iter().map(|r| r.request_num).collect();
        assert_eq!(indices, (1..=20).collect::<Vec<_>>());
        assert_eq!(transport.requests.lock().len(), 20);
    }

    #[tokio::test]
    async fn test_recursion_is_bounded_by_max_rlevel() {
        let transport = Arc::new(MockTransport::ok());
        let wordlist = words(&["admin", "index.html"]);
        let recursion: Arc<dyn Scanner> = Arc::new(RecursionScanner::new(Arc::new(wordlist.clone())));
        let fuzzer = fuzzer(
            FuzzerConfig {
                max_rlevel: 1,
                ..Default::default()
            },
            transport.clone(),
        )
        .with_scanners(vec![recursion]);

        let mut jobs = fuzzer.job_manager(Arc::new(Mutator::default()), wordlist);
        let report = fuzzer.run_jobs(&mut jobs).await.unwrap();

        assert_eq!(
            transport.urls(),
            vec![
                "http://x/admin",
                "http://x/index.html",
                "http://x/admin/admin",
                "http://x/admin/index.html",
            ]
        );
        let recursive = report.results.results.iter().filter(|r| r.job == "recursion").count();
        assert_eq!(recursive, 2);
        assert_eq!(report.stats.jobs_run, 2);
        assert_eq!(report.stats.promoted, 2);
        assert_eq!(report.stats.dropped_beyond_depth, 2);
        assert!(report.results.results[0].scanners_res.contains_key("recursion"));
        assert!(!jobs.has_pending_jobs());
        assert!(!jobs.has_pending_jobs_from_providers());
    }

    #[tokio::test]
    async fn test_filter_errors_and_matcher_are_counted() {
        let transport = Arc::new(MockTransport::new(|request| {
            if request.url.ends_with("missing") {
                Ok(Response::new(404, "Not Found"))
            } else if request.url.ends_with("down") {
                Err(TransportError::Connect("refused".into()))
            } else if request.url.ends_with("teapot") {
                Ok(Response::new(418, "short and stout"))
            } else {
                Ok(Response::new(200, "hello"))
            }
        }));
        let fuzzer = fuzzer(FuzzerConfig::default(), transport.clone())
            .with_filter(Filter::new().with_status(404));

        let report = fuzzer
            .run(Arc::new(Mutator::default()), words(&["missing", "down", "ok", "teapot"]))
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.stats.requests_sent, 4);
        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.filtered, 1);
        assert_eq!(report.stats.matched, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results.results[0].payload.value, "ok");
        assert_eq!(report.results.status_distribution[&418], 1);

        assert_eq!(report.results.failures.len(), 1);
        let failure = &report.results.failures[0];
        assert_eq!(failure.payload.value, "down");
        assert_eq!(failure.request_num, 2);
        assert!(failure.error.as_deref().is_some_and(|e| e.contains("refused")));
    }

    #[tokio::test]
    async fn test_rules_see_the_body_past_the_kept_size() {
        let respond = |request: &FuzzRequest| {
            let word = request.url.rsplit('/').next().unwrap_or_default();
            Ok::<_, TransportError>(Response::new(200, format!("{}{}", "x".repeat(100), word)))
        };
        let config = FuzzerConfig {
            max_response_size: 10,
            ..Default::default()
        };
        let reflection: Arc<dyn Scanner> = Arc::new(ReflectionScanner);

        let matching = fuzzer(config.clone(), Arc::new(MockTransport::new(respond)))
            .with_matcher(Matcher::new().with_regex("needle$").unwrap())
            .with_scanners(vec![reflection]);
        let report = matching
            .run(Arc::new(Mutator::default()), words(&["needle", "hay"]))
            .await
            .unwrap();
        assert_eq!(report.stats.matched, 1);
        let kept = &report.results.results[0];
        assert_eq!(kept.payload.value, "needle");
        assert_eq!(kept.response_body.len(), 10);
        assert_eq!(kept.response_length, 106);
        assert!(kept.scanners_res.contains_key("reflection"));

        let filtering = fuzzer(config, Arc::new(MockTransport::new(respond)))
            .with_filter(Filter::new().with_regex("needle").unwrap());
        let report = filtering
            .run(Arc::new(Mutator::default()), words(&["needle", "hay"]))
            .await
            .unwrap();
        assert_eq!(report.stats.filtered, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results.results[0].payload.value, "hay");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_follows_each_request() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(
            FuzzerConfig {
                delay_ms: 100,
                ..Default::default()
            },
            transport.clone(),
        );

        let start = tokio::time::Instant::now();
        fuzzer.run(Arc::new(Mutator::default()), words(&["a", "b", "c"])).await.unwrap();
        let elapsed = start.elapsed();

        let sent_at = transport.sent_at.lock().clone();
        assert_eq!(sent_at.len(), 3);
        // No wait before the first request
        assert!(sent_at[0] - start < Duration::from_millis(100));
        for pair in sent_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_error_callback_can_abort() {
        let transport = Arc::new(MockTransport::new(|_| Err(TransportError::Timeout(1000))));
        let fuzzer = fuzzer(FuzzerConfig::default(), transport.clone()).with_error_callback(error_policy(true));

        let report = fuzzer
            .run(Arc::new(Mutator::default()), words(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        assert!(matches!(report.outcome, RunOutcome::Aborted(ref reason) if reason.contains("request 1")));
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_error_callback_receives_context() {
        let transport = Arc::new(MockTransport::new(|_| Err(TransportError::Connect("refused".into()))));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ErrorCallback = Arc::new(move |failure: &RequestFailure| {
            sink.lock().push((failure.host.clone(), failure.payload.value().to_string()));
            ErrorAction::Continue
        });
        let fuzzer = fuzzer(FuzzerConfig::default(), transport).with_error_callback(callback);

        let report = fuzzer.run(Arc::new(Mutator::default()), words(&["a", "b"])).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(
            *seen.lock(),
            vec![("x".to_string(), "a".to_string()), ("x".to_string(), "b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stop_keeps_partial_results() {
        let stop = StopHandle::new();
        let transport = Arc::new(MockTransport {
            stop_after: Some((2, stop.clone())),
            ..MockTransport::ok()
        });
        let fuzzer = fuzzer(FuzzerConfig::default(), transport.clone()).with_stop_handle(stop);

        let report = fuzzer
            .run(Arc::new(Mutator::default()), words(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(transport.requests.lock().len(), 2);
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_methods_reload_the_dictionary() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(
            FuzzerConfig {
                methods: words(&["GET", "post"]),
                ..Default::default()
            },
            transport.clone(),
        );

        let report = fuzzer.run(Arc::new(Mutator::default()), words(&["a", "b"])).await.unwrap();

        let sent: Vec<_> = transport
            .requests
            .lock()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect();
        assert_eq!(
            sent,
            vec!["GET http://x/a", "GET http://x/b", "POST http://x/a", "POST http://x/b"]
        );
        assert_eq!(report.stats.requests_total, 4);
        assert_eq!(report.results.sorted_by_index().last().unwrap().request_num, 4);
    }

    #[tokio::test]
    async fn test_proxies_rotate_by_index() {
        let transport = Arc::new(MockTransport::ok());
        let fuzzer = fuzzer(
            FuzzerConfig {
                index_base: 0,
                proxies: words(&["http://p1:8080", "http://p2:8080"]),
                ..Default::default()
            },
            transport.clone(),
        );

        fuzzer.run(Arc::new(Mutator::default()), words(&["a", "b", "c"])).await.unwrap();

        let proxies: Vec<_> = transport.requests.lock().iter().map(|r| r.proxy.clone().unwrap()).collect();
        assert_eq!(proxies, vec!["http://p1:8080", "http://p2:8080", "http://p1:8080"]);
    }

    #[tokio::test]
    async fn test_legacy_delta_sends_baseline_first() {
        let transport = Arc::new(MockTransport::new(|request| {
            let body = if request.params[0].1 == "long" { "x".repeat(500) } else { "base".to_string() };
            Ok(Response::new(200, body))
        }));
        let template = RequestTemplate::new("http://x/login", "POST", DEFAULT_MARKER).with_param("user", "");
        let fuzzer = Fuzzer::new(
            FuzzerConfig {
                legacy_delta: true,
                ..Default::default()
            },
            template,
            transport.clone(),
        );

        let report = fuzzer.run(Arc::new(Mutator::default()), words(&["short", "long"])).await.unwrap();

        assert_eq!(transport.requests.lock()[0].params[0].1, "");
        assert_eq!(transport.requests.lock().len(), 3);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results.results[0].payload.value, "long");
    }
}
