//! Job scheduling: the initial wordlist job plus recursive jobs promoted from providers

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::dictionary::Dictionary;
use super::mutator::Mutator;
use super::payload::Payload;

/// Label of the job built from the wordlist
pub const WORDLIST_JOB: &str = "wordlist";

/// Named sink that scanners push discovered payloads into.
///
/// Written from worker tasks, drained by the job manager between jobs.
#[derive(Debug, Clone)]
pub struct JobProvider {
    name: Arc<str>,
    queue: Arc<Mutex<VecDeque<Payload>>>,
}

impl JobProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&self, payload: Payload) {
        self.queue.lock().push_back(payload);
    }

    pub fn extend(&self, payloads: impl IntoIterator<Item = Payload>) {
        self.queue.lock().extend(payloads);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn take_all(&self) -> VecDeque<Payload> {
        std::mem::take(&mut *self.queue.lock())
    }
}

/// A labelled batch of payloads
#[derive(Debug)]
pub struct Job {
    pub label: String,
    pub queue: VecDeque<Payload>,
}

/// Outcome of one promotion pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Promotion {
    pub jobs: usize,
    pub promoted: usize,
    pub dropped: usize,
}

/// Runs jobs in FIFO order and promotes provider output to new jobs
#[derive(Debug)]
pub struct JobManager {
    dictionary: Dictionary,
    pending: VecDeque<Job>,
    providers: Vec<JobProvider>,
    max_rlevel: usize,
    current_job: Option<String>,
    total_requests: usize,
}

impl JobManager {
    /// The wordlist job is queued first; the dictionary starts empty until `get_job`
    pub fn new<I, S>(mutator: Arc<Mutator>, wordlist: I, max_rlevel: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pending = VecDeque::new();
        pending.push_back(Job {
            label: WORDLIST_JOB.to_string(),
            queue: wordlist.into_iter().map(Payload::new).collect(),
        });

        Self {
            dictionary: Dictionary::new(mutator, Vec::new()),
            pending,
            providers: Vec::new(),
            max_rlevel,
            current_job: None,
            total_requests: 0,
        }
    }

    pub fn add_provider(&mut self, provider: JobProvider) {
        self.providers.push(provider);
    }

    /// Make the next pending job current. Returns its label, or `None` when nothing is pending.
    pub fn get_job(&mut self) -> Option<&str> {
        let mut job = self.pending.pop_front()?;
        self.dictionary.fill_from_queue(&mut job.queue, true);
        self.total_requests = self.dictionary.len();
        self.current_job = Some(job.label);
        self.current_job.as_deref()
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn has_pending_jobs_from_providers(&self) -> bool {
        self.providers.iter().any(|p| !p.is_empty())
    }

    /// Drain every provider and queue a job for each one with payloads within the recursion limit
    pub fn check_for_new_jobs(&mut self) -> Promotion {
        let mut promotion = Promotion::default();

        for provider in &self.providers {
            let drained = provider.take_all();
            let total = drained.len();
            let queue: VecDeque<Payload> = drained
                .into_iter()
                .filter(|p| p.recursion_level() <= self.max_rlevel)
                .collect();
            promotion.dropped += total - queue.len();

            if queue.is_empty() {
                if total > 0 {
                    tracing::debug!(
                        provider = provider.name(),
                        dropped = total,
                        "Discarded provider payloads beyond recursion limit"
                    );
                }
                continue;
            }

            tracing::info!(
                provider = provider.name(),
                payloads = queue.len(),
                dropped = total - queue.len(),
                "Promoted provider payloads to a new job"
            );
            promotion.jobs += 1;
            promotion.promoted += queue.len();
            self.pending.push_back(Job {
                label: provider.name().to_string(),
                queue,
            });
        }

        promotion
    }

    pub fn current_job(&self) -> Option<&str> {
        self.current_job.as_deref()
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }
}
