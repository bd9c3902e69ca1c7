//! Payload queue for the job that is currently running

use std::collections::VecDeque;
use std::sync::Arc;

use super::mutator::Mutator;
use super::payload::Payload;

/// Queue of raw entries for the active job.
///
/// Only the producer side of the dispatcher touches a dictionary, so it is
/// plain owned state with no locking.
#[derive(Debug)]
pub struct Dictionary {
    mutator: Arc<Mutator>,
    /// Entries of the active job, kept so the job can be replayed
    wordlist: Vec<Payload>,
    queue: VecDeque<Payload>,
    /// Raw entries loaded for the active job
    entries: usize,
    /// Raw entries not yet dequeued
    remaining: usize,
}

impl Dictionary {
    pub fn new(mutator: Arc<Mutator>, wordlist: Vec<Payload>) -> Self {
        let mut dictionary = Self {
            mutator,
            wordlist,
            queue: VecDeque::new(),
            entries: 0,
            remaining: 0,
        };
        dictionary.reload();
        dictionary
    }

    #[cfg(test)]
    pub fn from_words<I, S>(mutator: Arc<Mutator>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(mutator, words.into_iter().map(Payload::new).collect())
    }

    /// Dequeue one raw entry and return all of its variants
    pub fn next(&mut self) -> Option<Vec<Payload>> {
        let seed = self.queue.pop_front()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(self.mutator.expand(seed))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total variants the active job produces
    pub fn len(&self) -> usize {
        self.entries * self.mutator.fan_out()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Re-populate the queue from the active job's entries
    pub fn reload(&mut self) {
        self.queue = self.wordlist.iter().cloned().collect();
        self.entries = self.wordlist.len();
        self.remaining = self.entries;
    }

    /// Take over the contents of `source`, optionally discarding the current job first
    pub fn fill_from_queue(&mut self, source: &mut VecDeque<Payload>, clear: bool) {
        if clear {
            self.queue.clear();
            self.wordlist.clear();
            self.entries = 0;
            self.remaining = 0;
        }

        for payload in source.drain(..) {
            self.wordlist.push(payload.clone());
            self.queue.push_back(payload);
            self.entries += 1;
            self.remaining += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzer::encoding::{Encoder, PayloadEncoding};
    use crate::fuzzer::mutator::MutationConfig;

    fn fan_out_three() -> Arc<Mutator> {
        let config = MutationConfig::default()
            .with_prefixes(vec!["a".into(), "b".into(), "c".into()])
            .with_encoders(vec![Encoder::new(PayloadEncoding::None)]);
        Arc::new(Mutator::new(config))
    }

    #[test]
    fn test_len_is_entries_times_fan_out() {
        let dictionary = Dictionary::from_words(fan_out_three(), ["x", "y", "z", "w"]);
        assert_eq!(dictionary.len(), 12);
        assert_eq!(dictionary.remaining(), 4);
    }

    #[test]
    fn test_exactly_w_calls_exhaust() {
        let mut dictionary = Dictionary::from_words(fan_out_three(), ["x", "y"]);

        let first = dictionary.next().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(dictionary.remaining(), 1);
        assert!(!dictionary.is_empty());

        dictionary.next().unwrap();
        assert!(dictionary.is_empty());
        assert!(dictionary.next().is_none());
        assert_eq!(dictionary.remaining(), 0);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let mut dictionary = Dictionary::from_words(fan_out_three(), ["x", "y"]);
        dictionary.next();
        dictionary.reload();
        dictionary.reload();

        assert_eq!(dictionary.len(), 6);
        assert_eq!(dictionary.remaining(), 2);
        let mut drained = 0;
        while dictionary.next().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 2);
    }

    #[test]
    fn test_fill_from_queue_clear_and_append() {
        let mut dictionary = Dictionary::from_words(Arc::new(Mutator::default()), ["x"]);

        let mut source: VecDeque<Payload> = ["a", "b"].into_iter().map(Payload::new).collect();
        dictionary.fill_from_queue(&mut source, true);
        assert!(source.is_empty());
        assert_eq!(dictionary.len(), 2);

        let mut more: VecDeque<Payload> = VecDeque::from(vec![Payload::derived("c", 0)]);
        dictionary.fill_from_queue(&mut more, false);
        assert_eq!(dictionary.len(), 3);

        let values: Vec<String> = std::iter::from_fn(|| dictionary.next())
            .flatten()
            .map(|p| p.value().to_string())
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reload_replays_filled_job() {
        let mut dictionary = Dictionary::from_words(Arc::new(Mutator::default()), ["x"]);
        let mut source = VecDeque::from(vec![Payload::derived("dir/a", 0)]);
        dictionary.fill_from_queue(&mut source, true);
        dictionary.next();
        dictionary.reload();

        let replayed = dictionary.next().unwrap();
        assert_eq!(replayed[0].value(), "dir/a");
        assert_eq!(replayed[0].recursion_level(), 1);
    }
}
