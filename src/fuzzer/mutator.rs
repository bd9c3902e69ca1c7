//! Payload mutation pipeline
//!
//! Each raw entry is expanded in a fixed order: prefixes, suffixes, case,
//! encoders. Prefixes, suffixes and encoders are cross products over the
//! current set; the case transform is applied to every variant once.

use super::encoding::Encoder;
use super::payload::{CaseTransform, Mutation, Payload};

/// Immutable description of how a raw entry is expanded
#[derive(Debug, Clone, Default)]
pub struct MutationConfig {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub case: Option<CaseTransform>,
    pub encoders: Vec<Encoder>,
}

impl MutationConfig {
    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes = suffixes;
        self
    }

    pub fn with_case(mut self, case: CaseTransform) -> Self {
        self.case = Some(case);
        self
    }

    pub fn with_encoders(mut self, encoders: Vec<Encoder>) -> Self {
        self.encoders = encoders;
        self
    }
}

/// Expands raw wordlist entries into payload variants
#[derive(Debug, Clone, Default)]
pub struct Mutator {
    config: MutationConfig,
}

impl Mutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    /// Number of variants produced per raw entry
    pub fn fan_out(&self) -> usize {
        self.config.prefixes.len().max(1)
            * self.config.suffixes.len().max(1)
            * self.config.encoders.len().max(1)
    }

    /// Every variant of `seed`; a seed from a provider keeps its recursion level
    pub fn expand(&self, seed: impl Into<Payload>) -> Vec<Payload> {
        let mut set = vec![seed.into()];

        if !self.config.prefixes.is_empty() {
            set = cross(&set, &self.config.prefixes, |p| Mutation::Prefix(p.clone()));
        }

        if !self.config.suffixes.is_empty() {
            set = cross(&set, &self.config.suffixes, |s| Mutation::Suffix(s.clone()));
        }

        if let Some(case) = self.config.case {
            set = set
                .iter()
                .map(|payload| payload.mutate(Mutation::Case(case)))
                .collect();
        }

        if !self.config.encoders.is_empty() {
            set = cross(&set, &self.config.encoders, |e| Mutation::Encode(e.clone()));
        }

        set
    }
}

/// Step-major cross product: all inputs for the first step value, then the next
fn cross<T>(inputs: &[Payload], steps: &[T], make: impl Fn(&T) -> Mutation) -> Vec<Payload> {
    let mut out = Vec::with_capacity(inputs.len() * steps.len());
    for step in steps {
        for payload in inputs {
            out.push(payload.mutate(make(step)));
        }
    }
    out
}
