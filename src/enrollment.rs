//! Trial aggregation
//!
//! Enrollment collects a fixed number of trials and averages them once; the
//! verification side keeps a rolling window of recent vectors and averages it
//! after every attempt.

use crate::config::{DEFAULT_AUTHENTICATION_WINDOW, DEFAULT_ENROLLMENT_TRIALS};
use crate::error::AuthError;
use crate::types::{FeatureVector, FEATURE_VECTOR_LEN};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Element-wise mean of a set of feature vectors.
///
/// Sums are accumulated in `f64`: averaging N copies of a vector returns it
/// unchanged, and empty-window sentinels cannot overflow.
pub fn average_vectors<'a, I>(vectors: I) -> Result<FeatureVector, AuthError>
where
    I: IntoIterator<Item = &'a FeatureVector>,
{
    let mut sum = vec![0.0f64; FEATURE_VECTOR_LEN];
    let mut count = 0usize;
    for vector in vectors {
        for (acc, value) in sum.iter_mut().zip(vector.as_slice()) {
            *acc += f64::from(*value);
        }
        count += 1;
    }
    if count == 0 {
        return Err(AuthError::EmptyAggregate);
    }
    let n = count as f64;
    FeatureVector::try_from(sum.into_iter().map(|acc| (acc / n) as f32).collect::<Vec<_>>())
}

/// Lifecycle of one enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Idle,
    Collecting,
    Completed,
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrollmentState::Idle => "idle",
            EnrollmentState::Collecting => "collecting",
            EnrollmentState::Completed => "completed",
        };
        write!(f, "enrollment is {name}")
    }
}

/// Progress reported after each accepted trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollmentProgress {
    pub count: usize,
    pub target: usize,
    pub completed: bool,
}

/// Accumulates enrollment trials: `Idle -> Collecting -> Completed`
#[derive(Debug, Clone)]
pub struct EnrollmentAggregator {
    state: EnrollmentState,
    target: usize,
    trials: Vec<FeatureVector>,
}

impl Default for EnrollmentAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentAggregator {
    pub fn new() -> Self {
        Self {
            state: EnrollmentState::Idle,
            target: 0,
            trials: Vec::new(),
        }
    }

    /// Begin (or restart) collection of `target` trials
    pub fn start(&mut self, target: usize) -> Result<(), AuthError> {
        if target == 0 {
            return Err(AuthError::InvalidConfig(
                "enrollment needs at least one trial".to_string(),
            ));
        }
        self.trials = Vec::with_capacity(target.min(DEFAULT_ENROLLMENT_TRIALS));
        self.target = target;
        self.state = EnrollmentState::Collecting;
        Ok(())
    }

    pub fn add_trial(&mut self, vector: FeatureVector) -> Result<EnrollmentProgress, AuthError> {
        if self.state != EnrollmentState::Collecting {
            return Err(AuthError::PrematureStateTransition {
                operation: "add an enrollment trial",
                state: self.state.to_string(),
            });
        }
        self.trials.push(vector);
        if self.trials.len() >= self.target {
            self.state = EnrollmentState::Completed;
        }
        Ok(self.progress())
    }

    /// Element-wise average of all trials; only valid once completed
    pub fn average(&self) -> Result<FeatureVector, AuthError> {
        if self.state != EnrollmentState::Completed {
            return Err(AuthError::PrematureStateTransition {
                operation: "average enrollment trials",
                state: self.state.to_string(),
            });
        }
        average_vectors(&self.trials)
    }

    /// Abort and discard every collected trial
    pub fn cancel(&mut self) {
        self.trials = Vec::new();
        self.target = 0;
        self.state = EnrollmentState::Idle;
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn progress(&self) -> EnrollmentProgress {
        EnrollmentProgress {
            count: self.trials.len(),
            target: self.target,
            completed: self.state == EnrollmentState::Completed,
        }
    }
}

/// Rolling FIFO of recent verification vectors
#[derive(Debug, Clone)]
pub struct AuthenticationWindow {
    vectors: VecDeque<FeatureVector>,
    capacity: usize,
}

impl AuthenticationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            vectors: VecDeque::with_capacity(capacity.min(DEFAULT_AUTHENTICATION_WINDOW)),
            capacity,
        }
    }

    pub fn push(&mut self, vector: FeatureVector) {
        if self.capacity == 0 {
            return;
        }
        if self.vectors.len() == self.capacity {
            self.vectors.pop_front();
        }
        self.vectors.push_back(vector);
    }

    pub fn average(&self) -> Result<FeatureVector, AuthError> {
        average_vectors(&self.vectors)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }
}
