//! Pipeline orchestration
//!
//! [`Authenticator`] is the stateful entry point. It owns the capture session,
//! the enrollment aggregator and the verification window, and drives the
//! embedding model and credential store at the right moments:
//!
//! 1. Enrollment: capture → trial → (repeat) → average → clamp → infer → save
//! 2. Verification: capture → window → average → clamp → infer → load → distance
//!
//! Errors from the model and the store are returned as-is; nothing is retried
//! and no default embedding is ever substituted.

use crate::capture::CaptureSession;
use crate::config::AuthConfig;
use crate::credential::CredentialStore;
use crate::embedding::EmbeddingClient;
use crate::enrollment::{
    AuthenticationWindow, EnrollmentAggregator, EnrollmentProgress, EnrollmentState,
};
use crate::error::AuthError;
use crate::features::FeatureVectorBuilder;
use crate::matcher::{self, MatchDecision, MatchScore};
use crate::types::{Embedding, FeatureVector};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one verification attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub score: MatchScore,
    /// Present only when a decision threshold is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<MatchDecision>,
    /// Number of vectors averaged for this attempt
    pub window_len: usize,
}

/// Stateful enrollment and verification driver
pub struct Authenticator<E, S> {
    config: AuthConfig,
    session: Arc<CaptureSession>,
    enrollment: EnrollmentAggregator,
    window: AuthenticationWindow,
    embedder: E,
    store: S,
}

impl<E: EmbeddingClient, S: CredentialStore> Authenticator<E, S> {
    /// Create an authenticator with default configuration
    pub fn new(embedder: E, store: S) -> Self {
        let config = AuthConfig::default();
        Self::build(config, embedder, store)
    }

    /// Create an authenticator from a validated configuration
    pub fn with_config(config: AuthConfig, embedder: E, store: S) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self::build(config, embedder, store))
    }

    fn build(config: AuthConfig, embedder: E, store: S) -> Self {
        Self {
            session: Arc::new(CaptureSession::new(&config)),
            enrollment: EnrollmentAggregator::new(),
            window: AuthenticationWindow::new(config.authentication_window),
            config,
            embedder,
            store,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Shared handle for sensor producers
    pub fn session(&self) -> Arc<CaptureSession> {
        Arc::clone(&self.session)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Enrollment
    // ------------------------------------------------------------------

    /// Start (or restart) enrollment, discarding any partial trials
    pub fn start_enrollment(&mut self) -> Result<(), AuthError> {
        self.enrollment.start(self.config.enrollment_trials)?;
        info!(target = self.config.enrollment_trials, "enrollment started");
        Ok(())
    }

    pub fn cancel_enrollment(&mut self) {
        self.enrollment.cancel();
        self.session.reset();
        info!("enrollment cancelled");
    }

    pub fn enrollment_state(&self) -> EnrollmentState {
        self.enrollment.state()
    }

    pub fn enrollment_progress(&self) -> EnrollmentProgress {
        self.enrollment.progress()
    }

    /// Mark the start of a user action
    pub fn begin_action(&self) -> Result<(), AuthError> {
        self.session.begin_capture()
    }

    /// Close the current action and record it as an enrollment trial
    pub fn capture_enrollment_trial(&mut self) -> Result<EnrollmentProgress, AuthError> {
        if self.enrollment.state() != EnrollmentState::Collecting {
            return Err(AuthError::PrematureStateTransition {
                operation: "capture an enrollment trial",
                state: self.enrollment.state().to_string(),
            });
        }
        let vector = self.session.end_capture()?;
        self.add_enrollment_trial(vector)
    }

    /// Record an already-built vector as an enrollment trial
    pub fn add_enrollment_trial(
        &mut self,
        vector: FeatureVector,
    ) -> Result<EnrollmentProgress, AuthError> {
        log_vector("enrollment trial", &vector);
        let progress = self.enrollment.add_trial(vector)?;
        info!(
            count = progress.count,
            target = progress.target,
            "enrollment step completed"
        );
        Ok(progress)
    }

    /// Average the completed trials, embed them and persist the result
    pub fn finish_enrollment(&mut self) -> Result<Embedding, AuthError> {
        let average = self.enrollment.average()?;
        let embedding = self.embed(&average)?;
        self.store.save(&embedding)?;
        self.enrollment.cancel();
        self.window.clear();
        info!(dimension = embedding.dimension(), "enrollment completed");
        Ok(embedding)
    }

    /// One-shot enrollment from prebuilt trial vectors
    pub fn enroll(&mut self, trials: &[FeatureVector]) -> Result<Embedding, AuthError> {
        if trials.len() != self.config.enrollment_trials {
            return Err(AuthError::PrematureStateTransition {
                operation: "finish enrollment",
                state: format!(
                    "{} of {} trials were supplied",
                    trials.len(),
                    self.config.enrollment_trials
                ),
            });
        }
        self.start_enrollment()?;
        for trial in trials {
            self.add_enrollment_trial(trial.clone())?;
        }
        self.finish_enrollment()
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Close the current action and score it against the enrolled embedding
    pub fn capture_verification(&mut self) -> Result<VerificationOutcome, AuthError> {
        let vector = self.session.end_capture()?;
        self.verify(vector)
    }

    /// Score a prebuilt vector against the enrolled embedding.
    ///
    /// The window average including `vector` is what gets embedded. The vector
    /// is kept in the rolling window only if scoring succeeds.
    pub fn verify(&mut self, vector: FeatureVector) -> Result<VerificationOutcome, AuthError> {
        log_vector("verification attempt", &vector);
        let mut candidate = self.window.clone();
        candidate.push(vector);
        let average = candidate.average()?;
        let fresh = self.embed(&average)?;
        let enrolled = self.store.load()?.ok_or(AuthError::NotEnrolled)?;
        let score = MatchScore::between(&enrolled, &fresh)?;
        let decision = self.config.decision_threshold.map(|t| score.decide(t));
        self.window = candidate;

        info!(
            distance = score.distance,
            window = self.window.len(),
            decision = ?decision,
            "verification scored"
        );
        Ok(VerificationOutcome {
            score,
            decision,
            window_len: self.window.len(),
        })
    }

    /// Forget previous verification attempts
    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Clamp and embed a feature vector the same way on both paths
    pub fn embed(&self, features: &FeatureVector) -> Result<Embedding, AuthError> {
        let clamped = matcher::clamp(features, self.config.clamp_min, self.config.clamp_max);
        Ok(self.embedder.infer(&clamped)?)
    }
}

fn log_vector(context: &str, vector: &FeatureVector) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        debug!(context, len = vector.len(), "feature vector built");
        return;
    }
    for (i, value) in vector.as_slice().iter().enumerate() {
        let label = FeatureVectorBuilder::layout_label(i).unwrap_or_default();
        tracing::trace!(context, slot = i, label = %label, value, "feature");
    }
}
