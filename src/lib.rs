//! cauth-core - Continuous behavioural authentication from motion sensors
//!
//! Accelerometer, gyroscope and magnetometer readings around a user action are
//! condensed into a fixed 144-value feature vector: per-stream statistics of
//! the samples before the action, after it, and their difference. Vectors are
//! averaged into an enrollment, embedded by a pluggable model, and compared by
//! Euclidean distance at verification time.
//!
//! ## Modules
//!
//! - **Capture**: bounded per-stream sample windows split at the action
//! - **Features**: statistics extraction and the 144-value layout
//! - **Enrollment**: trial aggregation and the rolling verification window
//! - **Matching**: clamping, embedding and distance scoring

pub mod capture;
pub mod config;
pub mod credential;
pub mod embedding;
pub mod enrollment;
pub mod error;
pub mod features;
pub mod matcher;
pub mod pipeline;
pub mod stats;
pub mod trace;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use capture::{CaptureSession, SensorSender};
pub use config::AuthConfig;
pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use embedding::{EmbeddingClient, LinearEmbedding};
pub use error::{AuthError, InferenceError, StorageError};
pub use features::FeatureVectorBuilder;
pub use matcher::{MatchDecision, MatchScore};
pub use pipeline::{Authenticator, VerificationOutcome};
pub use types::{Embedding, FeatureVector, SensorReading, SensorStreamId, FEATURE_VECTOR_LEN};

/// Library version reported by the CLI and FFI
pub const CAUTH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "cauth-core";
