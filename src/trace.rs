//! Recorded sensor traces
//!
//! A trace is newline-delimited JSON: sensor samples interleaved with the
//! action markers that open and close a capture.
//!
//! ```text
//! {"type":"sample","stream":"accelerometer","values":[0.1,9.8,0.2],"timestamp":"2024-01-15T14:00:00.010Z"}
//! {"type":"begin_capture"}
//! {"type":"sample","stream":"gyroscope","values":[0.4,-0.1,0.0]}
//! {"type":"end_capture"}
//! ```
//!
//! Replaying a trace through a [`CaptureSession`] yields one feature vector per
//! `end_capture`, exactly as the live ingestion path would.

use crate::capture::CaptureSession;
use crate::error::AuthError;
use crate::types::{FeatureVector, SensorReading, SensorStreamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a recorded trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Sample {
        stream: SensorStreamId,
        values: [f32; 3],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    BeginCapture,
    EndCapture,
}

impl TraceEvent {
    pub fn sample(stream: SensorStreamId, values: [f32; 3]) -> Self {
        TraceEvent::Sample {
            stream,
            values,
            timestamp: None,
        }
    }
}

/// Parse an NDJSON trace, skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TraceEvent>, AuthError> {
    let mut events = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                return Err(AuthError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(events)
}

/// Serialize events back to NDJSON
pub fn to_ndjson(events: &[TraceEvent]) -> Result<String, AuthError> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

/// Feed a trace through `session`, collecting the vector of every capture
pub fn replay(
    events: &[TraceEvent],
    session: &CaptureSession,
) -> Result<Vec<FeatureVector>, AuthError> {
    let mut vectors = Vec::new();
    for event in events {
        match event {
            TraceEvent::Sample {
                stream,
                values,
                timestamp,
            } => session.on_sample(SensorReading {
                stream: *stream,
                values: *values,
                timestamp: *timestamp,
            })?,
            TraceEvent::BeginCapture => session.begin_capture()?,
            TraceEvent::EndCapture => vectors.push(session.end_capture()?),
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TRACE: &str = r#"
{"type":"sample","stream":"accelerometer","values":[1.0,0.0,0.0],"timestamp":"2024-01-15T14:00:00Z"}
{"type":"sample","stream":"accelerometer","values":[3.0,0.0,0.0]}
{"type":"begin_capture"}
{"type":"sample","stream":"gyroscope","values":[0.5,0.5,0.0]}
{"type":"end_capture"}

{"type":"begin_capture"}
{"type":"end_capture"}
"#;

    #[test]
    fn test_parse_and_replay() {
        let events = parse_ndjson(TRACE).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(events[2], TraceEvent::BeginCapture);

        let session = CaptureSession::default();
        let vectors = replay(&events, &session).unwrap();
        assert_eq!(vectors.len(), 2);

        // Accelerometer pre X mean, std, min, max
        assert_eq!(&vectors[0].as_slice()[0..4], &[2.0, 1.0, 1.0, 3.0]);
        // Gyroscope post X mean
        assert_eq!(vectors[0].as_slice()[64], 0.5);
        // Second capture had no samples at all
        assert_eq!(&vectors[1].as_slice()[0..4], &[0.0, 0.0, f32::MAX, 0.0]);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_ndjson("{\"type\":\"begin_capture\"}\n{\"type\":\"jump\"}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_replay_rejects_unbalanced_markers() {
        let events = vec![TraceEvent::EndCapture];
        let session = CaptureSession::default();
        assert!(matches!(
            replay(&events, &session),
            Err(AuthError::PrematureStateTransition { .. })
        ));
    }

    #[test]
    fn test_ndjson_roundtrip() {
        let events = vec![
            TraceEvent::sample(SensorStreamId::Magnetometer, [12.5, -3.0, 40.25]),
            TraceEvent::BeginCapture,
            TraceEvent::EndCapture,
        ];
        let text = to_ndjson(&events).unwrap();
        assert_eq!(parse_ndjson(&text).unwrap(), events);
    }
}
