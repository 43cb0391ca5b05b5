//! Feature vector assembly
//!
//! Turns the pre/post window snapshots of all three streams into the 144-slot
//! vector consumed positionally by the embedding model. Slot layout, per
//! stream in [`SensorStreamId::ALL`] order:
//!
//! ```text
//! pre  : X{mean,std,min,max} Y{..} Z{..} M{..}   16 values
//! post : X{mean,std,min,max} Y{..} Z{..} M{..}   16 values
//! diff : X{mean,std,min,max} Y{..} Z{..} M{..}   16 values (post - pre)
//! ```
//!
//! Enrollment and verification both go through [`FeatureVectorBuilder::build`],
//! so the two paths cannot disagree on ordering.

use crate::stats::{StatSet, StatisticsExtractor};
use crate::types::{
    FeatureVector, Sample, SensorStreamId, FEATURES_PER_STREAM, FEATURE_VECTOR_LEN,
    SAMPLE_COMPONENTS,
};

const PHASE_LABELS: [&str; 3] = ["pre", "post", "diff"];
const COMPONENT_LABELS: [&str; SAMPLE_COMPONENTS] = ["x", "y", "z", "magnitude"];
const STAT_LABELS: [&str; 4] = ["mean", "std_dev", "min", "max"];

/// Window contents of one stream at the end of a capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseSnapshot {
    pub pre: Vec<Sample>,
    pub post: Vec<Sample>,
}

/// Snapshots for every stream, indexed by [`SensorStreamId::index`]
pub type CaptureSnapshot = [PhaseSnapshot; 3];

/// Builder for positional feature vectors
pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    /// Build the full 144-value vector from all three streams
    pub fn build(snapshot: &CaptureSnapshot) -> FeatureVector {
        let mut vector = FeatureVector::zeros();
        for stream in SensorStreamId::ALL {
            let start = stream.index() * FEATURES_PER_STREAM;
            let slots = &mut vector.as_mut_slice()[start..start + FEATURES_PER_STREAM];
            slots.copy_from_slice(&Self::stream_features(&snapshot[stream.index()]));
        }
        vector
    }

    /// The 48 values contributed by one stream
    pub fn stream_features(phases: &PhaseSnapshot) -> [f32; FEATURES_PER_STREAM] {
        let pre = StatisticsExtractor::stat_set(&phases.pre);
        let post = StatisticsExtractor::stat_set(&phases.post);
        let diff = post.diff_from(&pre);

        let mut out = [0.0; FEATURES_PER_STREAM];
        let mut index = 0;
        for stats in [&pre, &post, &diff] {
            index = fill_phase(stats, &mut out, index);
        }
        debug_assert_eq!(index, FEATURES_PER_STREAM);
        out
    }

    /// Human-readable name of a slot, e.g. `gyroscope.post.z.std_dev`
    pub fn layout_label(index: usize) -> Option<String> {
        if index >= FEATURE_VECTOR_LEN {
            return None;
        }
        let stream = SensorStreamId::ALL[index / FEATURES_PER_STREAM];
        let within = index % FEATURES_PER_STREAM;
        let phase = PHASE_LABELS[within / 16];
        let component = COMPONENT_LABELS[(within % 16) / 4];
        let stat = STAT_LABELS[within % 4];
        Some(format!("{}.{phase}.{component}.{stat}", stream.as_str()))
    }
}

fn fill_phase(stats: &StatSet, out: &mut [f32], mut index: usize) -> usize {
    for component in 0..SAMPLE_COMPONENTS {
        for value in stats.component(component) {
            out[index] = value;
            index += 1;
        }
    }
    index
}
