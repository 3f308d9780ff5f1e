mod decode;
mod encode;

use crate::pprofpb;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TIME_LABEL: &str = "time";

pub type Labels = BTreeMap<String, Vec<String>>;
pub type NumLabels = BTreeMap<String, Vec<i64>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueType {
    pub type_: String,
    pub unit: String,
}

/// Per-tick replacement for a sample's annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelBundle {
    pub label: Labels,
    pub num_label: NumLabels,
    pub num_unit: Labels,
}

/// One sub-interval of a sample. `label_set[i]` belongs to `tick[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakdown {
    pub tick: Vec<i64>,
    pub label_set: Vec<Option<LabelBundle>>,
}

impl Breakdown {
    /// Breakdown whose ticks carry no label bundle.
    pub fn from_ticks(tick: Vec<i64>) -> Self {
        let label_set = vec![None; tick.len()];
        Self { tick, label_set }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    /// Leaf first. Ids of `StackTable::location`.
    pub location_id: Vec<u64>,
    /// Slot 0 is the primary time-like metric.
    pub value: Vec<i64>,
    pub label: Labels,
    pub num_label: NumLabels,
    pub num_unit: Labels,
    pub breakdown: Vec<Breakdown>,
}

/// Location, function and mapping records together with the string table
/// they index. Carried through every rewrite untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackTable {
    pub mapping: Vec<pprofpb::Mapping>,
    pub location: Vec<pprofpb::Location>,
    pub function: Vec<pprofpb::Function>,
    pub string_table: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub sample_type: Vec<ValueType>,
    pub sample: Vec<Sample>,
    pub default_sample_type: String,
    pub period_type: Option<ValueType>,
    pub period: i64,
    pub time_nanos: i64,
    pub duration_nanos: i64,
    pub comments: Vec<String>,
    pub drop_frames: String,
    pub keep_frames: String,
    /// Unit of every breakdown tick, e.g. "nanoseconds".
    pub tick_unit: String,
    /// Profile-wide label bundle table as it appeared on the wire.
    pub label_set: Vec<LabelBundle>,
    pub stacks: Arc<StackTable>,
}

impl Profile {
    pub fn tick_count(&self) -> usize {
        self.sample
            .iter()
            .flat_map(|s| s.breakdown.iter())
            .map(|b| b.tick.len())
            .sum()
    }
}
