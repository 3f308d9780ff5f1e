use super::{Breakdown, LabelBundle, Labels, NumLabels, Profile, Sample, StackTable, ValueType};
use crate::pprofpb;
use anyhow::{bail, Context};
use flate2::read::GzDecoder;
use prost::Message;
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

fn check_string(what: &str, idx: i64, string_table_len: usize) -> anyhow::Result<()> {
    if idx < 0 || idx as usize >= string_table_len {
        bail!(
            "{} string index {} out of bounds (string table has {} entries)",
            what,
            idx,
            string_table_len
        );
    }
    Ok(())
}

fn check_labels(what: &str, labels: &[pprofpb::Label], string_table_len: usize) -> anyhow::Result<()> {
    for (j, label) in labels.iter().enumerate() {
        if label.key == 0 {
            bail!("{} has label key 0 at index {}. it must be non zero.", what, j);
        }
        check_string(what, label.key, string_table_len)?;
        check_string(what, label.str, string_table_len)?;
        check_string(what, label.num_unit, string_table_len)?;
    }
    Ok(())
}

pub fn validate_pprof_profile(profile: &pprofpb::Profile) -> anyhow::Result<()> {
    if let Some(elem) = profile.string_table.first() {
        if !elem.is_empty() {
            bail!("first string table element is expected to be empty");
        }
    }

    let string_table_len = profile.string_table.len().max(1);

    for vt in profile.sample_type.iter().chain(profile.period_type.iter()) {
        check_string("value type", vt.r#type, string_table_len)?;
        check_string("value type", vt.unit, string_table_len)?;
    }
    for idx in profile.comment.iter() {
        check_string("comment", *idx, string_table_len)?;
    }
    check_string("drop_frames", profile.drop_frames, string_table_len)?;
    check_string("keep_frames", profile.keep_frames, string_table_len)?;
    check_string("default_sample_type", profile.default_sample_type, string_table_len)?;
    check_string("tick_unit", profile.tick_unit, string_table_len)?;

    for m in profile.mapping.iter() {
        check_string("mapping filename", m.filename, string_table_len)?;
        check_string("mapping build_id", m.build_id, string_table_len)?;
    }
    for f in profile.function.iter() {
        check_string("function name", f.name, string_table_len)?;
        check_string("function system_name", f.system_name, string_table_len)?;
        check_string("function filename", f.filename, string_table_len)?;
    }

    for (i, set) in profile.label_set.iter().enumerate() {
        check_labels(&format!("label set {}", i + 1), &set.label, string_table_len)?;
    }

    let location_ids: HashSet<u64> = profile.location.iter().map(|l| l.id).collect();

    if profile.sample_type.is_empty() && !profile.sample.is_empty() {
        bail!("profile has samples but no sample_type");
    }

    for (i, sample) in profile.sample.iter().enumerate() {
        if sample.value.len() != profile.sample_type.len() {
            bail!(
                "sample {} has {} values, expected {}",
                i,
                sample.value.len(),
                profile.sample_type.len()
            );
        }

        for (j, location) in sample.location_id.iter().enumerate() {
            if !location_ids.contains(location) {
                bail!(
                    "sample {} has unknown location_id {} at index {}",
                    i,
                    location,
                    j
                );
            }
        }

        check_labels(&format!("sample {}", i), &sample.label, string_table_len)?;

        for (j, breakdown) in sample.breakdown.iter().enumerate() {
            if !breakdown.label_set_id.is_empty()
                && breakdown.label_set_id.len() != breakdown.tick.len()
            {
                bail!(
                    "sample {} breakdown {} has {} ticks but {} label sets",
                    i,
                    j,
                    breakdown.tick.len(),
                    breakdown.label_set_id.len()
                );
            }
            for id in breakdown.label_set_id.iter() {
                if *id > profile.label_set.len() as u64 {
                    bail!(
                        "sample {} breakdown {} references label set {}, profile has {}",
                        i,
                        j,
                        id,
                        profile.label_set.len()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Resolves wire labels into key -> values maps. Numeric units are padded
/// with "" so that they line up with their values.
fn labels_from_wire(
    string_table: &[String],
    plabels: &[pprofpb::Label],
) -> (Labels, NumLabels, Labels) {
    let s = |idx: i64| string_table.get(idx as usize).cloned().unwrap_or_default();

    let mut labels = Labels::new();
    let mut num_labels = NumLabels::new();
    let mut num_units = Labels::new();

    for label in plabels.iter() {
        let key = s(label.key);
        if label.str != 0 {
            labels.entry(key).or_default().push(s(label.str));
            continue;
        }

        let values = num_labels.entry(key.clone()).or_default();
        values.push(label.num);
        if label.num_unit != 0 {
            let units = num_units.entry(key).or_default();
            units.resize(values.len() - 1, String::new());
            units.push(s(label.num_unit));
        }
    }

    for (key, units) in num_units.iter_mut() {
        if let Some(values) = num_labels.get(key) {
            units.resize(values.len(), String::new());
        }
    }

    (labels, num_labels, num_units)
}

fn bundle_from_wire(string_table: &[String], set: &pprofpb::LabelSet) -> LabelBundle {
    let (label, num_label, num_unit) = labels_from_wire(string_table, &set.label);
    LabelBundle {
        label,
        num_label,
        num_unit,
    }
}

impl Profile {
    /// Parses a pprof profile, gzipped or not.
    pub fn parse(data: &[u8]) -> anyhow::Result<Profile> {
        let mut decompressed = Vec::new();
        let raw = if is_gzip(data) {
            let mut decoder = GzDecoder::new(data);
            decoder
                .read_to_end(&mut decompressed)
                .context("Failed to decompress gzip")?;
            decompressed.as_slice()
        } else {
            data
        };

        let p = pprofpb::Profile::decode(raw).context("Failed to decode profile")?;
        validate_pprof_profile(&p)?;
        Ok(Self::from_wire(p))
    }

    /// Builds the model from a validated wire profile.
    fn from_wire(p: pprofpb::Profile) -> Profile {
        let st = p.string_table.as_slice();
        let s = |idx: i64| st.get(idx as usize).cloned().unwrap_or_default();
        let vt = |v: &pprofpb::ValueType| ValueType {
            type_: s(v.r#type),
            unit: s(v.unit),
        };

        let label_set: Vec<LabelBundle> = p
            .label_set
            .iter()
            .map(|set| bundle_from_wire(st, set))
            .collect();

        let sample = p
            .sample
            .iter()
            .map(|ps| {
                let (label, num_label, num_unit) = labels_from_wire(st, &ps.label);
                let breakdown = ps
                    .breakdown
                    .iter()
                    .map(|b| {
                        if b.label_set_id.is_empty() {
                            return Breakdown::from_ticks(b.tick.clone());
                        }
                        Breakdown {
                            tick: b.tick.clone(),
                            label_set: b
                                .label_set_id
                                .iter()
                                .map(|id| match *id {
                                    0 => None,
                                    id => label_set.get(id as usize - 1).cloned(),
                                })
                                .collect(),
                        }
                    })
                    .collect();

                Sample {
                    location_id: ps.location_id.clone(),
                    value: ps.value.clone(),
                    label,
                    num_label,
                    num_unit,
                    breakdown,
                }
            })
            .collect();

        Profile {
            sample_type: p.sample_type.iter().map(vt).collect(),
            sample,
            default_sample_type: s(p.default_sample_type),
            period_type: p.period_type.as_ref().map(vt),
            period: p.period,
            time_nanos: p.time_nanos,
            duration_nanos: p.duration_nanos,
            comments: p.comment.iter().map(|c| s(*c)).collect(),
            drop_frames: s(p.drop_frames),
            keep_frames: s(p.keep_frames),
            tick_unit: s(p.tick_unit),
            label_set,
            stacks: Arc::new(StackTable {
                mapping: p.mapping,
                location: p.location,
                function: p.function,
                string_table: p.string_table,
            }),
        }
    }
}
