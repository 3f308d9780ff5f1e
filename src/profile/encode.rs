use super::{LabelBundle, Labels, NumLabels, Profile, ValueType};
use crate::pprofpb;
use flate2::{write::GzEncoder, Compression};
use prost::Message;
use std::collections::HashMap;
use std::io::Write;

/// String table built fresh on every encode, so it holds only strings the
/// encoded profile references.
struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, i64>,
}

impl StringTable {
    fn new() -> Self {
        let mut t = Self {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        t.string("");
        t
    }

    fn string(&mut self, s: &str) -> i64 {
        if let Some(idx) = self.index.get(s) {
            return *idx;
        }

        let idx = self.strings.len() as i64;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Re-interns `idx`, an index into the parsed table `old`.
    fn remap(&mut self, old: &[String], idx: i64) -> i64 {
        match usize::try_from(idx).ok().and_then(|i| old.get(i)) {
            Some(s) => self.string(s),
            None => 0,
        }
    }

    fn value_type(&mut self, vt: &ValueType) -> pprofpb::ValueType {
        pprofpb::ValueType {
            r#type: self.string(&vt.type_),
            unit: self.string(&vt.unit),
        }
    }
}

/// Label bundles referenced from breakdown ticks, deduplicated.
struct LabelSetTable<'a> {
    sets: Vec<pprofpb::LabelSet>,
    ids: HashMap<&'a LabelBundle, u64>,
}

impl<'a> LabelSetTable<'a> {
    fn new(legacy: &'a [LabelBundle], strings: &mut StringTable) -> Self {
        let mut t = Self {
            sets: Vec::with_capacity(legacy.len()),
            ids: HashMap::new(),
        };
        for bundle in legacy {
            t.push(bundle, strings);
        }
        t
    }

    fn push(&mut self, bundle: &'a LabelBundle, strings: &mut StringTable) -> u64 {
        self.sets.push(pprofpb::LabelSet {
            label: encode_labels(&bundle.label, &bundle.num_label, &bundle.num_unit, strings),
        });
        let id = self.sets.len() as u64;
        *self.ids.entry(bundle).or_insert(id)
    }

    fn id(&mut self, bundle: Option<&'a LabelBundle>, strings: &mut StringTable) -> u64 {
        match bundle {
            None => 0,
            Some(b) => match self.ids.get(b) {
                Some(id) => *id,
                None => self.push(b, strings),
            },
        }
    }
}

fn encode_labels(
    label: &Labels,
    num_label: &NumLabels,
    num_unit: &Labels,
    strings: &mut StringTable,
) -> Vec<pprofpb::Label> {
    let mut res = Vec::with_capacity(label.len() + num_label.len());

    for (key, values) in label.iter() {
        for value in values {
            res.push(pprofpb::Label {
                key: strings.string(key),
                str: strings.string(value),
                ..Default::default()
            });
        }
    }

    for (key, values) in num_label.iter() {
        let units = num_unit.get(key);
        for (i, num) in values.iter().enumerate() {
            let num_unit = match units.and_then(|u| u.get(i)) {
                Some(unit) if !unit.is_empty() => strings.string(unit),
                _ => 0,
            };
            res.push(pprofpb::Label {
                key: strings.string(key),
                num: *num,
                num_unit,
                ..Default::default()
            });
        }
    }

    res
}

impl Profile {
    pub fn to_wire(&self) -> pprofpb::Profile {
        let mut strings = StringTable::new();
        let mut label_sets = LabelSetTable::new(&self.label_set, &mut strings);

        let sample_type = self
            .sample_type
            .iter()
            .map(|vt| strings.value_type(vt))
            .collect();

        let mut sample = Vec::with_capacity(self.sample.len());
        for s in self.sample.iter() {
            let label = encode_labels(&s.label, &s.num_label, &s.num_unit, &mut strings);
            let breakdown = s
                .breakdown
                .iter()
                .map(|b| pprofpb::Breakdown {
                    tick: b.tick.clone(),
                    label_set_id: b
                        .label_set
                        .iter()
                        .map(|bundle| label_sets.id(bundle.as_ref(), &mut strings))
                        .collect(),
                })
                .collect();

            sample.push(pprofpb::Sample {
                location_id: s.location_id.clone(),
                value: s.value.clone(),
                label,
                breakdown,
            });
        }

        let period_type = self.period_type.as_ref().map(|vt| strings.value_type(vt));
        let comment = self.comments.iter().map(|c| strings.string(c)).collect();
        let drop_frames = strings.string(&self.drop_frames);
        let keep_frames = strings.string(&self.keep_frames);
        let default_sample_type = strings.string(&self.default_sample_type);
        let tick_unit = strings.string(&self.tick_unit);

        let old = self.stacks.string_table.as_slice();
        let mapping = self
            .stacks
            .mapping
            .iter()
            .map(|m| pprofpb::Mapping {
                filename: strings.remap(old, m.filename),
                build_id: strings.remap(old, m.build_id),
                ..m.clone()
            })
            .collect();
        let function = self
            .stacks
            .function
            .iter()
            .map(|f| pprofpb::Function {
                name: strings.remap(old, f.name),
                system_name: strings.remap(old, f.system_name),
                filename: strings.remap(old, f.filename),
                ..f.clone()
            })
            .collect();

        pprofpb::Profile {
            sample_type,
            sample,
            mapping,
            location: self.stacks.location.clone(),
            function,
            string_table: strings.strings,
            drop_frames,
            keep_frames,
            time_nanos: self.time_nanos,
            duration_nanos: self.duration_nanos,
            period_type,
            period: self.period,
            comment,
            default_sample_type,
            tick_unit,
            label_set: label_sets.sets,
        }
    }

    /// Writes the plain protobuf encoding.
    pub fn write_uncompressed<W: Write>(&self, mut w: W) -> anyhow::Result<()> {
        w.write_all(&self.to_wire().encode_to_vec())?;
        Ok(())
    }

    /// Writes the protobuf encoding gzipped at the default level.
    pub fn write<W: Write>(&self, w: W) -> anyhow::Result<()> {
        let mut encoder = GzEncoder::new(w, Compression::default());
        self.write_uncompressed(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Breakdown, Sample, StackTable};
    use crate::variant::Variant;
    use std::sync::Arc;

    fn bundle(user: &str) -> LabelBundle {
        LabelBundle {
            label: Labels::from([("user".to_string(), vec![user.to_string()])]),
            ..Default::default()
        }
    }

    #[test]
    fn test_string_table_starts_empty() {
        let mut strings = StringTable::new();
        assert_eq!(strings.strings, vec!["".to_string()]);
        assert_eq!(strings.string(""), 0);
        assert_eq!(strings.string("main"), 1);
        assert_eq!(strings.string("main"), 1);
    }

    #[test]
    fn test_stack_strings_are_remapped() {
        let p = Profile {
            stacks: Arc::new(StackTable {
                mapping: vec![pprofpb::Mapping {
                    id: 1,
                    filename: 3,
                    ..Default::default()
                }],
                function: vec![pprofpb::Function {
                    id: 1,
                    name: 1,
                    filename: 3,
                    ..Default::default()
                }],
                string_table: vec![
                    "".into(),
                    "main".into(),
                    "unused".into(),
                    "/bin/app".into(),
                ],
                ..Default::default()
            }),
            ..Default::default()
        };

        let wire = p.to_wire();
        let st = &wire.string_table;
        assert!(!st.contains(&"unused".to_string()));
        assert_eq!(st[wire.mapping[0].filename as usize], "/bin/app");
        assert_eq!(st[wire.function[0].name as usize], "main");
        assert_eq!(st[wire.function[0].filename as usize], "/bin/app");
        assert_eq!(wire.function[0].system_name, 0);
    }

    #[test]
    fn test_plain_rewrite_drops_bundle_strings() {
        let long = "x".repeat(4096);
        let p = Profile {
            sample_type: vec![ValueType {
                type_: "cpu".into(),
                unit: "nanoseconds".into(),
            }],
            sample: vec![Sample {
                value: vec![10],
                breakdown: vec![Breakdown {
                    tick: vec![1, 2],
                    label_set: vec![Some(bundle(&long)), None],
                }],
                ..Default::default()
            }],
            tick_unit: "nanoseconds".into(),
            ..Default::default()
        };
        let mut buf = vec![];
        p.write_uncompressed(&mut buf).unwrap();
        let parsed = Profile::parse(&buf).unwrap();
        assert!(parsed.stacks.string_table.contains(&long));

        let plain = Variant::Plain.derive(&parsed);
        let wire = plain.to_wire();
        assert!(!wire.string_table.contains(&long));
        assert!(!wire.string_table.contains(&"user".to_string()));

        let mut parsed_size = vec![];
        plain.write_uncompressed(&mut parsed_size).unwrap();
        let mut fresh_size = vec![];
        Variant::Plain
            .derive(&p)
            .write_uncompressed(&mut fresh_size)
            .unwrap();
        assert_eq!(parsed_size.len(), fresh_size.len());
    }

    #[test]
    fn test_breakdown_bundles_are_interned() {
        let p = Profile {
            sample: vec![Sample {
                value: vec![10],
                breakdown: vec![Breakdown {
                    tick: vec![1, 2, 3],
                    label_set: vec![Some(bundle("a")), None, Some(bundle("a"))],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let wire = p.to_wire();
        assert_eq!(wire.label_set.len(), 1);
        assert_eq!(wire.sample[0].breakdown[0].label_set_id, vec![1, 0, 1]);
    }

    #[test]
    fn test_legacy_label_set_is_reused() {
        let p = Profile {
            label_set: vec![bundle("a"), bundle("b")],
            sample: vec![Sample {
                breakdown: vec![Breakdown {
                    tick: vec![5],
                    label_set: vec![Some(bundle("b"))],
                }],
                ..Default::default()
            }],
            stacks: Arc::default(),
            ..Default::default()
        };

        let wire = p.to_wire();
        assert_eq!(wire.label_set.len(), 2);
        assert_eq!(wire.sample[0].breakdown[0].label_set_id, vec![2]);
    }

    #[test]
    fn test_num_units_follow_values() {
        let mut strings = StringTable::new();
        let labels = encode_labels(
            &Labels::new(),
            &NumLabels::from([("bytes".to_string(), vec![1, 2])]),
            &Labels::from([("bytes".to_string(), vec!["kilobytes".to_string()])]),
            &mut strings,
        );
        assert_eq!(labels.len(), 2);
        assert_eq!(strings.strings[labels[0].num_unit as usize], "kilobytes");
        assert_eq!(labels[1].num_unit, 0);
    }

    #[test]
    fn test_gzip_write_starts_with_magic() {
        let mut buf = vec![];
        Profile::default().write(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x1f, 0x8b]);
    }
}
