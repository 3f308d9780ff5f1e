use crate::profile::{Profile, Sample, TIME_LABEL};
use std::borrow::Cow;
use std::fmt;

/// Structural rewrites of a profile, from least to most detailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Breakdown stripped.
    Plain,
    /// Every breakdown tick flattened into its own sample.
    Label,
    /// The profile as recorded.
    Breakdown,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Label => "label",
            Self::Breakdown => "breakdown",
        }
    }

    /// Rewrites `prof` into this variant. The input is never modified.
    pub fn derive<'a>(&self, prof: &'a Profile) -> Cow<'a, Profile> {
        match self {
            Self::Breakdown => Cow::Borrowed(prof),
            Self::Plain => Cow::Owned(derive_plain(prof)),
            Self::Label => Cow::Owned(derive_label(prof)),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn derive_plain(prof: &Profile) -> Profile {
    let mut p = prof.clone();
    for s in p.sample.iter_mut() {
        s.breakdown.clear();
    }
    p.label_set.clear();
    p
}

fn derive_label(prof: &Profile) -> Profile {
    let mut sample = Vec::with_capacity(prof.tick_count());

    for s in prof.sample.iter() {
        for b in s.breakdown.iter() {
            // Each entry apportions the parent's primary value over its own
            // ticks only; siblings are not reconciled.
            let divisor = b.tick.len() as i64;
            for (i, tick) in b.tick.iter().enumerate() {
                let mut new_s = Sample {
                    location_id: s.location_id.clone(),
                    value: s.value.clone(),
                    label: s.label.clone(),
                    num_label: s.num_label.clone(),
                    num_unit: s.num_unit.clone(),
                    breakdown: Vec::new(),
                };

                if let Some(bundle) = b.label_set.get(i).and_then(Option::as_ref) {
                    new_s.label = bundle.label.clone();
                    new_s.num_label = bundle.num_label.clone();
                    new_s.num_unit = bundle.num_unit.clone();
                }
                new_s
                    .num_label
                    .entry(TIME_LABEL.to_string())
                    .or_default()
                    .push(*tick);

                if let Some(v) = new_s.value.first_mut() {
                    *v /= divisor;
                }
                sample.push(new_s);
            }
        }
    }

    Profile {
        sample,
        ..shallow_metadata(prof)
    }
}

/// Everything but samples and label sets.
fn shallow_metadata(prof: &Profile) -> Profile {
    Profile {
        sample_type: prof.sample_type.clone(),
        sample: Vec::new(),
        default_sample_type: prof.default_sample_type.clone(),
        period_type: prof.period_type.clone(),
        period: prof.period,
        time_nanos: prof.time_nanos,
        duration_nanos: prof.duration_nanos,
        comments: prof.comments.clone(),
        drop_frames: prof.drop_frames.clone(),
        keep_frames: prof.keep_frames.clone(),
        tick_unit: prof.tick_unit.clone(),
        label_set: Vec::new(),
        stacks: prof.stacks.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Breakdown, LabelBundle, Labels, NumLabels, ValueType};

    fn profile(samples: Vec<Sample>) -> Profile {
        Profile {
            sample_type: vec![
                ValueType {
                    type_: "cpu".into(),
                    unit: "nanoseconds".into(),
                },
                ValueType {
                    type_: "samples".into(),
                    unit: "count".into(),
                },
            ],
            sample: samples,
            tick_unit: "nanoseconds".into(),
            label_set: vec![LabelBundle::default()],
            ..Default::default()
        }
    }

    fn sample(value: i64, breakdown: Vec<Breakdown>) -> Sample {
        Sample {
            location_id: vec![1, 2],
            value: vec![value, 1],
            label: Labels::from([("thread".to_string(), vec!["main".to_string()])]),
            breakdown,
            ..Default::default()
        }
    }

    #[test]
    fn test_breakdown_is_identity() {
        let p = profile(vec![sample(100, vec![Breakdown::from_ticks(vec![1, 2])])]);
        let derived = Variant::Breakdown.derive(&p);
        assert!(matches!(derived, Cow::Borrowed(_)));
        assert!(std::ptr::eq(&*derived, &p));
    }

    #[test]
    fn test_plain_strips_breakdown() {
        let p = profile(vec![
            sample(100, vec![Breakdown::from_ticks(vec![1, 2])]),
            sample(7, vec![]),
        ]);
        let plain = Variant::Plain.derive(&p);

        assert_eq!(plain.sample.len(), 2);
        assert!(plain.sample.iter().all(|s| s.breakdown.is_empty()));
        assert!(plain.label_set.is_empty());
        assert_eq!(plain.sample[0].value, vec![100, 1]);
        // input untouched
        assert_eq!(p.sample[0].breakdown.len(), 1);
        assert_eq!(p.label_set.len(), 1);
    }

    #[test]
    fn test_label_apportions_value() {
        let p = profile(vec![sample(
            100,
            vec![Breakdown::from_ticks(vec![10, 20, 30, 40])],
        )]);
        let label = Variant::Label.derive(&p);

        assert_eq!(label.sample.len(), 4);
        for (s, tick) in label.sample.iter().zip([10, 20, 30, 40]) {
            assert_eq!(s.value, vec![25, 1]);
            assert_eq!(s.num_label[TIME_LABEL], vec![tick]);
            assert!(s.breakdown.is_empty());
            assert_eq!(s.location_id, vec![1, 2]);
            assert_eq!(s.label["thread"], vec!["main".to_string()]);
        }
        assert!(label.label_set.is_empty());
    }

    #[test]
    fn test_label_division_truncates() {
        let p = profile(vec![sample(10, vec![Breakdown::from_ticks(vec![1, 1, 1])])]);
        let label = Variant::Label.derive(&p);
        assert!(label.sample.iter().all(|s| s.value[0] == 3));

        let p = profile(vec![sample(-10, vec![Breakdown::from_ticks(vec![1, 1, 1])])]);
        let label = Variant::Label.derive(&p);
        assert!(label.sample.iter().all(|s| s.value[0] == -3));
    }

    #[test]
    fn test_label_apportions_per_entry() {
        // Known non-conservation: each entry divides by its own tick count,
        // so the derived values need not sum to the parent value.
        let p = profile(vec![sample(
            100,
            vec![
                Breakdown::from_ticks(vec![1, 1]),
                Breakdown::from_ticks(vec![1, 1, 1]),
            ],
        )]);
        let label = Variant::Label.derive(&p);

        let values: Vec<i64> = label.sample.iter().map(|s| s.value[0]).collect();
        assert_eq!(values, vec![50, 50, 33, 33, 33]);
        assert_ne!(values.iter().sum::<i64>(), 100);
    }

    #[test]
    fn test_label_drops_samples_without_breakdown() {
        let p = profile(vec![
            sample(5, vec![]),
            sample(100, vec![Breakdown::from_ticks(vec![1, 2])]),
            sample(6, vec![Breakdown::from_ticks(vec![])]),
        ]);
        let label = Variant::Label.derive(&p);
        assert_eq!(label.sample.len(), 2);
        assert!(label.sample.iter().all(|s| s.value[0] == 50));

        let p = profile(vec![sample(5, vec![]), sample(6, vec![])]);
        assert!(Variant::Label.derive(&p).sample.is_empty());
    }

    #[test]
    fn test_label_bundle_replaces_labels() {
        let bundle = LabelBundle {
            label: Labels::from([("request".to_string(), vec!["42".to_string()])]),
            num_label: NumLabels::from([(TIME_LABEL.to_string(), vec![7])]),
            num_unit: Labels::from([(TIME_LABEL.to_string(), vec!["ms".to_string()])]),
        };
        let p = profile(vec![sample(
            100,
            vec![Breakdown {
                tick: vec![11, 22],
                label_set: vec![Some(bundle.clone()), None],
            }],
        )]);
        let label = Variant::Label.derive(&p);

        let first = &label.sample[0];
        assert_eq!(first.label, bundle.label);
        assert_eq!(first.num_label[TIME_LABEL], vec![7, 11]);
        assert_eq!(first.num_unit, bundle.num_unit);
        assert!(!first.label.contains_key("thread"));

        let second = &label.sample[1];
        assert_eq!(second.label["thread"], vec!["main".to_string()]);
        assert_eq!(second.num_label[TIME_LABEL], vec![22]);
        assert!(second.num_unit.is_empty());

        // the bundle stored in the input keeps its own time value
        let stored = p.sample[0].breakdown[0].label_set[0].as_ref().unwrap();
        assert_eq!(stored.num_label[TIME_LABEL], vec![7]);
    }

    #[test]
    fn test_label_appends_to_parent_time() {
        let mut s = sample(8, vec![Breakdown::from_ticks(vec![3, 4])]);
        s.num_label.insert(TIME_LABEL.to_string(), vec![1]);
        let p = profile(vec![s]);
        let label = Variant::Label.derive(&p);

        assert_eq!(label.sample[0].num_label[TIME_LABEL], vec![1, 3]);
        assert_eq!(label.sample[1].num_label[TIME_LABEL], vec![1, 4]);
    }
}
