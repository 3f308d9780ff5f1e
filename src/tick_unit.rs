use crate::profile::Profile;
use anyhow::bail;
use std::fmt;

/// Unit breakdown ticks are recorded in.
pub const SOURCE_TICK_UNIT: &str = "nanoseconds";

/// Target units for rescaling breakdown ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
}

impl TickUnit {
    pub const ALL: [TickUnit; 3] = [
        TickUnit::Nanoseconds,
        TickUnit::Microseconds,
        TickUnit::Milliseconds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "1-nanoseconds",
            Self::Microseconds => "2-microseconds",
            Self::Milliseconds => "3-milliseconds",
        }
    }

    fn divisor(&self) -> i64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
        }
    }
}

impl fmt::Display for TickUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fails unless `prof` declares nanosecond ticks.
pub fn check_source_unit(prof: &Profile) -> anyhow::Result<()> {
    if prof.tick_unit != SOURCE_TICK_UNIT {
        bail!("unexpected tick_unit: {:?}", prof.tick_unit);
    }
    Ok(())
}

/// Copy of `prof` with every breakdown tick rescaled into `unit`.
pub fn convert_tick_unit(prof: &Profile, unit: TickUnit) -> anyhow::Result<Profile> {
    check_source_unit(prof)?;

    let mut p = prof.clone();
    let divisor = unit.divisor();
    for b in p.sample.iter_mut().flat_map(|s| s.breakdown.iter_mut()) {
        for tick in b.tick.iter_mut() {
            *tick /= divisor;
        }
    }
    p.tick_unit = unit.name().to_string();
    p.label_set.clear();
    Ok(p)
}
