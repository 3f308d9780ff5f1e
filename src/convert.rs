use crate::analyzer::artifact_path;
use crate::fsutil::write_artifact;
use crate::harness::read_profile;
use crate::profile::Profile;
use crate::tick_unit::{check_source_unit, convert_tick_unit, TickUnit};
use crate::variant::Variant;
use anyhow::Context;
use std::path::PathBuf;

/// Writes the label, plain and rescaled-tick rewrites of a single profile,
/// gzipped and not.
#[derive(Debug, Clone)]
pub struct Converter {
    pub in_file: PathBuf,
    pub out_dir: PathBuf,
}

impl Converter {
    pub fn new(in_file: PathBuf, out_dir: PathBuf) -> Self {
        Self { in_file, out_dir }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let prof = read_profile(&self.in_file)?;
        check_source_unit(&prof).with_context(|| format!("{}", self.in_file.display()))?;

        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create {}", self.out_dir.display()))?;

        for gzip in [false, true] {
            self.write_profile(&Variant::Label.derive(&prof), "labels", gzip)?;
            self.write_profile(&Variant::Plain.derive(&prof), "plain", gzip)?;
            for unit in TickUnit::ALL {
                self.write_profile(&convert_tick_unit(&prof, unit)?, unit.name(), gzip)?;
            }
        }

        log::info!(
            "Converted {} into {}",
            self.in_file.display(),
            self.out_dir.display()
        );
        Ok(())
    }

    fn write_profile(&self, prof: &Profile, suffix: &str, gzip: bool) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        if gzip {
            prof.write(&mut buf)?;
        } else {
            prof.write_uncompressed(&mut buf)?;
        }

        let path = self.variant_filename(suffix, gzip);
        write_artifact(&path, &buf)?;
        log::debug!("Wrote {} ({} bytes)", path.display(), buf.len());
        Ok(())
    }

    pub fn variant_filename(&self, suffix: &str, gzip: bool) -> PathBuf {
        let kind = if gzip { "compressed" } else { "uncompressed" };
        artifact_path(&self.out_dir, &self.in_file, kind, suffix)
    }
}
