use crate::compression::Compression;
use crate::fsutil::{profile_base_name, write_artifact};
use crate::profile::Profile;
use crate::variant::Variant;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Encoded size of each variant, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantSizes {
    pub plain: usize,
    pub label: usize,
    pub breakdown: usize,
}

/// Result of one (file, compression) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub filename: String,
    pub compression: Compression,
    pub sizes: VariantSizes,
}

/// One unit of work: a parsed input under one compression.
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub filename: PathBuf,
    pub profile: Arc<Profile>,
    pub compression: Compression,
    pub out_dir: PathBuf,
}

impl Analyzer {
    pub fn run(&self) -> anyhow::Result<Measurement> {
        let sizes = VariantSizes {
            plain: self.write_variant(Variant::Plain)?,
            label: self.write_variant(Variant::Label)?,
            breakdown: self.write_variant(Variant::Breakdown)?,
        };

        Ok(Measurement {
            filename: self
                .filename
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            compression: self.compression,
            sizes,
        })
    }

    /// Derives, encodes and writes one variant. Returns the artifact size.
    fn write_variant(&self, variant: Variant) -> anyhow::Result<usize> {
        let prof = variant.derive(&self.profile);
        let data = self
            .compression
            .apply(&prof)
            .with_context(|| format!("Failed to encode {} variant", variant))?;

        let path = self.out_filename(variant);
        write_artifact(&path, &data)?;
        log::debug!("Wrote {} ({} bytes)", path.display(), data.len());
        Ok(data.len())
    }

    pub fn out_filename(&self, variant: Variant) -> PathBuf {
        artifact_path(&self.out_dir, &self.filename, &self.compression.to_string(), variant.name())
    }
}

/// `<out_dir>/<base>.<kind>.<suffix>.pprof`
pub fn artifact_path(out_dir: &Path, input: &Path, kind: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!(
        "{}.{}.{}.pprof",
        profile_base_name(input),
        kind,
        suffix
    ))
}
