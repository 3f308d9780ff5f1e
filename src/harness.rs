use crate::analyzer::{Analyzer, Measurement};
use crate::compression::Compression;
use crate::fsutil::{find_matching_files, PROFILE_EXTENSION};
use crate::profile::Profile;
use crate::report;
use anyhow::Context;
use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Config {
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
    pub compressions: Vec<Compression>,
}

impl Config {
    pub fn new(in_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            in_dir,
            out_dir,
            compressions: Compression::ALL.to_vec(),
        }
    }
}

pub fn read_profile(path: &std::path::Path) -> anyhow::Result<Profile> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Profile::parse(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parses every input once and builds the file x compression units, file
/// major.
pub fn load(config: &Config) -> anyhow::Result<Vec<Analyzer>> {
    let files = find_matching_files(&config.in_dir, &format!("*{}", PROFILE_EXTENSION))?;
    log::info!(
        "Found {} profiles in {}",
        files.len(),
        config.in_dir.display()
    );

    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("Failed to create {}", config.out_dir.display()))?;

    let mut analyzers = Vec::with_capacity(files.len() * config.compressions.len());
    for f in files {
        let prof = Arc::new(read_profile(&f)?);
        log::debug!(
            "Parsed {}: {} samples, {} ticks",
            f.display(),
            prof.sample.len(),
            prof.tick_count()
        );

        for compression in config.compressions.iter() {
            analyzers.push(Analyzer {
                filename: f.clone(),
                profile: Arc::clone(&prof),
                compression: *compression,
                out_dir: config.out_dir.clone(),
            });
        }
    }
    Ok(analyzers)
}

/// Runs every unit in parallel. Each unit writes only its own slot, so the
/// output follows the input order. All units run to completion; the first
/// failure in input order is returned.
pub fn run_all(analyzers: &[Analyzer]) -> anyhow::Result<Vec<Measurement>> {
    log::info!("Running {} units", analyzers.len());

    let mut results: Vec<Option<anyhow::Result<Measurement>>> = Vec::new();
    results.resize_with(analyzers.len(), || None);

    results
        .par_iter_mut()
        .zip(analyzers.par_iter())
        .for_each(|(slot, a)| {
            let res = a.run().with_context(|| {
                format!("{} ({})", a.filename.display(), a.compression)
            });
            *slot = Some(res);
        });

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(anyhow::anyhow!("unit did not run"))))
        .collect()
}

/// Measures every input and writes the report to `w`. Nothing is written to
/// `w` unless every unit succeeded.
pub fn run<W: Write>(config: &Config, w: W) -> anyhow::Result<()> {
    let analyzers = load(config)?;
    let results = run_all(&analyzers)?;
    report::write_csv(w, &results)?;
    log::info!("Reported {} units", results.len());
    Ok(())
}
