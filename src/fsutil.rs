//! Small filesystem utilities.

use anyhow::Context;
use globset::{Glob, GlobMatcher};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PROFILE_EXTENSION: &str = ".pprof";

/// Files directly inside `dir` whose name matches `pattern`. Not recursive,
/// sorted by path.
pub fn find_matching_files(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = compile_glob(pattern)?;
    let mut out = vec![];
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn compile_glob(pattern: &str) -> anyhow::Result<GlobMatcher> {
    let glob = Glob::new(pattern).with_context(|| format!("invalid glob {pattern:?}"))?;
    Ok(glob.compile_matcher())
}

/// File name of `path` up to the first ".pprof".
pub fn profile_base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once(PROFILE_EXTENSION) {
        Some((before, _)) => before.to_string(),
        None => name,
    }
}

/// Writes `data` to `path`, replacing any existing file. New files get mode
/// 0755 on unix.
pub fn write_artifact(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o755);
    }

    let mut f = opts
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    f.write_all(data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
