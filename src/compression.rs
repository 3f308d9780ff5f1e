use crate::profile::Profile;
use anyhow::Context;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Compression {
    /// Plain protobuf encoding.
    None,
    /// The standard pprof encoding: gzip at the default level.
    Gzip,
    /// The plain encoding through zstd at its highest level.
    Zstd,
}

impl Compression {
    pub const ALL: [Compression; 3] = [Compression::None, Compression::Gzip, Compression::Zstd];

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    pub fn apply(&self, prof: &Profile) -> anyhow::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::None => prof.write_uncompressed(&mut buf)?,
            Self::Gzip => prof.write(&mut buf)?,
            Self::Zstd => {
                let mut uncompressed = Vec::new();
                prof.write_uncompressed(&mut uncompressed)?;

                let level = *zstd::compression_level_range().end();
                let mut encoder = zstd::stream::Encoder::new(&mut buf, level)
                    .context("Failed to create zstd encoder")?;
                encoder
                    .write_all(&uncompressed)
                    .context("Failed to write zstd stream")?;
                encoder.finish().context("Failed to finish zstd stream")?;
            }
        }
        Ok(buf)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
