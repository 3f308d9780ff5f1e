use clap::{Parser, Subcommand};
use compression::Compression;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

mod analyzer;
mod compression;
mod convert;
mod fsutil;
mod harness;
mod profile;
mod report;
mod tick_unit;
mod variant;

pub(crate) mod pprofpb;

/// Measures how much per-tick breakdown detail costs in encoded pprof size.
///
/// Every `*.pprof` in IN_DIR is rewritten into its plain, label and
/// breakdown variants under each compression; the artifacts land in OUT_DIR
/// and a CSV of their sizes is printed to stdout.
///
/// An input directory literally named `convert` must be passed as
/// `./convert`, otherwise it is taken for the subcommand.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the input profiles
    #[arg(required = true)]
    in_dir: Option<PathBuf>,

    /// Directory the rewritten profiles are written to
    #[arg(required = true)]
    out_dir: Option<PathBuf>,

    /// Compressions to measure, comma separated [default: all]
    #[arg(long = "compression", value_enum, value_delimiter = ',')]
    compressions: Vec<Compression>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write label, plain and rescaled-tick rewrites of a single profile
    Convert {
        in_file: PathBuf,
        out_dir: PathBuf,
    },
}

/// Builds the measurement config. Compressions keep their canonical order
/// and repeats collapse.
fn config(in_dir: PathBuf, out_dir: PathBuf, compressions: &[Compression]) -> harness::Config {
    let mut config = harness::Config::new(in_dir, out_dir);
    if !compressions.is_empty() {
        config.compressions = Compression::ALL
            .into_iter()
            .filter(|c| compressions.contains(c))
            .collect();
    }
    config
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match (cli.command, cli.in_dir, cli.out_dir) {
        (Some(Command::Convert { in_file, out_dir }), _, _) => {
            convert::Converter::new(in_file, out_dir).run()
        }
        (None, Some(in_dir), Some(out_dir)) => {
            let config = config(in_dir, out_dir, &cli.compressions);
            harness::run(&config, std::io::stdout().lock())
        }
        _ => anyhow::bail!("expected IN_DIR and OUT_DIR"),
    }
}

/// Logs a fatal error and also prints it to `w` as one line.
fn report_failure<W: Write>(mut w: W, e: &anyhow::Error) {
    log::error!("{:#}", e);
    let _ = writeln!(w, "{:#}", e);
}

fn main() -> ExitCode {
    colog::init();

    let cli = Cli::parse();
    log::debug!("{:?}", cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(std::io::stderr().lock(), &e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_measure() {
        let cli = Cli::try_parse_from(["breakdown-size", "in", "out"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.in_dir, Some(PathBuf::from("in")));
        assert_eq!(cli.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from(["breakdown-size", "convert", "cpu.pprof", "out"]).unwrap();
        match cli.command {
            Some(Command::Convert { in_file, out_dir }) => {
                assert_eq!(in_file, PathBuf::from("cpu.pprof"));
                assert_eq!(out_dir, PathBuf::from("out"));
            }
            None => panic!("expected convert"),
        }
    }

    #[test]
    fn test_parse_dir_named_convert() {
        let cli = Cli::try_parse_from(["breakdown-size", "./convert", "out"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.in_dir, Some(PathBuf::from("./convert")));
    }

    #[test]
    fn test_parse_compressions() {
        let cli =
            Cli::try_parse_from(["breakdown-size", "in", "out", "--compression", "zstd,none,zstd"])
                .unwrap();
        assert_eq!(cli.compressions, vec![Compression::Zstd, Compression::None, Compression::Zstd]);

        let c = config("in".into(), "out".into(), &cli.compressions);
        assert_eq!(c.in_dir, PathBuf::from("in"));
        assert_eq!(c.compressions, vec![Compression::None, Compression::Zstd]);

        let c = config("in".into(), "out".into(), &[]);
        assert_eq!(c.compressions, Compression::ALL.to_vec());

        assert!(Cli::try_parse_from(["breakdown-size", "in", "out", "--compression", "lz4"]).is_err());
    }

    #[test]
    fn test_report_failure_prints_one_line() {
        let err = anyhow::anyhow!("bad wire data").context("Failed to parse in/a.pprof");
        let mut out = vec![];
        report_failure(&mut out, &err);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Failed to parse in/a.pprof: bad wire data\n"
        );
    }

    #[test]
    fn test_parse_requires_both_dirs() {
        assert!(Cli::try_parse_from(["breakdown-size", "in"]).is_err());
        assert!(Cli::try_parse_from(["breakdown-size"]).is_err());
    }
}
