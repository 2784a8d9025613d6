mod decode;
mod export;
mod info;
mod settings;

use std::path::PathBuf;
use std::{fs::File, io::stderr, io::stdout, io::BufWriter};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use loratlm::{
    bits::BitOrder,
    filter::DropSet,
    packet::{PacketDecoder, SystemFlags},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use settings::Profile;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable debug logging. LORATLM_LOG, if set, takes precedence.
    #[arg(short, long, global = true, action)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// TOML filter file with [time], [channels] and [manual] sections.
    #[arg(short, long, value_name = "path")]
    filter_file: Option<PathBuf>,

    /// Settings file of named profiles.
    #[arg(short, long, value_name = "path")]
    settings_file: Option<PathBuf>,

    /// Settings profile to use.
    #[arg(long, default_value = settings::DEFAULT_SECTION)]
    section: String,

    /// Order bits are packed within each byte: msb or lsb.
    #[arg(long, value_name = "order")]
    bit_order: Option<BitOrder>,

    /// Largest accepted forward time step between packets. Enables time checks.
    #[arg(long, value_name = "ms")]
    max_jump_ms: Option<u32>,

    /// Treat a backwards time step as a rollover of the 24 bit counter. Enables time
    /// checks. Use --allow-wrap=false to turn off wrapping set by a settings profile.
    #[arg(long, value_name = "bool", num_args = 0..=1, default_missing_value = "true")]
    allow_wrap: Option<bool>,

    /// Drop these raw packet positions.
    ///
    /// Accepts a CSV of zero based packet indices and inclusive ranges of the format
    /// <start>-<end>, e.g., --drop 17,42,153-160.
    #[arg(long, value_name = "csv")]
    drop: Option<DropSet>,
}

impl FilterArgs {
    /// Settings profile with command line values layered on top.
    fn resolve(&self, input: Option<PathBuf>, to_csv: Option<PathBuf>) -> Result<Profile> {
        let base = match &self.settings_file {
            Some(path) => settings::load_profile(path, &self.section)?,
            None => Profile::default(),
        };
        Ok(base.overlay(Profile {
            input,
            to_csv,
            filter_file: self.filter_file.clone(),
            bit_order: self.bit_order,
            max_jump_ms: self.max_jump_ms,
            allow_wrap: self.allow_wrap,
            drop_packets: self.drop.clone(),
            ..Default::default()
        }))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a file of concatenated telemetry packets to CSV.
    ///
    /// Records rejected by the filters are dropped and counted. The CSV is `;`
    /// delimited with one column per channel in raw transmitted units.
    Decode {
        /// Input packet file.
        #[arg(short, long, value_name = "path")]
        input: Option<PathBuf>,

        /// Output CSV path. Writes to stdout if not provided.
        #[arg(short, long, value_name = "path")]
        to_csv: Option<PathBuf>,

        /// Delete output file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Log every accepted packet at trace level.
        #[arg(long, action)]
        log_packets: bool,

        /// Log accepted packets with any of these system flags set, e.g.,
        /// --flag-mark start,land,eject.
        #[arg(
            long,
            value_name = "csv",
            value_delimiter = ',',
            value_parser = SystemFlags::bit_for_name
        )]
        flag_mark: Vec<usize>,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show decode and filter statistics for packet files
    Info {
        /// Input packet files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: info::Format,

        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("LORATLM_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Decode {
            input,
            to_csv,
            clobber,
            log_packets,
            flag_mark,
            filters,
        } => {
            let profile = filters.resolve(input.clone(), to_csv.clone())?;
            let Some(input) = &profile.input else {
                bail!("no input; use --input or set input in the settings profile");
            };
            let config = profile.filter_config()?;
            let decoder = PacketDecoder::new(profile.bit_order.unwrap_or_default());
            debug!("filters: {config:?}");

            let summary = match &profile.to_csv {
                Some(output) => {
                    if !clobber && output.exists() {
                        bail!("{output:?} exists; use --clobber");
                    }
                    info!("writing {output:?}");
                    let dest = File::create(output)
                        .with_context(|| format!("failed to create output {output:?}"))?;
                    decode::decode(
                        input,
                        BufWriter::new(dest),
                        decoder,
                        config,
                        flag_mark,
                        *log_packets,
                    )?
                }
                None => decode::decode(
                    input,
                    stdout().lock(),
                    decoder,
                    config,
                    flag_mark,
                    *log_packets,
                )?,
            };

            decode::log_summary(&summary);
            if summary.accepted == 0 {
                bail!("no records accepted from {input:?}");
            }
            Ok(())
        }
        Commands::Info {
            inputs,
            format,
            filters,
        } => {
            let profile = filters.resolve(None, None)?;
            let config = profile.filter_config()?;
            let decoder = PacketDecoder::new(profile.bit_order.unwrap_or_default());
            info::info(inputs, format, decoder, &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn filter_args(args: &[&str]) -> FilterArgs {
        let cli = Cli::try_parse_from(["loratlm", "info", "in.bin"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Info { filters, .. } => filters,
            Commands::Decode { .. } => unreachable!(),
        }
    }

    #[test]
    fn allow_wrap_flag_values() {
        assert_eq!(filter_args(&[]).allow_wrap, None);
        assert_eq!(filter_args(&["--allow-wrap"]).allow_wrap, Some(true));
        assert_eq!(filter_args(&["--allow-wrap=false"]).allow_wrap, Some(false));
        assert_eq!(filter_args(&["--allow-wrap", "true"]).allow_wrap, Some(true));
    }

    #[test]
    fn flag_mark_names() {
        let cli = Cli::try_parse_from(["loratlm", "decode", "--flag-mark", "Start,land"]).unwrap();
        let Commands::Decode { flag_mark, .. } = cli.command else {
            unreachable!()
        };
        assert_eq!(flag_mark, vec![SystemFlags::START, SystemFlags::LAND]);
        assert!(Cli::try_parse_from(["loratlm", "decode", "--flag-mark", "boom"]).is_err());
    }

    #[test]
    fn command_line_overrides_profile() {
        let mut settings = tempfile::NamedTempFile::new().unwrap();
        settings
            .write_all(b"[default]\nallow_wrap = true\nmax_jump_ms = 500\n")
            .unwrap();
        let path = settings.path().to_str().unwrap();

        let profile = filter_args(&["-s", path]).resolve(None, None).unwrap();
        assert_eq!(profile.allow_wrap, Some(true));

        let profile = filter_args(&["-s", path, "--allow-wrap=false", "--max-jump-ms", "9"])
            .resolve(None, None)
            .unwrap();
        assert_eq!(profile.allow_wrap, Some(false));
        assert_eq!(profile.max_jump_ms, Some(9));
        let time = profile.filter_config().unwrap().time.unwrap();
        assert!(!time.allow_wrap);
    }
}
