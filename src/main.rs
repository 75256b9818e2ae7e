//! Offline host — streams raw PCM files through the front end.
//!
//! ```text
//! afe-pipeline <mic.raw> <ref.raw> <out.raw> [--config <afe.toml>]
//! ```
//!
//! # Run sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`FrontEndConfig`] from `--config` or the platform `afe.toml`
//!    (defaults when missing).
//! 3. Build the processor through [`create_processor`] and open it.
//! 4. Feed one period at a time from the interleaved mic and reference
//!    files, zero-padding the final partial period, and append every output
//!    block to the output file.
//! 5. Close the processor and log a summary.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use afe_pipeline::config::FrontEndConfig;
use afe_pipeline::pipeline::{create_processor, AudioProcessor};
use anyhow::{bail, Context, Result};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

const USAGE: &str = "usage: afe-pipeline <mic.raw> <ref.raw> <out.raw> [--config <afe.toml>]";

#[derive(Debug)]
struct Args {
    mic: PathBuf,
    reference: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(USAGE),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let [mic, reference, output]: [PathBuf; 3] = positional
        .try_into()
        .map_err(|_| anyhow::anyhow!(USAGE))?;
    Ok(Args {
        mic,
        reference,
        output,
        config,
    })
}

/// Fill `buf` from `reader`, zero-padding whatever the stream cannot supply.
/// Returns the number of bytes actually read.
fn read_period(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf[filled..].fill(0);
    Ok(filled)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1))?;

    // 2. Configuration
    let config = match &args.config {
        Some(path) => FrontEndConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FrontEndConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            FrontEndConfig::default()
        }),
    };

    // 3. Processor
    let mut processor = create_processor(&config);
    processor.open(None).context("opening processor")?;

    let mut mic_in = BufReader::new(
        File::open(&args.mic).with_context(|| format!("opening {}", args.mic.display()))?,
    );
    let mut ref_in = BufReader::new(
        File::open(&args.reference).with_context(|| format!("opening {}", args.reference.display()))?,
    );
    let mut out_file = BufWriter::new(
        File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?,
    );

    let cfg = &config.processor;
    let mut mic = vec![0u8; cfg.mic_block_bytes()];
    let mut reference = vec![0u8; cfg.reference_block_bytes()];
    let mut out = vec![0u8; cfg.output_block_bytes()];

    // 4. Period loop
    let started = Instant::now();
    let mut periods = 0u64;
    loop {
        let got_mic = read_period(&mut mic_in, &mut mic)?;
        let got_ref = read_period(&mut ref_in, &mut reference)?;
        if got_mic == 0 && got_ref == 0 {
            break;
        }

        processor
            .process(&mic, &reference, &mut out)
            .with_context(|| format!("period {periods}"))?;
        out_file.write_all(&out)?;
        periods += 1;
    }
    out_file.flush()?;

    // 5. Summary
    processor.close().context("closing processor")?;
    let audio_secs = periods as f64 * cfg.period_secs();
    let wall_secs = started.elapsed().as_secs_f64();
    log::info!(
        "Processed {periods} periods ({audio_secs:.2} s of audio) in {wall_secs:.3} s (real-time factor {:.3})",
        if audio_secs > 0.0 { wall_secs / audio_secs } else { 0.0 }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_positional_and_config() {
        let parsed = parse_args(args(&["m.raw", "--config", "x.toml", "r.raw", "o.raw"])).unwrap();
        assert_eq!(parsed.mic, PathBuf::from("m.raw"));
        assert_eq!(parsed.reference, PathBuf::from("r.raw"));
        assert_eq!(parsed.output, PathBuf::from("o.raw"));
        assert_eq!(parsed.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn missing_output_is_an_error() {
        assert!(parse_args(args(&["m.raw", "r.raw"])).is_err());
    }

    #[test]
    fn short_read_is_zero_padded() {
        let mut src: &[u8] = &[1, 2, 3];
        let mut buf = [9u8; 5];
        assert_eq!(read_period(&mut src, &mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3, 0, 0]);
        assert_eq!(read_period(&mut src, &mut buf).unwrap(), 0);
    }
}
