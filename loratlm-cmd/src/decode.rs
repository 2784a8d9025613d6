use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use loratlm::{
    filter::{FilterConfig, FilterPipeline, Summary},
    packet::{PacketDecoder, Record, PACKET_LEN},
    read_packets, RecordStream,
};
use tracing::{info, trace, warn};

use crate::export::CsvExporter;

/// Sanity check an input file, returning its size.
///
/// A size that is not a multiple of the packet length is only a warning; the trailing
/// bytes show up as a decode error.
pub fn check_input(path: &Path) -> Result<u64> {
    let size = fs::metadata(path)
        .with_context(|| format!("input {path:?}"))?
        .len();
    if size == 0 {
        bail!("input {path:?} is empty");
    }
    if size % PACKET_LEN as u64 != 0 {
        warn!(
            path = %path.display(),
            size,
            trailing = size % PACKET_LEN as u64,
            "input size is not a multiple of {PACKET_LEN} bytes"
        );
    }
    Ok(size)
}

/// Active flag names of `record` if any of the `marks` flag bits is set.
fn flag_markers(record: &Record, marks: &[usize]) -> Option<String> {
    let flags = record.flags();
    if !marks.iter().any(|bit| flags.get(*bit)) {
        return None;
    }
    Some(flags.active().collect::<Vec<_>>().join(","))
}

/// Decode and filter `input`, writing accepted records to `dest` as CSV.
///
/// Accepted records with any of the `marks` flag bits set are logged at info.
pub fn decode<W: Write>(
    input: &Path,
    dest: W,
    decoder: PacketDecoder,
    config: FilterConfig,
    marks: &[usize],
    log_packets: bool,
) -> Result<Summary> {
    let size = check_input(input)?;
    info!(
        "decoding {input:?}, {} packets, {:?} bit order",
        size.div_ceil(PACKET_LEN as u64),
        decoder.bit_order()
    );

    let reader = BufReader::new(File::open(input).context("opening input")?);
    let pipeline = FilterPipeline::new(config).context("invalid filter config")?;
    let mut exporter = CsvExporter::new(dest)?;

    let mut read_err = None;
    let packets = read_packets(reader)
        .map_while(|r| r.map_err(|err| read_err = Some(err)).ok());
    let mut stream = RecordStream::new(packets, decoder, pipeline);
    for record in stream.by_ref() {
        if let Some(flags) = flag_markers(&record, marks) {
            info!(index = record.index(), time_ms = record.time_ms(), %flags, "flag marker");
        }
        if log_packets {
            trace!("packet {}\n{record}", record.index());
        }
        exporter.write(&record)?;
    }
    let summary = stream.into_summary();
    if let Some(err) = read_err {
        return Err(err).context("reading input");
    }
    exporter.finish()?;

    Ok(summary)
}

pub fn log_summary(summary: &Summary) {
    info!(
        packets = summary.packets,
        decode_errors = summary.decode_errors,
        accepted = summary.accepted,
        rejected = summary.rejected_total(),
        "done"
    );
    for (rule, count) in &summary.rejected {
        info!("rejected {count} by {rule}");
    }
    for (channel, count) in &summary.out_of_range {
        info!("{channel} out of range {count} times");
    }
}
