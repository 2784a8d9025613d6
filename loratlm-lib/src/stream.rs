//! Decoding and filtering of packet sequences.
use std::io::{self, Read};

use tracing::{debug, trace};

use crate::filter::{FilterDecision, FilterPipeline, Summary};
use crate::packet::{PacketDecoder, Record, PACKET_LEN};

/// Iterator of the accepted [Record]s decoded from a sequence of raw packets.
///
/// Packets that fail to decode are skipped and counted; records rejected by the
/// [FilterPipeline] are dropped and counted. Accepted records are produced in
/// input order with no buffering beyond the current packet.
///
/// # Example
/// ```
/// use loratlm::{filter::{FilterConfig, FilterPipeline}, packet::PacketDecoder, RecordStream};
///
/// let data = vec![0u8; 42 * 3 + 41];
/// let pipeline = FilterPipeline::new(FilterConfig::default()).unwrap();
/// let mut stream = RecordStream::new(data.chunks(42), PacketDecoder::default(), pipeline);
///
/// assert_eq!(stream.by_ref().count(), 3);
/// assert_eq!(stream.summary().decode_errors, 1);
/// ```
pub struct RecordStream<I> {
    packets: I,
    decoder: PacketDecoder,
    pipeline: FilterPipeline,
    summary: Summary,
    index: usize,
}

impl<I, B> RecordStream<I>
where
    I: Iterator<Item = B>,
    B: AsRef<[u8]>,
{
    pub fn new(packets: I, decoder: PacketDecoder, pipeline: FilterPipeline) -> Self {
        RecordStream {
            packets,
            decoder,
            pipeline,
            summary: Summary::default(),
            index: 0,
        }
    }

    /// Counts for the packets consumed so far.
    #[must_use]
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    #[must_use]
    pub fn into_summary(self) -> Summary {
        self.summary
    }
}

impl<I, B> Iterator for RecordStream<I>
where
    I: Iterator<Item = B>,
    B: AsRef<[u8]>,
{
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let packet = self.packets.next()?;
            let index = self.index;
            self.index += 1;

            let record = match self.decoder.decode_at(packet.as_ref(), index) {
                Ok(record) => record,
                Err(err) => {
                    debug!(index, %err, "skipping undecodable packet");
                    self.summary.add_decode_error();
                    self.pipeline.skip();
                    continue;
                }
            };

            let decision = self.pipeline.evaluate(&record);
            self.summary.add(&decision);
            match decision {
                FilterDecision::Accept => {
                    trace!(index, time_ms = record.time_ms(), "accepted");
                    return Some(record);
                }
                FilterDecision::Reject(rejection) => {
                    debug!(index, %rejection, "dropping packet");
                }
            }
        }
    }
}

/// Convenience for decoding an in-memory buffer of concatenated packets.
pub fn decode_records(
    data: &[u8],
    decoder: PacketDecoder,
    pipeline: FilterPipeline,
) -> RecordStream<std::slice::Chunks<'_, u8>> {
    RecordStream::new(data.chunks(PACKET_LEN), decoder, pipeline)
}

pub struct PacketReaderIter<R>
where
    R: Read,
{
    reader: R,
    done: bool,
}

impl<R> Iterator for PacketReaderIter<R>
where
    R: Read,
{
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = Vec::with_capacity(PACKET_LEN);
        match (&mut self.reader)
            .take(PACKET_LEN as u64)
            .read_to_end(&mut buf)
        {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                // a short read only happens at EOF
                if n < PACKET_LEN {
                    self.done = true;
                }
                Some(Ok(buf))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Return an iterator of raw packet buffers read from a stream of concatenated packets.
///
/// Every buffer is [PACKET_LEN] bytes except possibly the last, which holds whatever
/// trailing bytes remain and will fail to decode.
///
/// # Example
/// ```
/// use loratlm::read_packets;
///
/// let dat: &[u8] = &[0u8; 42 * 2 + 10];
/// let sizes: Vec<usize> = read_packets(dat).map(|p| p.unwrap().len()).collect();
/// assert_eq!(sizes, vec![42, 42, 10]);
/// ```
pub fn read_packets<R>(reader: R) -> PacketReaderIter<R>
where
    R: Read,
{
    PacketReaderIter {
        reader,
        done: false,
    }
}
