use std::io::Write;

use anyhow::{Context, Result};
use loratlm::packet::{Channel, Record};

/// Writes accepted records as `;` delimited CSV in raw transmitted units.
///
/// One column per channel in packet order. The flags column holds the 8 character
/// bit string, bit 0 first.
pub struct CsvExporter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> CsvExporter<W> {
    pub fn new(dest: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(dest);
        writer
            .write_record(Channel::ALL.iter().map(|c| c.name()))
            .context("writing csv header")?;
        Ok(CsvExporter { writer, rows: 0 })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        let row = Channel::ALL.iter().map(|channel| match channel {
            Channel::Flags => record.flags().to_bit_string(),
            _ => record.raw(*channel).to_string(),
        });
        self.writer
            .write_record(row)
            .with_context(|| format!("writing record {}", record.index()))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush remaining output and return the number of rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("flushing csv")?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loratlm::packet::decode;

    #[test]
    fn header_and_row() {
        let mut buf = [0u8; 42];
        // time_ms = 1000, temp_cC = -1
        buf[..5].copy_from_slice(&[0x00, 0x03, 0xe8, 0xff, 0xfc]);
        // flags = 0b1000_0001; bits 262..270
        buf[32] = 0x02;
        buf[33] = 0x04;
        let record = decode(&buf).unwrap();

        let mut out = Vec::new();
        let mut exporter = CsvExporter::new(&mut out).unwrap();
        exporter.write(&record).unwrap();
        assert_eq!(exporter.finish().unwrap(), 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time_ms;temp_cC;pressPa;magX;magY;magZ;accelX;accelY;accelZ;\
             gyroX;gyroY;gyroZ;lat_1e7;lon_1e7;flags;radData0;radData1;radData2;radData3"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1000;-1;0;0;0;0;0;0;0;0;0;0;0;0;10000001;0;0;0;0"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn header_only() {
        let mut out = Vec::new();
        assert_eq!(CsvExporter::new(&mut out).unwrap().finish().unwrap(), 0);
        assert!(String::from_utf8(out).unwrap().starts_with("time_ms;"));
    }
}
