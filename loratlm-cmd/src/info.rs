use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use loratlm::{
    filter::{FilterConfig, FilterPipeline, Summary},
    packet::PacketDecoder,
    read_packets, RecordStream,
};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs::File,
    io::{stdout, BufReader, Write},
    path::{Path, PathBuf},
};

use crate::decode::check_input;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    size: u64,
    first_time_ms: Option<u32>,
    last_time_ms: Option<u32>,
    summary: Summary,
}

fn summarize(fpath: &Path, decoder: PacketDecoder, config: FilterConfig) -> Result<Info> {
    let size = check_input(fpath)?;
    let reader = BufReader::new(File::open(fpath).context("opening input")?);
    let pipeline = FilterPipeline::new(config).context("invalid filter config")?;

    let mut read_err = None;
    let packets = read_packets(reader)
        .map_while(|r| r.map_err(|err| read_err = Some(err)).ok());
    let mut stream = RecordStream::new(packets, decoder, pipeline);
    let mut first_time_ms = None;
    let mut last_time_ms = None;
    for record in stream.by_ref() {
        first_time_ms.get_or_insert(record.time_ms());
        last_time_ms = Some(record.time_ms());
    }
    let summary = stream.into_summary();
    if let Some(err) = read_err {
        return Err(err).context("reading input");
    }

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        size,
        first_time_ms,
        last_time_ms,
        summary,
    })
}

/// Report the decode and filter summary of each input. Inputs are processed in
/// parallel, each with its own pipeline.
pub fn info(
    inputs: &[PathBuf],
    format: &Format,
    decoder: PacketDecoder,
    config: &FilterConfig,
) -> Result<()> {
    let infos = inputs
        .par_iter()
        .map(|fpath| {
            summarize(fpath, decoder, config.clone()).with_context(|| format!("{fpath:?}"))
        })
        .collect::<Result<Vec<Info>>>()?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &infos).context("serializing to json")
        }
        Format::Text => {
            let mut out = stdout();
            for info in &infos {
                let data = render_text(info).context("serializing info")?;
                out.write_all(data.as_bytes()).context("writing to stdout")?;
            }
            Ok(())
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("compiling template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
==============================================================
Size:          {{ size }} bytes
First:         {{ first_time_ms }} ms
Last:          {{ last_time_ms }} ms
Packets:       {{ summary.packets }}
Decode errors: {{ summary.decode_errors }}
Decoded:       {{ summary.decoded }}
Accepted:      {{ summary.accepted }}
--------------------------------------------------------------
Rule                                                   Dropped
--------------------------------------------------------------
{{ #each summary.rejected }}{{ @key }}{{ lpad 55 this }}
{{/each }}{{ #each summary.out_of_range }}  {{ @key }}{{ lpad 53 this }}
{{/each }}
";

#[cfg(test)]
mod tests {
    use super::*;
    use loratlm::packet::PACKET_LEN;

    #[test]
    fn summarize_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut data = vec![0u8; PACKET_LEN * 3];
        data[PACKET_LEN + 2] = 10;
        data[2 * PACKET_LEN + 2] = 5;
        file.write_all(&data).unwrap();

        let config = FilterConfig::from_toml_str("[time]\n").unwrap();
        let info = summarize(file.path(), PacketDecoder::default(), config).unwrap();

        assert_eq!(info.size, 126);
        assert_eq!(info.first_time_ms, Some(0));
        assert_eq!(info.last_time_ms, Some(10));
        assert_eq!(info.summary.accepted, 2);
        assert_eq!(info.summary.rejected_total(), 1);

        let text = render_text(&info).unwrap();
        assert!(text.contains("Accepted:      2"), "{text}");
        assert!(text.contains("TimeWentBackward"), "{text}");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["summary"]["rejected"]["TimeWentBackward"], 1);
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FilterConfig::default();
        assert!(summarize(dir.path(), PacketDecoder::default(), config.clone()).is_err());
        assert!(info(
            &[dir.path().to_path_buf()],
            &Format::Json,
            PacketDecoder::default(),
            &config
        )
        .is_err());
    }
}
