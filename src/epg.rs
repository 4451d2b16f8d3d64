//! XMLTV guide validation and summary.
//!
//! The archived `epg.xml` artifact keeps the provider's XML verbatim; this
//! module only checks that the guide is well-formed and counts its contents.
//! Streaming parse, so multi-megabyte guides never sit in a DOM. Handles
//! gzip-compressed bodies (some providers compress regardless of request
//! headers).

use std::io::Read;

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Counts extracted from a guide during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgSummary {
    pub channel_count: usize,
    pub programme_count: usize,
}

/// Return the guide as plain XML bytes, decompressing when gzipped.
pub fn into_plain_xml(body: Vec<u8>) -> Result<Vec<u8>, String> {
    if body.starts_with(&GZIP_MAGIC) {
        let mut xml = Vec::with_capacity(body.len() * 4);
        GzDecoder::new(body.as_slice())
            .read_to_end(&mut xml)
            .map_err(|e| format!("gzip decode failed: {e}"))?;
        Ok(xml)
    } else {
        Ok(body)
    }
}

/// Validate an XMLTV guide and count its channels and programmes.
/// Accepts plain or gzip-compressed input.
pub fn parse_summary(body: &[u8]) -> Result<EpgSummary, String> {
    if body.starts_with(&GZIP_MAGIC) {
        let plain = into_plain_xml(body.to_vec())?;
        return summarize(&plain);
    }
    summarize(body)
}

fn summarize(xml: &[u8]) -> Result<EpgSummary, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::with_capacity(8192);
    let mut channels = 0usize;
    let mut programmes = 0usize;
    let mut saw_tv_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"tv" => saw_tv_root = true,
                b"channel" => channels += 1,
                b"programme" => programmes += 1,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_tv_root {
        return Err("missing <tv> root element".to_string());
    }
    Ok(EpgSummary {
        channel_count: channels,
        programme_count: programmes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1">
    <display-name>BBC One</display-name>
  </channel>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1">
    <title>News at Noon</title>
  </programme>
  <programme start="20240115130000 +0000" stop="20240115140000 +0000" channel="bbc1">
    <title>Afternoon Show</title>
  </programme>
</tv>"#;

    #[test]
    fn counts_channels_and_programmes() {
        let summary = parse_summary(SAMPLE.as_bytes()).expect("valid guide");
        assert_eq!(summary.channel_count, 1);
        assert_eq!(summary.programme_count, 2);
    }

    #[test]
    fn gzipped_guides_are_decompressed() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let summary = parse_summary(&compressed).expect("gzipped guide");
        assert_eq!(summary.programme_count, 2);

        let plain = into_plain_xml(compressed).expect("decompress");
        assert_eq!(plain, SAMPLE.as_bytes());
    }

    #[test]
    fn plain_xml_passes_through_untouched() {
        let plain = into_plain_xml(SAMPLE.as_bytes().to_vec()).expect("plain");
        assert_eq!(plain, SAMPLE.as_bytes());
    }

    #[test]
    fn non_xmltv_payload_is_rejected() {
        assert!(parse_summary(b"<html><body>login</body></html>").is_err());
        assert!(parse_summary(b"{\"error\": \"not xml\"}").is_err());
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let broken = b"<tv><channel id=\"x\"></programme></tv>";
        assert!(parse_summary(broken).is_err());
    }
}
