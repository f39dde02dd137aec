//! I/O helpers for reading delimited input and writing SQL scripts.
//!
//! - **Delimiter resolution**: extension-based detection (`.tsv` → tab,
//!   anything else → comma) with manual override.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader/writer construction**: strict field counts and lenient quotes
//!   on input; on-demand quoting for the load block.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{ConvertError, ConvertResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Reader that takes the first record as the header and rejects ragged rows.
/// Quote handling stays lenient: stray quotes inside fields are kept literally.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> ConvertResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| ConvertError::io(path, err))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn create_output_file(path: &Path) -> ConvertResult<BufWriter<File>> {
    let file = File::create(path).map_err(|err| ConvertError::io(path, err))?;
    Ok(BufWriter::new(file))
}

/// CSV writer for load data: comma separated, fields quoted only when needed.
pub fn open_load_writer<W>(writer: W) -> csv::Writer<W>
where
    W: Write,
{
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_CSV_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

/// Decodes one field. Byte-order marks are data here; only
/// [`decode_headers`] strips one from the start of the file.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Like [`decode_record`], but drops a byte-order mark for `encoding` from
/// the first field, where it marks the start of the file.
pub fn decode_headers(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let field = if idx == 0 {
                strip_bom(field, encoding)
            } else {
                field
            };
            decode_bytes(field, encoding)
        })
        .collect()
}

fn strip_bom<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> &'a [u8] {
    match Encoding::for_bom(bytes) {
        Some((bom_encoding, length)) if bom_encoding == encoding => &bytes[length..],
        _ => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn tsv_extension_selects_tab() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.TSV"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("not-an-encoding")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some(" latin1 ")).unwrap(), WINDOWS_1252);
    }

    #[test]
    fn reader_tolerates_stray_quotes() {
        let data = "a,b\nsay \"hi\",2\n";
        let mut reader = open_csv_reader(data.as_bytes(), b',');
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "say \"hi\"");
    }

    #[test]
    fn reader_rejects_ragged_rows() {
        let data = "a,b\n1,2,3\n";
        let mut reader = open_csv_reader(data.as_bytes(), b',');
        assert!(reader.records().next().unwrap().is_err());
    }

    #[test]
    fn invalid_utf8_fails_to_decode() {
        assert!(decode_bytes(&[0xff, 0xfe], UTF_8).is_err());
        assert_eq!(decode_bytes(&[0xe9], WINDOWS_1252).unwrap(), "é");
    }

    #[test]
    fn fields_keep_bom_like_bytes() {
        assert_eq!(
            decode_bytes(b"\xff\xfeA", WINDOWS_1252).unwrap(),
            "\u{ff}\u{fe}A"
        );
        assert_eq!(
            decode_bytes(b"\xef\xbb\xbfx", WINDOWS_1252).unwrap(),
            "\u{ef}\u{bb}\u{bf}x"
        );
    }

    #[test]
    fn headers_drop_only_a_matching_leading_bom() {
        let record =
            csv::ByteRecord::from(vec![&b"\xef\xbb\xbfid"[..], &b"\xef\xbb\xbfname"[..]]);
        assert_eq!(
            decode_headers(&record, UTF_8).unwrap(),
            vec!["id", "\u{feff}name"]
        );
        assert_eq!(
            decode_headers(&record, WINDOWS_1252).unwrap()[0],
            "\u{ef}\u{bb}\u{bf}id"
        );
    }
}
