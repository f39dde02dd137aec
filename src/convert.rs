//! Two-pass conversion of one CSV table into a PostgreSQL script.
//!
//! Pass 1 feeds every value of every row to its column's
//! [`TypeClassifier`]; only after the whole table has been observed are the
//! column types resolved. Pass 2 re-renders every value under the resolved
//! type for the `copy ... from stdin` block. The script is assembled in
//! memory and written in one go, so a failing table never leaves a
//! half-written script behind.

use std::{
    collections::HashSet,
    fmt::Write as _,
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    cli::ConvertArgs,
    config::ConvertOptions,
    error::{ConvertError, ConvertResult},
    inference::{ResolvedColumnType, TypeClassifier},
    io_utils, manifest, naming,
    table::{self, AlignedLine},
};

/// End-of-data marker for `copy ... from stdin`.
pub const END_OF_DATA: &str = "\\.";

/// A fully loaded delimited table: header cells plus positional rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of converting one source file.
#[derive(Debug, Clone)]
pub struct ConvertedTable {
    pub source: PathBuf,
    pub script: PathBuf,
    pub table_name: String,
    pub columns: Vec<String>,
    pub types: Vec<ResolvedColumnType>,
    pub rows: usize,
}

pub fn execute(args: &ConvertArgs) -> Result<()> {
    let options = ConvertOptions::from_args(args)?;
    let converted = convert_all(&args.inputs, &options)?;
    manifest::write_manifest(&options.manifest, &converted, &options)
        .with_context(|| format!("Writing manifest {:?}", options.manifest))?;
    info!(
        "Converted {} of {} file(s); manifest written to {:?}",
        converted.len(),
        args.inputs.len(),
        options.manifest
    );
    Ok(())
}

/// Converts every input in order. A table that cannot be read or parsed is
/// logged and skipped; an invariant violation stops the run.
pub fn convert_all(
    inputs: &[PathBuf],
    options: &ConvertOptions,
) -> ConvertResult<Vec<ConvertedTable>> {
    convert_each(inputs, options, convert_file)
}

/// Batch loop behind [`convert_all`]. An input whose script would overwrite
/// the manifest or an earlier input's script is skipped before conversion.
fn convert_each<F>(
    inputs: &[PathBuf],
    options: &ConvertOptions,
    mut convert: F,
) -> ConvertResult<Vec<ConvertedTable>>
where
    F: FnMut(&Path, &ConvertOptions) -> ConvertResult<ConvertedTable>,
{
    let mut claimed = HashSet::from([comparable_path(&options.manifest)]);
    let mut converted = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = ensure_unclaimed(input, &claimed).and_then(|()| convert(input, options));
        match result {
            Ok(table) => {
                claimed.insert(comparable_path(&table.script));
                converted.push(table);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => warn!("Failed to handle {:?}: {err}", input),
        }
    }
    Ok(converted)
}

fn ensure_unclaimed(source: &Path, claimed: &HashSet<PathBuf>) -> ConvertResult<()> {
    let script = script_path(source)?;
    if claimed.contains(&comparable_path(&script)) {
        return Err(ConvertError::format(
            source,
            format!(
                "script {:?} would overwrite the manifest or an earlier script",
                script
            ),
        ));
    }
    Ok(())
}

/// Lexically absolute form of `path`, so `a.sql` and `./a.sql` compare equal.
fn comparable_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn convert_file(source: &Path, options: &ConvertOptions) -> ConvertResult<ConvertedTable> {
    let table_name = naming::derive_table_name(source);
    if table_name.is_empty() {
        return Err(ConvertError::format(
            source,
            "file name does not yield a table name",
        ));
    }
    let script = script_path(source)?;
    let delimiter = io_utils::resolve_input_delimiter(source, options.delimiter);
    info!(
        "Converting '{}' -> '{}' (delimiter '{}')",
        source.display(),
        script.display(),
        crate::printable_delimiter(delimiter)
    );

    let table = load_table(source, delimiter, options.encoding)?;
    let identifiers = naming::derive_column_identifiers(&table.headers);
    let types = classify_columns(&table);
    for (identifier, resolved) in identifiers.iter().zip(&types) {
        debug!("{table_name}.{identifier}: {}", resolved.column_definition());
    }

    let mut text = emit_preamble(source);
    text.push_str(&emit_schema(
        &table,
        &table_name,
        &identifiers,
        &types,
        options.clean,
    ));
    text.push('\n');
    text.push_str(&emit_load_block(&table, &table_name, &identifiers, &types)?);
    text.push_str("\ncommit;\n\n");
    write_script(&script, &text)?;

    info!(
        "Wrote {} row(s) across {} column(s) to {:?}",
        table.row_count(),
        table.column_count(),
        script
    );
    Ok(ConvertedTable {
        source: source.to_path_buf(),
        script,
        table_name,
        columns: identifiers,
        types,
        rows: table.row_count(),
    })
}

/// The script lives next to its source with a `.sql` extension.
pub fn script_path(source: &Path) -> ConvertResult<PathBuf> {
    let script = source.with_extension("sql");
    if script == source {
        return Err(ConvertError::format(
            source,
            "input already has a .sql extension",
        ));
    }
    Ok(script)
}

pub fn load_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> ConvertResult<Table> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    read_table(&mut reader, path, encoding)
}

/// Reads the header and every record. `path` only labels errors.
pub fn read_table<R: Read>(
    reader: &mut csv::Reader<R>,
    path: &Path,
    encoding: &'static Encoding,
) -> ConvertResult<Table> {
    let header_record = reader
        .byte_headers()
        .map_err(|err| ConvertError::from_csv(path, err))?
        .clone();
    if header_record.is_empty() {
        return Err(ConvertError::format(path, "missing header row"));
    }
    let headers = io_utils::decode_headers(&header_record, encoding)
        .map_err(|err| ConvertError::format(path, format!("header: {err}")))?;

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(ConvertError::from_csv(path, err)),
        }
        let row = io_utils::decode_record(&record, encoding).map_err(|err| {
            ConvertError::format(path, format!("row {}: {err}", rows.len() + 2))
        })?;
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

/// Runs pass 1 over the whole table and resolves every column.
pub fn classify_columns(table: &Table) -> Vec<ResolvedColumnType> {
    let mut classifiers = vec![TypeClassifier::new(); table.column_count()];
    for row in &table.rows {
        for (classifier, value) in classifiers.iter_mut().zip(row) {
            classifier.observe(value);
        }
    }
    classifiers.iter().map(TypeClassifier::resolve).collect()
}

pub fn emit_preamble(source: &Path) -> String {
    format!(
        "-- -*-sql-*-\n-- Created from {}\n\nbegin;\n\n",
        table::single_line(&source.display().to_string())
    )
}

/// `create table` statement (optionally preceded by a drop) with aligned
/// column definitions and the original header as a trailing comment.
pub fn emit_schema(
    table: &Table,
    table_name: &str,
    identifiers: &[String],
    types: &[ResolvedColumnType],
    clean: bool,
) -> String {
    let mut output = String::new();
    if clean {
        let _ = writeln!(output, "drop table if exists {table_name};");
    }
    let _ = writeln!(output, "create table {table_name} (");
    let last = identifiers.len().saturating_sub(1);
    let lines = identifiers
        .iter()
        .zip(types)
        .zip(&table.headers)
        .enumerate()
        .map(|(idx, ((identifier, resolved), header))| {
            let separator = if idx == last { "" } else { "," };
            AlignedLine::new(
                vec![
                    String::new(),
                    identifier.clone(),
                    format!("{}{separator}", resolved.column_definition()),
                ],
                format!("-- {}", table::single_line(header)),
            )
        })
        .collect::<Vec<_>>();
    output.push_str(&table::render_aligned(&lines));
    output.push_str(");\n");
    output
}

/// `copy ... from stdin csv header` followed by a header record, every row
/// re-rendered under its column type, and the end-of-data marker.
pub fn emit_load_block(
    table: &Table,
    table_name: &str,
    identifiers: &[String],
    types: &[ResolvedColumnType],
) -> ConvertResult<String> {
    let copy_line = format!(
        "copy {table_name} ({}) from stdin csv header;\n",
        identifiers.iter().join(", ")
    );
    let mut writer = io_utils::open_load_writer(copy_line.into_bytes());
    writer
        .write_record(identifiers)
        .map_err(|err| ConvertError::from_csv(table_name, err))?;
    for row in &table.rows {
        let fields = row
            .iter()
            .zip(types)
            .enumerate()
            .map(|(column, (raw, resolved))| resolved.normalize(column, raw))
            .collect::<ConvertResult<Vec<_>>>()?;
        writer = write_load_record(writer, &fields, table_name)?;
    }
    let mut buffer = writer
        .into_inner()
        .map_err(|err| into_inner_error(table_name, &err))?;
    buffer.extend_from_slice(END_OF_DATA.as_bytes());
    buffer.push(b'\n');
    String::from_utf8(buffer).map_err(|err| ConvertError::format(table_name, err.to_string()))
}

/// A one-field record needs care: an empty field must stay an empty line
/// (NULL to `copy`), and a lone `\.` must be quoted so it does not end the data.
fn write_load_record(
    mut writer: csv::Writer<Vec<u8>>,
    fields: &[String],
    table_name: &str,
) -> ConvertResult<csv::Writer<Vec<u8>>> {
    let raw_line: &[u8] = match fields {
        [single] if single.is_empty() => b"\n",
        [single] if single == END_OF_DATA => b"\"\\.\"\n",
        _ => {
            writer
                .write_record(fields)
                .map_err(|err| ConvertError::from_csv(table_name, err))?;
            return Ok(writer);
        }
    };
    let mut buffer = writer
        .into_inner()
        .map_err(|err| into_inner_error(table_name, &err))?;
    buffer.extend_from_slice(raw_line);
    Ok(io_utils::open_load_writer(buffer))
}

fn into_inner_error<W>(table_name: &str, err: &csv::IntoInnerError<W>) -> ConvertError {
    let source = err.error();
    ConvertError::io(table_name, io::Error::new(source.kind(), source.to_string()))
}

fn write_script(path: &Path, text: &str) -> ConvertResult<()> {
    let mut writer = io_utils::create_output_file(path)?;
    let written = writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush());
    if let Err(err) = written {
        drop(writer);
        if let Err(remove_err) = fs::remove_file(path) {
            warn!("Could not remove partial script {:?}: {remove_err}", path);
        }
        return Err(ConvertError::io(path, err));
    }
    Ok(())
}
