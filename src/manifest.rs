//! The manifest script that pulls every generated table script into one
//! `psql` session and optionally unions them into a merge target.

use std::{fmt::Write as _, fs, path::Path};

use itertools::Itertools;
use log::warn;

use crate::{
    config::ConvertOptions,
    convert::ConvertedTable,
    error::{ConvertError, ConvertResult},
};

pub fn render_manifest(tables: &[ConvertedTable], options: &ConvertOptions) -> String {
    let mut output = String::from("-- -*-sql-*-\n");
    for table in tables {
        let _ = writeln!(output, "\\i '{}'", table.script.display());
    }
    let Some(merge) = options.merge.as_deref() else {
        return output;
    };
    if tables.is_empty() {
        warn!("No tables were converted; skipping merge into '{merge}'");
        return output;
    }
    if options.clean {
        let _ = writeln!(output, "drop table if exists {merge};");
    }
    let selects = tables
        .iter()
        .map(|table| format!("select * from {}\n", table.table_name))
        .join("union\n");
    let _ = write!(output, "create table {merge} as\n{selects};");
    output
}

pub fn write_manifest(
    path: &Path,
    tables: &[ConvertedTable],
    options: &ConvertOptions,
) -> ConvertResult<()> {
    fs::write(path, render_manifest(tables, options)).map_err(|err| ConvertError::io(path, err))
}
