use std::path::PathBuf;

use anyhow::Result;
use encoding_rs::{Encoding, UTF_8};

use crate::{cli::ConvertArgs, io_utils};

pub const DEFAULT_MANIFEST: &str = "alltables.sql";

/// Settings shared by every table of a run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Emit `drop table if exists` before every `create table`, merge target included.
    pub clean: bool,
    /// Name of the table that unions every converted table.
    pub merge: Option<String>,
    /// Input delimiter; resolved per file from its extension when unset.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub manifest: PathBuf,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            clean: false,
            merge: None,
            delimiter: None,
            encoding: UTF_8,
            manifest: PathBuf::from(DEFAULT_MANIFEST),
        }
    }
}

impl ConvertOptions {
    pub fn from_args(args: &ConvertArgs) -> Result<Self> {
        let merge = match args.merge.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => None,
        };
        Ok(Self {
            clean: args.clean,
            merge,
            delimiter: args.delimiter,
            encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
            manifest: args
                .manifest
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST)),
        })
    }
}
