// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Loading [Datasets](Dataset) exported from the marketplace API.
//!
//! A dataset is a single JSON object with `users`, `stores` and `products` arrays,
//! optionally compressed.

use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use crate::market::Dataset;
use crate::Located;

/// Format of the input dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Unknown format - guess the format based on the content
    #[default]
    Unknown,

    /// Force uncompressed JSON
    Json,

    /// Force JSON with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    JsonGz,

    /// Force JSON with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    JsonBz2,
}

impl FileFormat {
    /// Guesses the format from the first bytes of a file.
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(&[0x1F, 0x8B]) {
            Self::JsonGz
        } else if header.starts_with(b"BZh") {
            Self::JsonBz2
        } else {
            Self::Json
        }
    }
}

/// Additional controls for loading a [Dataset].
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Format of the input data.
    pub file_format: FileFormat,

    /// Drop users and stores whose location can't be decoded, instead of only
    /// logging a warning about them.
    pub skip_unlocated: bool,
}

/// Error which can occur when loading a [Dataset].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads a [Dataset] from a reader as per the provided [Options].
///
/// The provided stream will be automatically wrapped in a buffered reader.
pub fn load_dataset_from_io<R: io::Read>(options: &Options, reader: R) -> Result<Dataset, Error> {
    let mut b = io::BufReader::new(reader);

    let file_format = match options.file_format {
        FileFormat::Unknown => {
            let detected = FileFormat::detect(b.fill_buf()?);
            log::debug!("detected dataset format: {:?}", detected);
            detected
        }
        f => f,
    };

    let dataset: Dataset = match file_format {
        FileFormat::Unknown | FileFormat::Json => serde_json::from_reader(b)?,

        FileFormat::JsonGz => {
            let d = flate2::read::MultiGzDecoder::new(b);
            serde_json::from_reader(io::BufReader::new(d))?
        }

        FileFormat::JsonBz2 => {
            let d = bzip2::read::MultiBzDecoder::new(b);
            serde_json::from_reader(io::BufReader::new(d))?
        }
    };

    Ok(post_process(options, dataset))
}

/// Loads a [Dataset] from a file at the provided path as per the provided [Options].
pub fn load_dataset_from_file<P: AsRef<Path>>(
    options: &Options,
    path: P,
) -> Result<Dataset, Error> {
    let f = File::open(path)?;
    load_dataset_from_io(options, f)
}

/// Loads a [Dataset] from a static buffer as per the provided [Options].
pub fn load_dataset_from_buffer(options: &Options, data: &[u8]) -> Result<Dataset, Error> {
    let is_plain = match options.file_format {
        FileFormat::Unknown => FileFormat::detect(data) == FileFormat::Json,
        f => f == FileFormat::Json,
    };

    if is_plain {
        // Fast path is available for in-memory JSON data
        let dataset: Dataset = serde_json::from_slice(data)?;
        Ok(post_process(options, dataset))
    } else {
        // Wrap the buffer in a cursor and use the IO path
        let cursor = io::Cursor::new(data);
        load_dataset_from_io(options, cursor)
    }
}

fn post_process(options: &Options, mut dataset: Dataset) -> Dataset {
    for u in dataset.users.iter().filter(|u| !u.location().is_decodable()) {
        log::warn!("user {}: location can't be decoded", u.id);
    }
    for s in dataset.stores.iter().filter(|s| !s.location().is_decodable()) {
        log::warn!("store {}: location can't be decoded", s.id);
    }

    if options.skip_unlocated {
        dataset.users.retain(|u| u.location().is_decodable());
        dataset.stores.retain(|s| s.location().is_decodable());
    }

    dataset
}
