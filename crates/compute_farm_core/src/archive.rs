use std::io::{Cursor, Read, Write};

use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOCATED_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ShardCodecError {
    #[error("shard archive is unreadable: {0}")]
    Archive(#[from] ZipError),
    #[error("shard archive i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("shard archive contains no entries")]
    EmptyArchive,
    #[error("shard entry '{entry}' is not valid UTF-8: {source}")]
    Decode {
        entry: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Splits text into lines without their `\n` / `\r\n` terminators.
pub fn split_text_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

pub fn join_lines(lines: &[String]) -> String {
    let capacity = lines.iter().map(|line| line.len() + 1).sum();
    let mut text = String::with_capacity(capacity);
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Zips `lines` into a single deflated text entry.
pub fn encode_shard(entry_name: &str, lines: &[String]) -> Result<Vec<u8>, ShardCodecError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    zip.write_all(join_lines(lines).as_bytes())?;
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn decode_shard(body: &[u8]) -> Result<Vec<String>, ShardCodecError> {
    let mut archive = ZipArchive::new(Cursor::new(body))?;
    if archive.len() == 0 {
        return Err(ShardCodecError::EmptyArchive);
    }

    let mut entry = archive.by_index(0)?;
    let entry_name = entry.name().to_string();
    let reserved = entry.size().min(MAX_PREALLOCATED_BYTES);
    let mut raw = Vec::with_capacity(usize::try_from(reserved).unwrap_or(0));
    entry.read_to_end(&mut raw)?;

    let text = String::from_utf8(raw).map_err(|source| ShardCodecError::Decode {
        entry: entry_name,
        source,
    })?;
    Ok(split_text_lines(&text))
}
