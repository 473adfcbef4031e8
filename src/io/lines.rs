//! Line sources and sinks: local files (compressed or not) and stdio.
//!
//! The path `-` stands for stdin when reading and stdout when writing.

use crate::io::compression::{FinishWrite, auto_detect_reader, auto_detect_writer};
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

/// Lazy line source over a (possibly decompressed) file.
pub type FileLines = Lines<Box<dyn BufRead>>;

const STDIO: &str = "-";

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

/// Open `path` for buffered reading, decompressing by extension or magic bytes.
pub fn open_reader(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let rdr = if is_stdio(path) {
        auto_detect_reader(io::stdin(), path).context("setup decompression for stdin")?
    } else {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?
    };
    Ok(Box::new(BufReader::new(rdr)))
}

/// Lines of `path`, without their terminating newline.
pub fn read_lines(path: impl AsRef<Path>) -> Result<FileLines> {
    Ok(open_reader(path)?.lines())
}

/// Create `path` for writing, compressing by extension.
///
/// Parent directories are created as needed; an existing file is truncated.
/// Call [`FinishWrite::finish`] when done: dropping the writer loses errors
/// from the final flush and compression trailer.
pub fn create_writer(path: impl AsRef<Path>) -> Result<Box<dyn FinishWrite>> {
    let path = path.as_ref();
    if is_stdio(path) {
        return Ok(Box::new(io::BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    auto_detect_writer(f, path).with_context(|| format!("setup compression for {}", path.display()))
}
