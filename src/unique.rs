//! Merge many line-oriented files into one file of unique lines
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::errors::*;
use crate::farm::{new_farm_set, FarmSet};

/// Regular files directly in `dir` whose names start with `prefix`, sorted by name
pub fn files_starting_with(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut found = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(prefix));
        if matches && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Write every distinct line of the matching files to `output`, in no particular order
///
/// Lines are opaque records compared byte for byte; only the `\n` terminator is stripped, so a
/// `\r` stays part of its record. If `output` itself matches the prefix it is not read. Returns
/// the number of unique lines written.
pub fn merge_unique_to_single_file<P, Q>(dir: P, prefix: &str, output: Q) -> Result<usize>
    where P: AsRef<Path>, Q: AsRef<Path> {
    let output = output.as_ref();
    let mut lines: FarmSet<Vec<u8>> = new_farm_set();
    for path in files_starting_with(dir.as_ref(), prefix)? {
        if path == output {
            continue;
        }
        let mut reader = BufReader::new(File::open(&path)?);
        let mut line = vec![];
        while reader.read_until(b'\n', &mut line)? > 0 {
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            lines.insert(line.clone());
            line.clear();
        }
    }
    let mut out = BufWriter::new(File::create(output)?);
    for line in &lines {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(lines.len())
}
