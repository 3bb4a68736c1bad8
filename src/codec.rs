//! Binary intermediate files: encoded sentences, id remapping tables and edge shards
//!
//! Everything is little endian. Files are fixed-width records (or length prefixed ones), so a
//! truncated file can always be told apart from a finished one.
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::errors::*;

/// Bytes in one edge record: two u32 ids and a u64 count
pub const EDGE_RECORD_BYTES: u64 = 16;

/// Append one sentence: its length, then the ids
pub fn write_sentence<W: Write>(writer: &mut W, ids: &[u32]) -> Result<()> {
    writer.write_u32::<LittleEndian>(ids.len() as u32)?;
    for &id in ids {
        writer.write_u32::<LittleEndian>(id)?;
    }
    Ok(())
}

/// Read every sentence of an encoded text file
///
/// Files are per corpus document, so holding one in memory is fine.
pub fn read_sentences<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u32>>> {
    let path = path.as_ref();
    let content = fs::read(path)?;
    let end = content.len() as u64;
    let mut cursor = Cursor::new(content);
    let mut sentences = vec![];
    while cursor.position() < end {
        let truncated = || Error::MergeInconsistency(format!(
            "encoded text {} is truncated", path.display()));
        let len = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())? as usize;
        if cursor.position() + 4 * len as u64 > end {
            return Err(truncated());
        }
        let mut ids = Vec::with_capacity(len);
        for _ in 0..len {
            ids.push(cursor.read_u32::<LittleEndian>()?);
        }
        sentences.push(ids);
    }
    Ok(sentences)
}

/// Write a local-id to global-id table
pub fn write_remap<P: AsRef<Path>>(path: P, table: &[u32]) -> Result<()> {
    let mut out = Vec::with_capacity(table.len() * 4);
    for &id in table {
        out.write_u32::<LittleEndian>(id)?;
    }
    fs::write(path, out)?;
    Ok(())
}

pub fn read_remap<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let content = fs::read(path)
        .map_err(|e| Error::MissingFile("id remapping table (run wordprocessing first)", Some(e)))?;
    if content.len() % 4 != 0 {
        return Err(Error::MergeInconsistency(format!(
            "remapping table {} is truncated", path.display())));
    }
    let mut cursor = Cursor::new(content);
    let mut table = vec![];
    for _ in 0..cursor.get_ref().len() / 4 {
        table.push(cursor.read_u32::<LittleEndian>()?);
    }
    Ok(table)
}

#[inline]
pub fn write_edge<W: Write>(writer: &mut W, a: u32, b: u32, count: u64) -> Result<()> {
    writer.write_u32::<LittleEndian>(a)?;
    writer.write_u32::<LittleEndian>(b)?;
    writer.write_u64::<LittleEndian>(count)?;
    Ok(())
}

/// Stream the records of one edge shard file
pub struct EdgeReader {
    reader: BufReader<File>,
    remaining: u64,
}

impl EdgeReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len % EDGE_RECORD_BYTES != 0 {
            return Err(Error::MergeInconsistency(format!(
                "edge shard {} is truncated ({} bytes is not a whole number of records)",
                path.display(), len)));
        }
        Ok(EdgeReader {
            reader: BufReader::with_capacity(1 << 16, file),
            remaining: len / EDGE_RECORD_BYTES,
        })
    }

    fn read_record(&mut self) -> Result<(u32, u32, u64)> {
        let mut record = [0u8; EDGE_RECORD_BYTES as usize];
        self.reader.read_exact(&mut record)?;
        let mut cursor = Cursor::new(&record[..]);
        Ok((cursor.read_u32::<LittleEndian>()?,
            cursor.read_u32::<LittleEndian>()?,
            cursor.read_u64::<LittleEndian>()?))
    }
}

impl Iterator for EdgeReader {
    type Item = Result<(u32, u32, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.read_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    #[test]
    fn sentences_keep_their_boundaries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0000_000000.enc");
        let mut buf = vec![];
        write_sentence(&mut buf, &[0, 1, 2]).unwrap();
        write_sentence(&mut buf, &[]).unwrap();
        write_sentence(&mut buf, &[3, 1]).unwrap();
        fs::write(&path, &buf).unwrap();
        assert_eq!(read_sentences(&path).unwrap(), vec![vec![0, 1, 2], vec![], vec![3, 1]]);

        fs::write(&path, &buf[..buf.len() - 2]).unwrap();
        match read_sentences(&path) {
            Err(Error::MergeInconsistency(_)) => {}
            other => panic!("truncation not noticed: {:?}", other),
        }
    }

    #[test]
    fn truncated_shards_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d001_s0000_p0000.edges");
        {
            let mut out = File::create(&path).unwrap();
            write_edge(&mut out, 1, 2, 3).unwrap();
            write_edge(&mut out, 2, 5, 1).unwrap();
        }
        let records: Vec<_> = EdgeReader::open(&path).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(records, vec![(1, 2, 3), (2, 5, 1)]);

        OpenOptions::new().append(true).open(&path).unwrap().write_all(&[1, 2, 3]).unwrap();
        assert!(EdgeReader::open(&path).is_err());
    }

    #[test]
    fn remap_tables_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0001.remap");
        write_remap(&path, &[4, 0, 2]).unwrap();
        assert_eq!(read_remap(&path).unwrap(), vec![4, 0, 2]);
    }
}
