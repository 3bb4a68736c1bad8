//! Window extractor: count word pairs inside sliding windows
//!
//! Counts are kept per exact distance between the two words. The graph for window size `w` is
//! the sum over distances `1..=w`, which the aggregator computes. Buffered counts are flushed to
//! shard files one distance at a time, so a worker never has more than `shards` files open.
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::codec;
use crate::errors::*;
use crate::farm::{new_farm, pack_pair, unpack_pair, FarmMap, ShardHash};
use crate::layout::{self, Layout, EDGES_EXTENSION};

/// Settings shared by every extractor worker, and read back by the aggregator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub max_window_size: usize,
    pub shards: usize,
    pub workers: usize,
    pub shard_hash: String,
    /// Size and fingerprint of the merged dictionary the shard ids refer to
    pub vocabulary: usize,
    pub dictionary: u64,
}

impl Manifest {
    pub fn save(&self, layout: &Layout) -> Result<()> {
        let mut out = BufWriter::new(File::create(layout.manifest())?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn load(layout: &Layout) -> Result<Self> {
        let file = File::open(layout.manifest())
            .map_err(|e| Error::MissingFile("edge manifest (run sentenceprocessing first)", Some(e)))?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Pair counts of one window extraction worker, kept per distance
pub struct PairCounter {
    max_window_size: usize,
    by_distance: Vec<FarmMap<u64, u64>>,
}

impl PairCounter {
    pub fn new(max_window_size: usize) -> Self {
        PairCounter {
            max_window_size,
            by_distance: (0..max_window_size).map(|_| new_farm()).collect(),
        }
    }

    /// Count every pair within `max_window_size` positions of each other in one sentence
    ///
    /// Pairs of the same word are skipped. Nothing crosses the end of the sentence.
    pub fn add_sentence(&mut self, ids: &[u32]) {
        for (i, &left) in ids.iter().enumerate() {
            let end = ids.len().min(i.saturating_add(self.max_window_size).saturating_add(1));
            for (j, &right) in ids.iter().enumerate().take(end).skip(i + 1) {
                if left == right {
                    continue;
                }
                *self.by_distance[j - i - 1].entry(pack_pair(left, right)).or_insert(0) += 1;
            }
        }
    }

    /// Distinct (distance, pair) entries currently buffered
    pub fn len(&self) -> usize {
        self.by_distance.iter().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of a pair at an exact distance (1-based)
    pub fn get(&self, distance: usize, a: u32, b: u32) -> u64 {
        self.by_distance.get(distance - 1)
            .and_then(|m| m.get(&pack_pair(a, b)))
            .cloned()
            .unwrap_or(0)
    }

    /// Append everything buffered to this worker's shard files and empty the buffers
    ///
    /// Returns the number of records written.
    pub fn flush(&mut self, layout: &Layout, worker: usize, shards: usize, hash: ShardHash)
        -> Result<usize> {
        let mut written = 0;
        for (d, counts) in self.by_distance.iter_mut().enumerate() {
            if counts.is_empty() {
                continue;
            }
            // At most `shards` handles, all closed before the next distance
            let mut writers: Vec<Option<BufWriter<File>>> = (0..shards).map(|_| None).collect();
            for (key, count) in counts.drain() {
                let shard = hash.shard(key, shards);
                if writers[shard].is_none() {
                    let file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(layout.shard(d + 1, shard, worker))?;
                    writers[shard] = Some(BufWriter::new(file));
                }
                if let Some(ref mut writer) = writers[shard] {
                    let (a, b) = unpack_pair(key);
                    codec::write_edge(writer, a, b, count)?;
                    written += 1;
                }
            }
            for writer in writers.iter_mut().filter_map(Option::as_mut) {
                writer.flush()?;
            }
        }
        Ok(written)
    }
}

/// An encoded text and the builder worker whose dictionary it uses
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFile {
    pub path: PathBuf,
    pub dictionary: usize,
}

/// Every encoded text under the layout, sorted by name
pub fn encoded_files(layout: &Layout) -> Result<Vec<EncodedFile>> {
    layout::files_with_extension(&layout.dicts(), layout::ENCODED_EXTENSION)?
        .into_iter()
        .map(|path| match layout::parse_encoded_name(&path) {
            Some((dictionary, _)) => Ok(EncodedFile { path, dictionary }),
            None => Err(Error::MergeInconsistency(format!(
                "can't tell which dictionary encoded {}", path.display()))),
        })
        .collect()
}

/// Load the remapping table of every builder worker, indexed by worker
pub fn load_remaps(layout: &Layout) -> Result<FarmMap<usize, Vec<u32>>> {
    let mut remaps = new_farm();
    for path in layout::files_with_extension(&layout.dicts(), layout::REMAP_EXTENSION)? {
        if let Some(worker) = layout::parse_dict_name(&path) {
            remaps.insert(worker, codec::read_remap(&path)?);
        }
    }
    Ok(remaps)
}

/// What one extractor worker did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub worker: usize,
    pub files: usize,
    pub sentences: usize,
    pub records: usize,
}

pub struct WindowExtractor<'a> {
    pub layout: &'a Layout,
    pub max_window_size: usize,
    pub shards: usize,
    pub hash: ShardHash,
    /// Flush once this many distinct pairs are buffered
    pub flush_pairs: usize,
}

impl<'a> WindowExtractor<'a> {
    /// Count the pairs of one worker's batch of encoded texts
    pub fn extract(&self, worker: usize, batch: &[EncodedFile], remaps: &FarmMap<usize, Vec<u32>>)
        -> Result<ExtractReport> {
        let mut counter = PairCounter::new(self.max_window_size);
        let mut report = ExtractReport { worker, ..Default::default() };
        for file in batch {
            let remap = remaps.get(&file.dictionary).ok_or_else(|| Error::MergeInconsistency(
                format!("no remapping table for dictionary {} (used by {})",
                    file.dictionary, file.path.display())))?;
            for sentence in codec::read_sentences(&file.path)? {
                let mut ids = Vec::with_capacity(sentence.len());
                for local in sentence {
                    match remap.get(local as usize) {
                        Some(&global) => ids.push(global),
                        None => return Err(Error::MergeInconsistency(format!(
                            "{} uses local id {} but dictionary {} has only {} words",
                            file.path.display(), local, file.dictionary, remap.len()))),
                    }
                }
                counter.add_sentence(&ids);
                report.sentences += 1;
            }
            report.files += 1;
            if counter.len() >= self.flush_pairs {
                report.records += counter.flush(self.layout, worker, self.shards, self.hash)?;
            }
        }
        report.records += counter.flush(self.layout, worker, self.shards, self.hash)?;
        Ok(report)
    }
}

/// Remove shard files and manifest of an earlier extraction
pub fn clear_outputs(layout: &Layout) -> Result<()> {
    let removed = layout::remove_with_extension(&layout.edges(), EDGES_EXTENSION)?;
    if layout.manifest().exists() {
        std::fs::remove_file(layout.manifest())?;
    }
    if removed > 0 {
        info!("Removed {} edge shards left by an earlier extraction", removed);
    }
    Ok(())
}
