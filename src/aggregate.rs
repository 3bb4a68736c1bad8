//! Edge aggregator: merge the shards into one filtered edge list per window size
//!
//! A shard index depends only on the pair, so every (window size, shard) key can be summed
//! independently, in memory proportional to the distinct pairs of that shard. Keys are spread
//! over the worker pool; the per-key results are then concatenated in shard order, so the graph
//! files come out byte-identical no matter how many workers produced the shards.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use rayon::prelude::*;
use rayon::ThreadPool;
use crate::codec::EdgeReader;
use crate::errors::*;
use crate::farm::{new_farm, pack_pair, unpack_pair, FarmMap};
use crate::layout::{self, Layout, EDGES_EXTENSION};
use crate::merger::{self, GlobalDictionary};
use crate::window::Manifest;

/// Shard files by (distance, shard)
pub type ShardIndex = BTreeMap<(usize, usize), Vec<PathBuf>>;

pub fn index_shards(layout: &Layout) -> Result<ShardIndex> {
    let mut index = ShardIndex::new();
    for path in layout::files_with_extension(&layout.edges(), EDGES_EXTENSION)? {
        match layout::parse_shard_name(&path) {
            Some((distance, shard, _worker)) => index.entry((distance, shard)).or_insert_with(Vec::new).push(path),
            None => warn!("Ignoring unexpected file {}", path.display()),
        }
    }
    Ok(index)
}

/// Sum one (window size, shard) key, keeping only pairs inside the vocabulary
///
/// The result is sorted by pair.
pub fn aggregate_shard(index: &ShardIndex, window: usize, shard: usize, cutoff: u32)
    -> Result<Vec<(u32, u32, u64)>> {
    let mut counts: FarmMap<u64, u64> = new_farm();
    for distance in 1..=window {
        let paths = match index.get(&(distance, shard)) {
            Some(paths) => paths,
            None => continue,
        };
        for path in paths {
            for record in EdgeReader::open(path)? {
                let (a, b, count) = record.map_err(|e| Error::MergeInconsistency(
                    format!("reading {}: {}", path.display(), e)))?;
                if a < cutoff && b < cutoff {
                    *counts.entry(pack_pair(a, b)).or_insert(0) += count;
                }
            }
        }
    }
    let mut edges: Vec<(u64, u64)> = counts.into_iter().collect();
    edges.sort_unstable();
    Ok(edges.into_iter()
        .map(|(key, count)| {
            let (a, b) = unpack_pair(key);
            (a, b, count)
        })
        .collect())
}

/// Read one final edge list back, e.g. to inspect it
pub fn read_graph_edges<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<(u32, u32, u64)>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::MissingFile("graph edge list", Some(e)))?;
    let mut edges = vec![];
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(Error::Other(format!(
                "{}:{}: expected three tab separated fields", path.display(), lineno + 1)));
        }
        edges.push((fields[0].parse()?, fields[1].parse()?, fields[2].parse()?));
    }
    Ok(edges)
}

/// What the aggregation produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateReport {
    pub vocabulary: u32,
    /// Number of edges written for each window size, smallest window first
    pub edges: Vec<usize>,
}

pub struct EdgeAggregator<'a> {
    pub layout: &'a Layout,
    pub min_count: u64,
    pub max_vocab_size: usize,
}

impl<'a> EdgeAggregator<'a> {
    /// Write `graph/encoded_edges_count_window_size_<w>.txt` for every window size up to
    /// `max_window_size`, and the filtered vocabulary
    pub fn run(&self, dict: &GlobalDictionary, max_window_size: usize, pool: &ThreadPool)
        -> Result<AggregateReport> {
        let manifest = Manifest::load(self.layout)?;
        if max_window_size > manifest.max_window_size {
            return Err(Error::Configuration(format!(
                "max_window_size is {} but the edge shards were extracted for at most {}",
                max_window_size, manifest.max_window_size)));
        }
        let fingerprint = merger::dictionary_fingerprint(self.layout.merged_dict())?;
        if manifest.vocabulary != dict.len() || manifest.dictionary != fingerprint {
            return Err(Error::MergeInconsistency(format!(
                "the edge shards were counted against another merged dictionary ({} words, \
                now {}); run sentenceprocessing again", manifest.vocabulary, dict.len())));
        }
        let cutoff = dict.vocabulary_cutoff(self.min_count, self.max_vocab_size);
        info!("Keeping {} of {} words (min_count {}, max_vocab_size {})",
            cutoff, dict.len(), self.min_count, self.max_vocab_size);
        dict.save_prefix(self.layout.filtered_vocabulary(), cutoff)?;

        let index = index_shards(self.layout)?;
        let keys: Vec<(usize, usize)> = (1..=max_window_size)
            .flat_map(|w| (0..manifest.shards).map(move |s| (w, s)))
            .collect();
        let written: Vec<(usize, usize)> = pool.install(|| {
            keys.par_iter()
                .map(|&(window, shard)| -> Result<(usize, usize)> {
                    let edges = aggregate_shard(&index, window, shard, cutoff)?;
                    let mut out = BufWriter::new(File::create(self.layout.graph_part(window, shard))?);
                    for &(a, b, count) in &edges {
                        writeln!(out, "{}\t{}\t{}", a, b, count)?;
                    }
                    out.flush()?;
                    debug!("Window {} shard {}: {} edges", window, shard, edges.len());
                    Ok((window, edges.len()))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut edges = vec![0; max_window_size];
        for (window, count) in written {
            edges[window - 1] += count;
        }
        for window in 1..=max_window_size {
            self.concatenate(window, manifest.shards)?;
            info!("Window size {}: {} edges", window, edges[window - 1]);
        }
        Ok(AggregateReport { vocabulary: cutoff, edges })
    }

    /// Join the shard parts of one window size in shard order, removing the parts
    fn concatenate(&self, window: usize, shards: usize) -> Result<()> {
        let mut out = BufWriter::new(File::create(self.layout.graph_edges(window))?);
        for shard in 0..shards {
            let part = self.layout.graph_part(window, shard);
            std::io::copy(&mut File::open(&part)?, &mut out)?;
            fs::remove_file(&part)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Remove graph files of an earlier aggregation, including window sizes no longer asked for
pub fn clear_outputs(layout: &Layout) -> Result<()> {
    for entry in fs::read_dir(layout.graph())? {
        let path = entry?.path();
        let stale = path.file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("encoded_edges_count_window_size_") || n.starts_with("part_w"));
        if stale && path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Remove the edge shards once the graph no longer needs them
pub fn remove_shards(layout: &Layout) -> Result<usize> {
    layout::remove_with_extension(&layout.edges(), EDGES_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_edge;
    use tempfile::TempDir;

    fn shard_file(layout: &Layout, distance: usize, shard: usize, worker: usize, records: &[(u32, u32, u64)]) {
        let mut out = File::create(layout.shard(distance, shard, worker)).unwrap();
        for &(a, b, c) in records {
            write_edge(&mut out, a, b, c).unwrap();
        }
    }

    #[test]
    fn sums_across_workers_and_distances() {
        let out = TempDir::new().unwrap();
        let layout = Layout::new(out.path());
        layout.create_all().unwrap();
        shard_file(&layout, 1, 0, 0, &[(0, 1, 2), (1, 2, 1)]);
        shard_file(&layout, 1, 0, 1, &[(0, 1, 3)]);
        shard_file(&layout, 2, 0, 1, &[(0, 1, 1), (0, 5, 4)]);
        let index = index_shards(&layout).unwrap();

        assert_eq!(aggregate_shard(&index, 1, 0, 10).unwrap(), vec![(0, 1, 5), (1, 2, 1)]);
        assert_eq!(aggregate_shard(&index, 2, 0, 10).unwrap(),
            vec![(0, 1, 6), (0, 5, 4), (1, 2, 1)]);
        // Word 5 and word 2 fall outside a vocabulary of two
        assert_eq!(aggregate_shard(&index, 2, 0, 2).unwrap(), vec![(0, 1, 6)]);
        assert!(aggregate_shard(&index, 2, 1, 10).unwrap().is_empty());
    }

    #[test]
    fn corrupted_shards_fail_the_key() {
        let out = TempDir::new().unwrap();
        let layout = Layout::new(out.path());
        layout.create_all().unwrap();
        fs::write(layout.shard(1, 0, 0), &[0u8; 20]).unwrap();
        let index = index_shards(&layout).unwrap();
        match aggregate_shard(&index, 1, 0, 10) {
            Err(Error::MergeInconsistency(info)) => assert!(info.contains("d001_s0000_p0000")),
            other => panic!("expected an inconsistency, got {:?}", other),
        }
    }
}
