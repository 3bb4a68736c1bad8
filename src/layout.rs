//! Where every intermediate and final file lives
//!
//! Names carry the worker that owns them, so two workers never write the same path.
use std::fs;
use std::path::{Path, PathBuf};
use crate::errors::*;

pub const LOCAL_DICT_EXTENSION: &str = "dicloc";
pub const ENCODED_EXTENSION: &str = "enc";
pub const REMAP_EXTENSION: &str = "remap";
pub const EDGES_EXTENSION: &str = "edges";
pub const MERGED_DICT: &str = "dict_merged.tsv";
pub const MANIFEST: &str = "manifest.json";
pub const FILTERED_VOCABULARY: &str = "vocabulary.txt";

#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Layout { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path { &self.root }
    pub fn dicts(&self) -> PathBuf { self.root.join("dicts_and_encoded_texts") }
    pub fn edges(&self) -> PathBuf { self.root.join("edges") }
    pub fn graph(&self) -> PathBuf { self.root.join("graph") }

    pub fn create_all(&self) -> Result<()> {
        for dir in &[self.dicts(), self.edges(), self.graph()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn local_dict(&self, worker: usize) -> PathBuf {
        self.dicts().join(format!("{:04}.{}", worker, LOCAL_DICT_EXTENSION))
    }
    pub fn remap(&self, worker: usize) -> PathBuf {
        self.dicts().join(format!("{:04}.{}", worker, REMAP_EXTENSION))
    }
    pub fn encoded(&self, worker: usize, file: usize) -> PathBuf {
        self.dicts().join(format!("{:04}_{:06}.{}", worker, file, ENCODED_EXTENSION))
    }
    pub fn merged_dict(&self) -> PathBuf { self.dicts().join(MERGED_DICT) }
    pub fn nodes(&self, attribute: &str, worker: usize) -> PathBuf {
        self.dicts().join(format!("nodes_{}_{:04}.txt", attribute, worker))
    }

    pub fn shard(&self, distance: usize, shard: usize, worker: usize) -> PathBuf {
        self.edges().join(format!("d{:03}_s{:04}_p{:04}.{}", distance, shard, worker, EDGES_EXTENSION))
    }
    pub fn manifest(&self) -> PathBuf { self.edges().join(MANIFEST) }

    pub fn graph_edges(&self, window: usize) -> PathBuf {
        self.graph().join(format!("encoded_edges_count_window_size_{}.txt", window))
    }
    pub fn graph_part(&self, window: usize, shard: usize) -> PathBuf {
        self.graph().join(format!("part_w{:03}_s{:04}.tsv", window, shard))
    }
    pub fn filtered_vocabulary(&self) -> PathBuf { self.graph().join(FILTERED_VOCABULARY) }
}

/// Worker that wrote a `.dicloc` or `.remap` file
pub fn parse_dict_name(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// (worker, file index) of an encoded text file
pub fn parse_encoded_name(path: &Path) -> Option<(usize, usize)> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.splitn(2, '_');
    let worker = parts.next()?.parse().ok()?;
    let file = parts.next()?.parse().ok()?;
    Some((worker, file))
}

/// (distance, shard, worker) of an edge shard file
pub fn parse_shard_name(path: &Path) -> Option<(usize, usize, usize)> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.split('_');
    let distance = parts.next()?.strip_prefix('d')?.parse().ok()?;
    let shard = parts.next()?.strip_prefix('s')?.parse().ok()?;
    let worker = parts.next()?.strip_prefix('p')?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((distance, shard, worker))
}

/// Regular files in `dir` with the given extension, sorted by name
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut found = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == extension) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Regular files directly inside `dir`, sorted by name
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::MissingFile("data directory", Some(e)))?;
    let mut found = vec![];
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Delete the files a phase is about to regenerate, so stale ones from an earlier run can't leak in
pub fn remove_with_extension(dir: &Path, extension: &str) -> Result<usize> {
    let stale = files_with_extension(dir, extension)?;
    for path in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale.len())
}

/// Split items into at most `workers` contiguous batches of nearly equal size
pub fn partition<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return vec![];
    }
    let chunksize = (items.len() + workers - 1) / workers;
    items.chunks(chunksize).map(|c| c.to_vec()).collect()
}
