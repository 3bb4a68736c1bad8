//! Vocabulary builder: first pass over the corpus
//!
//! Each worker owns a batch of corpus files and a `LocalDictionary`. Every file is tokenized,
//! filtered and written out as an encoded text of local ids; the dictionary is written once the
//! batch is done. Nothing is shared between workers.
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::codec;
use crate::errors::*;
use crate::farm::{new_farm, FarmMap};
use crate::layout::Layout;
use crate::preprocess::WordPreprocessor;
use crate::source::SentenceSource;

/// Words in first-seen order, with how often each was seen
#[derive(Clone, Debug, Default)]
pub struct LocalDictionary {
    ids: FarmMap<String, u32>,
    words: Vec<String>,
    counts: Vec<u64>,
}

impl LocalDictionary {
    pub fn new() -> Self {
        LocalDictionary { ids: new_farm(), words: vec![], counts: vec![] }
    }

    /// Count one occurrence, returning the word's local id
    pub fn add(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.ids.get(word) {
            self.counts[id as usize] += 1;
            return id;
        }
        let id = self.words.len() as u32;
        self.ids.insert(word.to_string(), id);
        self.words.push(word.to_string());
        self.counts.push(1);
        id
    }

    pub fn len(&self) -> usize { self.words.len() }
    pub fn is_empty(&self) -> bool { self.words.is_empty() }
    pub fn get(&self, word: &str) -> Option<u32> { self.ids.get(word).cloned() }

    /// (word, count) by local id
    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.words.iter().map(String::as_str).zip(self.counts.iter().cloned())
    }

    /// One line per local id: `count<TAB>word`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (word, count) in self.entries() {
            writeln!(out, "{}\t{}", count, word)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::MissingFile("local dictionary", Some(e)))?;
        let mut dict = LocalDictionary::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let bad = |why: &str| Error::MergeInconsistency(format!(
                "{}:{}: {}", path.display(), lineno + 1, why));
            let mut fields = line.splitn(2, '\t');
            let count: u64 = fields.next()
                .and_then(|c| c.parse().ok())
                .ok_or_else(|| bad("expected a count"))?;
            let word = fields.next().filter(|w| !w.is_empty()).ok_or_else(|| bad("expected a word"))?;
            if dict.ids.contains_key(word) {
                return Err(bad("word appears twice"));
            }
            dict.ids.insert(word.to_string(), dict.words.len() as u32);
            dict.words.push(word.to_string());
            dict.counts.push(count);
        }
        Ok(dict)
    }
}

/// What one builder worker did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub worker: usize,
    pub files: usize,
    pub skipped: usize,
    pub sentences: usize,
    pub tokens: usize,
    pub vocabulary: usize,
}

/// Tokenize one whole file first, so a file that fails halfway leaves no trace
fn tokenize_file(source: &SentenceSource, preprocessor: &WordPreprocessor, path: &Path)
    -> Result<Vec<Vec<String>>> {
    let mut sentences = vec![];
    for sentence in source.sentences(path)? {
        let tokens = preprocessor.tokens(&sentence?);
        if !tokens.is_empty() {
            sentences.push(tokens);
        }
    }
    Ok(sentences)
}

/// Process one worker's batch of `(file index, path)` pairs
pub fn build_local_vocabulary(
    worker: usize,
    batch: &[(usize, PathBuf)],
    source: &SentenceSource,
    preprocessor: &WordPreprocessor,
    layout: &Layout,
) -> Result<BuildReport> {
    let mut dict = LocalDictionary::new();
    let mut report = BuildReport { worker, ..Default::default() };
    let mut nodes: Vec<String> = vec![];

    for &(file_index, ref path) in batch {
        let sentences = match tokenize_file(source, preprocessor, path) {
            Ok(sentences) => sentences,
            Err(err) => {
                warn!("Worker {} skipping {}: {}", worker, path.display(), err);
                report.skipped += 1;
                continue;
            }
        };
        match source.nodes(path) {
            Ok(found) => nodes.extend(found),
            Err(err) => warn!("Worker {} found no nodes in {}: {}", worker, path.display(), err),
        }

        let mut out = BufWriter::new(File::create(layout.encoded(worker, file_index))?);
        let mut ids = vec![];
        for tokens in &sentences {
            ids.clear();
            ids.extend(tokens.iter().map(|t| dict.add(t)));
            codec::write_sentence(&mut out, &ids)?;
            report.tokens += ids.len();
        }
        out.flush()?;
        report.sentences += sentences.len();
        report.files += 1;
        debug!("Worker {} encoded {} ({} sentences)", worker, path.display(), sentences.len());
    }

    dict.save(layout.local_dict(worker))?;
    if let Some(attr) = source.node_attribute() {
        let mut out = BufWriter::new(File::create(layout.nodes(attr, worker))?);
        for node in &nodes {
            writeln!(out, "{}", node)?;
        }
        out.flush()?;
    }
    report.vocabulary = dict.len();
    if report.skipped > 0 {
        warn!("Worker {} skipped {} unreadable files", worker, report.skipped);
    }
    Ok(report)
}

/// Remove the outputs of an earlier builder run
pub fn clear_outputs(layout: &Layout) -> Result<()> {
    use crate::layout::{remove_with_extension, ENCODED_EXTENSION, LOCAL_DICT_EXTENSION, REMAP_EXTENSION};
    let dicts = layout.dicts();
    let removed = remove_with_extension(&dicts, LOCAL_DICT_EXTENSION)?
        + remove_with_extension(&dicts, ENCODED_EXTENSION)?
        + remove_with_extension(&dicts, REMAP_EXTENSION)?;
    for entry in fs::read_dir(&dicts)? {
        let path = entry?.path();
        let stale_nodes = path.file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("nodes_"));
        if stale_nodes && path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    if removed > 0 {
        info!("Removed {} files left by an earlier vocabulary build", removed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use crate::language::Builtin;
    use crate::preprocess::Filters;

    fn keep_everything() -> WordPreprocessor {
        let mut filters = Filters::default();
        filters.remove_stop_words = false;
        WordPreprocessor::new(filters, Arc::new(Builtin::for_code("en").unwrap())).unwrap()
    }

    #[test]
    fn ids_follow_first_sight() {
        let mut dict = LocalDictionary::new();
        assert_eq!(dict.add("the"), 0);
        assert_eq!(dict.add("cat"), 1);
        assert_eq!(dict.add("the"), 0);
        assert_eq!(dict.entries().collect::<Vec<_>>(), vec![("the", 2), ("cat", 1)]);
    }

    #[test]
    fn dictionaries_survive_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0000.dicloc");
        let mut dict = LocalDictionary::new();
        for w in &["b", "a", "b", "tab\tinside"] {
            dict.add(w);
        }
        dict.save(&path).unwrap();
        let back = LocalDictionary::load(&path).unwrap();
        assert_eq!(back.entries().collect::<Vec<_>>(), dict.entries().collect::<Vec<_>>());
        assert_eq!(back.get("tab\tinside"), Some(2));

        fs::write(&path, "3\tb\n1\tb\n").unwrap();
        assert!(LocalDictionary::load(&path).is_err());
    }

    #[test]
    fn worker_encodes_files_and_skips_broken_ones() {
        let corpus = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let layout = Layout::new(out.path());
        layout.create_all().unwrap();
        let a = corpus.path().join("a.txt");
        fs::write(&a, "The cat sat\n\nthe cat, 42\n").unwrap();
        let batch = vec![(0, a), (1, corpus.path().join("missing.txt"))];

        let report = build_local_vocabulary(
            2, &batch, &SentenceSource::Text, &keep_everything(), &layout).unwrap();
        assert_eq!(report, BuildReport {
            worker: 2, files: 1, skipped: 1, sentences: 2, tokens: 5, vocabulary: 3,
        });
        let dict = LocalDictionary::load(layout.local_dict(2)).unwrap();
        assert_eq!(dict.entries().collect::<Vec<_>>(), vec![("the", 2), ("cat", 2), ("sat", 1)]);
        assert_eq!(codec::read_sentences(layout.encoded(2, 0)).unwrap(),
            vec![vec![0, 1, 2], vec![0, 1]]);
        assert!(!layout.encoded(2, 1).exists());
    }
}
