//! Vocabulary merger: reduce the local dictionaries to one global dictionary
//!
//! Global ids are a pure function of the summed frequencies: most frequent first, ties broken by
//! the word itself. Merging the same local dictionaries in any order gives the same ids.
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::builder::LocalDictionary;
use crate::codec;
use crate::errors::*;
use crate::farm::{new_farm, FarmMap};
use crate::layout::{self, Layout, LOCAL_DICT_EXTENSION};

/// Corpus-wide word ids and frequencies. Id order is frequency order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalDictionary {
    words: Vec<String>,
    counts: Vec<u64>,
}

impl GlobalDictionary {
    /// Sum the counts of every local dictionary and rank the words
    pub fn merge<'a, I>(locals: I) -> Self where I: IntoIterator<Item = &'a LocalDictionary> {
        let mut totals: FarmMap<&'a str, u64> = new_farm();
        for local in locals {
            for (word, count) in local.entries() {
                *totals.entry(word).or_insert(0) += count;
            }
        }
        let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        GlobalDictionary {
            words: ranked.iter().map(|&(w, _)| w.to_string()).collect(),
            counts: ranked.iter().map(|&(_, c)| c).collect(),
        }
    }

    pub fn len(&self) -> usize { self.words.len() }
    pub fn is_empty(&self) -> bool { self.words.is_empty() }
    pub fn word(&self, id: u32) -> Option<&str> { self.words.get(id as usize).map(String::as_str) }
    pub fn count(&self, id: u32) -> Option<u64> { self.counts.get(id as usize).cloned() }

    /// Word to id lookup. Only the merge and tests need it, so it isn't kept around.
    pub fn index(&self) -> FarmMap<&str, u32> {
        self.words.iter().enumerate().map(|(id, w)| (w.as_str(), id as u32)).collect()
    }

    /// Global id of every local id
    pub fn remap(&self, index: &FarmMap<&str, u32>, local: &LocalDictionary) -> Result<Vec<u32>> {
        local.entries()
            .map(|(word, _)| index.get(word).cloned().ok_or_else(|| Error::MergeInconsistency(
                format!("\"{}\" is in a local dictionary but not in the merged one", word))))
            .collect()
    }

    /// How many of the top ids survive filtering
    ///
    /// Ids are already ranked by frequency, so the words with at least `min_count` occurrences
    /// are a prefix of the ids; the vocabulary is that prefix, cut at `max_vocab_size`.
    pub fn vocabulary_cutoff(&self, min_count: u64, max_vocab_size: usize) -> u32 {
        let frequent = self.counts.iter().take_while(|&&c| c >= min_count).count();
        frequent.min(max_vocab_size) as u32
    }

    /// One line per id: `id<TAB>count<TAB>word`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_prefix(path, self.len() as u32)
    }

    /// Save only ids below `cutoff`
    pub fn save_prefix<P: AsRef<Path>>(&self, path: P, cutoff: u32) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (id, (word, count)) in self.words.iter().zip(&self.counts).enumerate().take(cutoff as usize) {
            writeln!(out, "{}\t{}\t{}", id, count, word)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::MissingFile("merged dictionary (run wordprocessing first)", Some(e)))?;
        let mut dict = GlobalDictionary::default();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let mut fields = line.splitn(3, '\t');
            let id: Option<usize> = fields.next().and_then(|f| f.parse().ok());
            let count: Option<u64> = fields.next().and_then(|f| f.parse().ok());
            match (id, count, fields.next()) {
                (Some(id), Some(count), Some(word)) if id == lineno && !word.is_empty() => {
                    dict.words.push(word.to_string());
                    dict.counts.push(count);
                }
                _ => return Err(Error::MergeInconsistency(format!(
                    "{}:{}: expected \"{}<TAB>count<TAB>word\"", path.display(), lineno + 1, lineno))),
            }
        }
        Ok(dict)
    }
}

/// Hash of a saved merged dictionary, so files derived from its ids can be matched to it
pub fn dictionary_fingerprint<P: AsRef<Path>>(path: P) -> Result<u64> {
    let content = fs::read(path)
        .map_err(|e| Error::MissingFile("merged dictionary (run wordprocessing first)", Some(e)))?;
    Ok(farmhash::hash64(&content))
}

/// What the merge produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    pub local_dictionaries: usize,
    pub vocabulary: usize,
    pub tokens: u64,
}

/// Merge every `.dicloc` under the layout, then write the merged dictionary and one remapping
/// table per local dictionary
pub fn merge_vocabulary(layout: &Layout) -> Result<(GlobalDictionary, MergeReport)> {
    let paths = layout::files_with_extension(&layout.dicts(), LOCAL_DICT_EXTENSION)?;
    let mut locals: Vec<(PathBuf, LocalDictionary)> = Vec::with_capacity(paths.len());
    for path in paths {
        let dict = LocalDictionary::load(&path)?;
        locals.push((path, dict));
    }

    let global = GlobalDictionary::merge(locals.iter().map(|&(_, ref d)| d));
    global.save(layout.merged_dict())?;

    let index = global.index();
    for &(ref path, ref local) in &locals {
        let worker = layout::parse_dict_name(path).ok_or_else(|| Error::MergeInconsistency(
            format!("can't tell which worker wrote {}", path.display())))?;
        codec::write_remap(layout.remap(worker), &global.remap(&index, local)?)?;
    }

    let report = MergeReport {
        local_dictionaries: locals.len(),
        vocabulary: global.len(),
        tokens: global.counts.iter().sum(),
    };
    Ok((global, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local(words: &[&str]) -> LocalDictionary {
        let mut dict = LocalDictionary::new();
        for w in words {
            dict.add(w);
        }
        dict
    }

    #[test]
    fn ranks_by_frequency_then_word() {
        let a = local(&["the", "cat", "sat"]);
        let b = local(&["the", "dog", "sat"]);
        let global = GlobalDictionary::merge(vec![&a, &b]);
        let words: Vec<_> = (0..4).map(|id| global.word(id).unwrap()).collect();
        assert_eq!(words, vec!["sat", "the", "cat", "dog"]);
        assert_eq!(global.count(1), Some(2));
        assert_eq!(global.count(3), Some(1));
    }

    #[test]
    fn merge_order_does_not_matter() {
        let dicts = vec![
            local(&["x", "y", "y", "z"]),
            local(&["z", "q", "x"]),
            local(&["y", "Y", "q", "q"]),
        ];
        let forward = GlobalDictionary::merge(dicts.iter());
        let backward = GlobalDictionary::merge(dicts.iter().rev());
        assert_eq!(forward, backward);
        // Casing is not unified here
        assert_eq!(forward.len(), 5);
    }

    #[test]
    fn cutoff_applies_both_filters() {
        let global = GlobalDictionary::merge(vec![&local(&["a", "a", "a", "b", "b", "c"])]);
        assert_eq!(global.vocabulary_cutoff(1, 10), 3);
        assert_eq!(global.vocabulary_cutoff(2, 10), 2);
        assert_eq!(global.vocabulary_cutoff(1, 1), 1);
        assert_eq!(global.vocabulary_cutoff(4, 10), 0);
    }

    #[test]
    fn writes_dictionary_and_remaps() {
        let out = TempDir::new().unwrap();
        let layout = Layout::new(out.path());
        layout.create_all().unwrap();
        local(&["the", "cat", "sat"]).save(layout.local_dict(0)).unwrap();
        local(&["dog", "the", "sat"]).save(layout.local_dict(1)).unwrap();

        let (global, report) = merge_vocabulary(&layout).unwrap();
        assert_eq!(report, MergeReport { local_dictionaries: 2, vocabulary: 4, tokens: 6 });
        assert_eq!(GlobalDictionary::load(layout.merged_dict()).unwrap(), global);
        // sat=0 the=1 cat=2 dog=3
        assert_eq!(codec::read_remap(layout.remap(0)).unwrap(), vec![1, 2, 0]);
        assert_eq!(codec::read_remap(layout.remap(1)).unwrap(), vec![3, 1, 0]);
    }
}
