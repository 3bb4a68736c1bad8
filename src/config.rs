//! Settings: built-in defaults, overridden by a JSON config file, overridden by explicit flags
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use serde::Deserialize;
use crate::errors::*;
use crate::farm::ShardHash;
use crate::preprocess::Filters;

/// Largest accepted `max_window_size`. The extractor keeps one pair table per distance.
pub const MAX_WINDOW_SIZE: usize = 1024;

/// Every setting, resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub process_num: usize,
    pub lang: String,
    pub max_window_size: usize,
    pub min_count: u64,
    pub max_vocab_size: usize,
    pub safe_files_number_per_processor: usize,
    pub file_parser: String,
    pub json_attribute: String,
    pub xml_node_path: Option<String>,
    pub node_attribute: Option<String>,
    pub filters: Filters,
    pub shard_hash: ShardHash,
    pub flush_pairs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            process_num: 3,
            lang: "en".into(),
            max_window_size: 5,
            min_count: 5,
            max_vocab_size: 10000,
            safe_files_number_per_processor: 200,
            file_parser: "txt".into(),
            json_attribute: "maintext".into(),
            xml_node_path: None,
            node_attribute: None,
            filters: Filters::default(),
            shard_hash: ShardHash::Farm,
            flush_pairs: 1_000_000,
        }
    }
}

/// Settings as they appear in a config file, or as given on the command line. Anything left out
/// falls through to the next layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub process_num: Option<usize>,
    pub lang: Option<String>,
    pub max_window_size: Option<usize>,
    pub min_count: Option<u64>,
    pub max_vocab_size: Option<usize>,
    pub safe_files_number_per_processor: Option<usize>,
    pub file_parser: Option<String>,
    pub json_attribute: Option<String>,
    pub xml_node_path: Option<String>,
    pub node_attribute: Option<String>,
    pub remove_stop_words: Option<bool>,
    pub remove_numbers: Option<bool>,
    pub replace_digits_to_zeros: Option<bool>,
    pub remove_punctuations: Option<bool>,
    pub stem_word: Option<bool>,
    pub lowercase: Option<bool>,
    pub shard_hash: Option<String>,
    pub flush_pairs: Option<usize>,
}

impl SettingsFile {
    /// Read a config file. A missing file is not an error: it is reported and ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<SettingsFile>> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .map(Some)
                .map_err(|e| Error::Configuration(format!("{} is not a valid config file: {}", path.display(), e))),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("{} does not exist, please check again. Continuing with command line settings.",
                    path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Take every value that is set here, keeping `base` where it isn't
    pub fn over(self, base: SettingsFile) -> SettingsFile {
        SettingsFile {
            process_num: self.process_num.or(base.process_num),
            lang: self.lang.or(base.lang),
            max_window_size: self.max_window_size.or(base.max_window_size),
            min_count: self.min_count.or(base.min_count),
            max_vocab_size: self.max_vocab_size.or(base.max_vocab_size),
            safe_files_number_per_processor: self.safe_files_number_per_processor
                .or(base.safe_files_number_per_processor),
            file_parser: self.file_parser.or(base.file_parser),
            json_attribute: self.json_attribute.or(base.json_attribute),
            xml_node_path: self.xml_node_path.or(base.xml_node_path),
            node_attribute: self.node_attribute.or(base.node_attribute),
            remove_stop_words: self.remove_stop_words.or(base.remove_stop_words),
            remove_numbers: self.remove_numbers.or(base.remove_numbers),
            replace_digits_to_zeros: self.replace_digits_to_zeros.or(base.replace_digits_to_zeros),
            remove_punctuations: self.remove_punctuations.or(base.remove_punctuations),
            stem_word: self.stem_word.or(base.stem_word),
            lowercase: self.lowercase.or(base.lowercase),
            shard_hash: self.shard_hash.or(base.shard_hash),
            flush_pairs: self.flush_pairs.or(base.flush_pairs),
        }
    }

    /// Fill the gaps with defaults and validate
    pub fn resolve(self) -> Result<Settings> {
        let d = Settings::default();
        let settings = Settings {
            process_num: self.process_num.unwrap_or(d.process_num),
            lang: self.lang.unwrap_or(d.lang),
            max_window_size: self.max_window_size.unwrap_or(d.max_window_size),
            min_count: self.min_count.unwrap_or(d.min_count),
            max_vocab_size: self.max_vocab_size.unwrap_or(d.max_vocab_size),
            safe_files_number_per_processor: self.safe_files_number_per_processor
                .unwrap_or(d.safe_files_number_per_processor),
            file_parser: self.file_parser.unwrap_or(d.file_parser),
            json_attribute: self.json_attribute.unwrap_or(d.json_attribute),
            xml_node_path: self.xml_node_path.or(d.xml_node_path),
            node_attribute: self.node_attribute.or(d.node_attribute),
            filters: Filters {
                remove_stop_words: self.remove_stop_words.unwrap_or(d.filters.remove_stop_words),
                remove_numbers: self.remove_numbers.unwrap_or(d.filters.remove_numbers),
                replace_digits_to_zeros: self.replace_digits_to_zeros
                    .unwrap_or(d.filters.replace_digits_to_zeros),
                remove_punctuations: self.remove_punctuations.unwrap_or(d.filters.remove_punctuations),
                stem_word: self.stem_word.unwrap_or(d.filters.stem_word),
                lowercase: self.lowercase.unwrap_or(d.filters.lowercase),
            },
            shard_hash: match self.shard_hash {
                Some(name) => name.parse()?,
                None => d.shard_hash,
            },
            flush_pairs: self.flush_pairs.unwrap_or(d.flush_pairs),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    /// Catch what can be caught before any phase starts
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("process_num", self.process_num),
            ("max_window_size", self.max_window_size),
            ("safe_files_number_per_processor", self.safe_files_number_per_processor),
            ("flush_pairs", self.flush_pairs),
        ];
        for &(name, value) in &positive {
            if value == 0 {
                return Err(Error::Configuration(format!("{} must be at least 1", name)));
            }
        }
        if self.max_window_size > MAX_WINDOW_SIZE {
            return Err(Error::Configuration(format!(
                "max_window_size must be at most {}, not {}", MAX_WINDOW_SIZE, self.max_window_size)));
        }
        Ok(())
    }
}
