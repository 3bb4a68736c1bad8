//! The phases, in order, each on a fixed-size worker pool
//!
//! Workers within a phase share nothing mutable; they only read common inputs and write files
//! named after themselves. The merge and the aggregation are the points where one phase waits
//! for all workers of the previous one.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use crate::aggregate::{self, AggregateReport, EdgeAggregator};
use crate::builder::{self, BuildReport};
use crate::config::Settings;
use crate::errors::*;
use crate::language::{Builtin, Language};
use crate::layout::{self, Layout};
use crate::merger::{self, GlobalDictionary, MergeReport};
use crate::preprocess::{WordPreprocessor, WordTransformer};
use crate::source::SentenceSource;
use crate::unique;
use crate::window::{self, ExtractReport, Manifest, WindowExtractor};

pub const WORD_PROCESSING: &str = "word processing";
pub const SENTENCE_PROCESSING: &str = "sentence processing";
pub const WORD_PAIRS_PROCESSING: &str = "word pairs processing";

pub struct Pipeline {
    settings: Settings,
    layout: Layout,
    source: SentenceSource,
    language: Arc<dyn Language>,
    transformer: Option<Arc<dyn WordTransformer>>,
    pool: ThreadPool,
}

impl Pipeline {
    /// Check the settings and set up the collaborators they name. Nothing runs yet.
    pub fn new<P: AsRef<Path>>(settings: Settings, output_dir: P) -> Result<Self> {
        settings.validate()?;
        let source = SentenceSource::from_kind(
            &settings.file_parser,
            &settings.json_attribute,
            settings.xml_node_path.as_ref().map(String::as_str),
            settings.node_attribute.as_ref().map(String::as_str))?;
        let language: Arc<dyn Language> = Arc::new(Builtin::for_code(&settings.lang)?);
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.process_num)
            .thread_name(|i| format!("wordgraph-worker-{}", i))
            .build()?;
        Ok(Pipeline {
            settings,
            layout: Layout::new(output_dir),
            source,
            language,
            transformer: None,
            pool,
        })
    }

    /// Use a different sentence source, e.g. a `SentenceSource::defined` parser
    pub fn with_source(mut self, source: SentenceSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_language(mut self, language: Arc<dyn Language>) -> Self {
        self.language = language;
        self
    }

    /// Run a hook on every token after the built-in filters
    pub fn with_word_transformer(mut self, transformer: Arc<dyn WordTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn layout(&self) -> &Layout { &self.layout }

    fn preprocessor(&self) -> Result<WordPreprocessor> {
        let preprocessor = WordPreprocessor::new(self.settings.filters.clone(), self.language.clone())?;
        Ok(match self.transformer {
            Some(ref hook) => preprocessor.with_transformer(hook.clone()),
            None => preprocessor,
        })
    }

    /// Build the local dictionaries in parallel, then merge them
    pub fn word_processing<P: AsRef<Path>>(&self, data_dir: P) -> Result<(GlobalDictionary, MergeReport)> {
        self.word_processing_inner(data_dir.as_ref()).map_err(|e| e.in_phase(WORD_PROCESSING))
    }

    fn word_processing_inner(&self, data_dir: &Path) -> Result<(GlobalDictionary, MergeReport)> {
        let start = Instant::now();
        self.layout.create_all()?;
        builder::clear_outputs(&self.layout)?;
        // Shards and graphs hold ids of the dictionary about to be replaced
        window::clear_outputs(&self.layout)?;
        aggregate::clear_outputs(&self.layout)?;
        let preprocessor = self.preprocessor()?;

        let files: Vec<(usize, PathBuf)> = layout::corpus_files(data_dir)?.into_iter().enumerate().collect();
        let batches = layout::partition(&files, self.settings.process_num);
        info!("Building vocabulary of {} files with {} workers", files.len(), batches.len());
        let reports: Vec<BuildReport> = self.pool.install(|| {
            batches.par_iter()
                .enumerate()
                .map(|(worker, batch)| builder::build_local_vocabulary(
                    worker, batch, &self.source, &preprocessor, &self.layout))
                .collect::<Result<Vec<_>>>()
        })?;
        for r in &reports {
            info!("Worker {}: {} files ({} skipped), {} sentences, {} tokens, {} distinct words",
                r.worker, r.files, r.skipped, r.sentences, r.tokens, r.vocabulary);
        }

        let (dict, report) = merger::merge_vocabulary(&self.layout)?;
        info!("Merged {} local dictionaries into {} words ({} tokens) in {:.2}s",
            report.local_dictionaries, report.vocabulary, report.tokens, start.elapsed().as_secs_f64());
        Ok((dict, report))
    }

    /// Count windowed word pairs into bounded sets of shard files
    pub fn sentence_processing(&self) -> Result<Vec<ExtractReport>> {
        self.sentence_processing_inner().map_err(|e| e.in_phase(SENTENCE_PROCESSING))
    }

    fn sentence_processing_inner(&self) -> Result<Vec<ExtractReport>> {
        let start = Instant::now();
        self.layout.create_all()?;
        window::clear_outputs(&self.layout)?;
        let dict = GlobalDictionary::load(self.layout.merged_dict())?;
        let remaps = window::load_remaps(&self.layout)?;
        let files = window::encoded_files(&self.layout)?;
        let batches = layout::partition(&files, self.settings.process_num);
        Manifest {
            max_window_size: self.settings.max_window_size,
            shards: self.settings.safe_files_number_per_processor,
            workers: batches.len(),
            shard_hash: self.settings.shard_hash.name().to_string(),
            vocabulary: dict.len(),
            dictionary: merger::dictionary_fingerprint(self.layout.merged_dict())?,
        }.save(&self.layout)?;

        let extractor = WindowExtractor {
            layout: &self.layout,
            max_window_size: self.settings.max_window_size,
            shards: self.settings.safe_files_number_per_processor,
            hash: self.settings.shard_hash,
            flush_pairs: self.settings.flush_pairs,
        };
        info!("Extracting windows up to {} from {} encoded texts with {} workers",
            extractor.max_window_size, files.len(), batches.len());
        let reports: Vec<ExtractReport> = self.pool.install(|| {
            batches.par_iter()
                .enumerate()
                .map(|(worker, batch)| extractor.extract(worker, batch, &remaps))
                .collect::<Result<Vec<_>>>()
        })?;
        for r in &reports {
            info!("Worker {}: {} files, {} sentences, {} shard records",
                r.worker, r.files, r.sentences, r.records);
        }
        info!("Sentence processing took {:.2}s", start.elapsed().as_secs_f64());
        Ok(reports)
    }

    /// Merge the shards into the final graph, one edge list per window size
    pub fn word_pairs_processing(&self) -> Result<AggregateReport> {
        self.word_pairs_processing_inner().map_err(|e| e.in_phase(WORD_PAIRS_PROCESSING))
    }

    fn word_pairs_processing_inner(&self) -> Result<AggregateReport> {
        let start = Instant::now();
        self.layout.create_all()?;
        aggregate::clear_outputs(&self.layout)?;
        let dict = GlobalDictionary::load(self.layout.merged_dict())?;
        let aggregator = EdgeAggregator {
            layout: &self.layout,
            min_count: self.settings.min_count,
            max_vocab_size: self.settings.max_vocab_size,
        };
        let report = aggregator.run(&dict, self.settings.max_window_size, &self.pool)?;
        info!("Word pairs processing took {:.2}s", start.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Merge the per-worker node records into `<output_dir>/nodes_<attribute>.txt`
    pub fn merge_nodes(&self) -> Result<Option<usize>> {
        let attr = match self.source.node_attribute() {
            Some(attr) => attr,
            None => return Ok(None),
        };
        let output = self.layout.root().join(format!("nodes_{}.txt", attr));
        let count = unique::merge_unique_to_single_file(
            self.layout.dicts(), &format!("nodes_{}_", attr), &output)?;
        info!("{} unique {} records in {}", count, attr, output.display());
        Ok(Some(count))
    }

    /// Every phase, in order
    pub fn run_all<P: AsRef<Path>>(&self, data_dir: P, clean: bool) -> Result<AggregateReport> {
        let start = Instant::now();
        self.word_processing(data_dir)?;
        self.sentence_processing()?;
        let report = self.word_pairs_processing()?;
        self.merge_nodes()?;
        if clean {
            let removed = aggregate::remove_shards(&self.layout)?;
            info!("Removed {} edge shards", removed);
        }
        info!("Time in seconds: {:.2}", start.elapsed().as_secs_f64());
        Ok(report)
    }
}
