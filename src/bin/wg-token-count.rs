//! Count the sentences and the tokens that survive preprocessing in a corpus
//!
//! Uses the same sentence sources and word filters as `wordgraph`, with its default settings
//! unless a config file says otherwise, so the numbers match what a graph run would see. Files
//! are counted in parallel.

// Argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
// Threading
extern crate rayon;
use rayon::prelude::*;
// lastly, this library
extern crate wordgraph;

use std::path::Path;
use std::sync::Arc;
use wordgraph::config::SettingsFile;
use wordgraph::errors::*;
use wordgraph::language::Builtin;
use wordgraph::layout;
use wordgraph::preprocess::WordPreprocessor;
use wordgraph::source::SentenceSource;

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    inner_main().expect("Could not recover. Exiting.");
}
pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .arg_from_usage("--config=[FILE] 'JSON file of settings, as for wordgraph'")
        .arg_from_usage("<data_dir> 'directory holding the corpus files'")
        .get_matches();

    let file = match args.value_of("config") {
        Some(path) => SettingsFile::load(path)?.unwrap_or_default(),
        None => SettingsFile::default(),
    };
    let settings = file.resolve()?;
    let source = SentenceSource::from_kind(
        &settings.file_parser,
        &settings.json_attribute,
        settings.xml_node_path.as_ref().map(String::as_str),
        None)?;
    let preprocessor = WordPreprocessor::new(
        settings.filters.clone(),
        Arc::new(Builtin::for_code(&settings.lang)?))?;

    let files = layout::corpus_files(Path::new(args.value_of("data_dir").unwrap_or(".")))?;
    info!("Counting {} files", files.len());
    let (sentences, tokens) = files.par_iter()
        .map(|path| {
            let mut counts = (0usize, 0usize);
            match source.sentences(path) {
                Ok(stream) => for sentence in stream {
                    match sentence {
                        Ok(sentence) => {
                            counts.0 += 1;
                            counts.1 += preprocessor.tokens(&sentence).len();
                        }
                        Err(err) => {
                            warn!("Stopped reading {}: {}", path.display(), err);
                            break;
                        }
                    }
                },
                Err(err) => warn!("Skipping {}: {}", path.display(), err),
            }
            counts
        })
        .reduce(|| (0, 0), |l, r| (l.0 + r.0, l.1 + r.1));

    println!("{} sentences, {} tokens", sentences, tokens);
    Ok(())
}
