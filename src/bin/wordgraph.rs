//! Generate a word cooccurrence graph from a directory of documents
//!
//! Three sub-directories are created under the output directory:
//!
//! - `dicts_and_encoded_texts`: local and merged dictionaries, and the corpus as word ids
//! - `edges`: word pair counts, sharded
//! - `graph`: one edge list per window size, and the vocabulary it uses
//!
//! `all` runs every phase. `wordprocessing`, `sentenceprocessing` and `wordpairsprocessing` run
//! one phase each, against what the earlier phases left in the output directory, so a failed run
//! can be resumed from the phase that failed.

// Argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
// lastly, this library
extern crate wordgraph;

use clap::{Arg, ArgMatches, SubCommand};
use wordgraph::config::{Settings, SettingsFile};
use wordgraph::errors::*;
use wordgraph::pipeline::Pipeline;

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    if let Err(err) = inner_main() {
        error!("{}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

/// (name, value name, help) of every setting that takes a value
const SETTINGS: &[(&str, &str, &str)] = &[
    ("process_num", "N", "number of workers per phase [default: 3]"),
    ("lang", "LANG", "language for stop words, tokenizer and stemmer [default: en]"),
    ("max_window_size", "W", "largest window size to count word pairs for [default: 5]"),
    ("min_count", "N", "minimum count for words to be kept [default: 5]"),
    ("max_vocab_size", "N", "maximum number of words to keep [default: 10000]"),
    ("safe_files_number_per_processor", "N",
        "shard files per window size; also the most files a worker holds open [default: 200]"),
    ("file_parser", "KIND", "txt, xml or json [default: txt]"),
    ("json_attribute", "KEY", "(dotted) key holding the text of json documents [default: maintext]"),
    ("xml_node_path", "PATH", "slash separated path of the xml elements holding the text"),
    ("node_attribute", "KEY", "json key of node records (e.g. author) to collect"),
    ("shard_hash", "HASH", "farm or modulo [default: farm]"),
];

fn setting_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    let mut args: Vec<Arg> = SETTINGS.iter()
        .map(|&(name, value, help)| Arg::with_name(name)
            .long(name)
            .value_name(value)
            .takes_value(true)
            .help(help))
        .collect();
    args.push(Arg::with_name("config")
        .long("config")
        .value_name("FILE")
        .takes_value(true)
        .help("JSON file of settings; explicit flags take priority"));
    args
}

fn parsed<T: std::str::FromStr>(args: &ArgMatches, name: &str) -> Option<T> {
    if args.is_present(name) {
        Some(value_t!(args, name, T).unwrap_or_else(|e| e.exit()))
    } else {
        None
    }
}

/// Flags first, then the config file, then the defaults
fn settings(args: &ArgMatches) -> Result<Settings> {
    let flags = SettingsFile {
        process_num: parsed(args, "process_num"),
        lang: parsed(args, "lang"),
        max_window_size: parsed(args, "max_window_size"),
        min_count: parsed(args, "min_count"),
        max_vocab_size: parsed(args, "max_vocab_size"),
        safe_files_number_per_processor: parsed(args, "safe_files_number_per_processor"),
        file_parser: parsed(args, "file_parser"),
        json_attribute: parsed(args, "json_attribute"),
        xml_node_path: parsed(args, "xml_node_path"),
        node_attribute: parsed(args, "node_attribute"),
        shard_hash: parsed(args, "shard_hash"),
        ..Default::default()
    };
    let file = match args.value_of("config") {
        Some(path) => SettingsFile::load(path)?.unwrap_or_default(),
        None => SettingsFile::default(),
    };
    flags.over(file).resolve()
}

pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .subcommand(SubCommand::with_name("all")
            .about("Generate the graph from the corpus")
            .args(&setting_args())
            .arg(Arg::with_name("clean")
                .long("clean")
                .help("remove the edge shards once the graph is written"))
            .arg_from_usage("<data_dir> 'directory holding the corpus files'")
            .arg_from_usage("<output_dir> 'directory for the graph and intermediate data'"))
        .subcommand(SubCommand::with_name("wordprocessing")
            .about("Build and merge the dictionaries, and encode the corpus")
            .args(&setting_args())
            .arg_from_usage("<data_dir> 'directory holding the corpus files'")
            .arg_from_usage("<output_dir> 'directory for the graph and intermediate data'"))
        .subcommand(SubCommand::with_name("sentenceprocessing")
            .about("Count word pairs in windows over the encoded corpus")
            .args(&setting_args())
            .arg_from_usage("<output_dir> 'output directory of an earlier wordprocessing'"))
        .subcommand(SubCommand::with_name("wordpairsprocessing")
            .about("Merge word pair counts into the filtered graph")
            .args(&setting_args())
            .arg_from_usage("<output_dir> 'output directory of an earlier sentenceprocessing'"))
        .get_matches();

    let (command, sub) = match args.subcommand() {
        (name, Some(sub)) => (name, sub),
        _ => {
            eprintln!("{}", args.usage());
            return Err(Error::Configuration("a sub-command is required".into()));
        }
    };
    // `value_of` can't fail here, clap already insists on required positionals
    let output_dir = sub.value_of("output_dir").unwrap_or(".");
    let pipeline = Pipeline::new(settings(sub)?, output_dir)?;
    info!("Running {} with {:?}", command, pipeline.settings());

    match command {
        "all" => {
            let data_dir = sub.value_of("data_dir").unwrap_or(".");
            let report = pipeline.run_all(data_dir, sub.is_present("clean"))?;
            println!("{} words kept; edges per window size: {:?}", report.vocabulary, report.edges);
        }
        "wordprocessing" => {
            let data_dir = sub.value_of("data_dir").unwrap_or(".");
            let (_, report) = pipeline.word_processing(data_dir)?;
            pipeline.merge_nodes()?;
            println!("{} distinct words, {} tokens", report.vocabulary, report.tokens);
        }
        "sentenceprocessing" => {
            let reports = pipeline.sentence_processing()?;
            let records: usize = reports.iter().map(|r| r.records).sum();
            println!("{} shard records from {} workers", records, reports.len());
        }
        "wordpairsprocessing" => {
            let report = pipeline.word_pairs_processing()?;
            println!("{} words kept; edges per window size: {:?}", report.vocabulary, report.edges);
        }
        other => return Err(Error::Configuration(format!("unknown sub-command {}", other))),
    }
    Ok(())
}
