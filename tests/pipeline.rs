extern crate tempfile;
extern crate wordgraph;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wordgraph::aggregate::read_graph_edges;
use wordgraph::config::Settings;
use wordgraph::errors::{Error, Result};
use wordgraph::layout::Layout;
use wordgraph::merger::GlobalDictionary;
use wordgraph::pipeline::Pipeline;
use wordgraph::source::{SentenceSource, Sentences};

fn settings(process_num: usize, min_count: u64) -> Settings {
    let mut s = Settings::default();
    s.process_num = process_num;
    s.max_window_size = 2;
    s.min_count = min_count;
    s.max_vocab_size = 10;
    s.safe_files_number_per_processor = 4;
    s.filters.remove_stop_words = false;
    s
}

fn cat_and_dog() -> TempDir {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("a.txt"), "the cat sat\n").unwrap();
    fs::write(data.path().join("b.txt"), "the dog sat\n").unwrap();
    data
}

/// Edges of one window size as (word, word, count), words of a pair in alphabetical order
fn word_edges(layout: &Layout, window: usize) -> BTreeSet<(String, String, u64)> {
    let dict = GlobalDictionary::load(layout.merged_dict()).unwrap();
    read_graph_edges(layout.graph_edges(window)).unwrap()
        .into_iter()
        .map(|(a, b, count)| {
            let (x, y) = (dict.word(a).unwrap().to_string(), dict.word(b).unwrap().to_string());
            if x < y { (x, y, count) } else { (y, x, count) }
        })
        .collect()
}

fn edge(a: &str, b: &str, count: u64) -> (String, String, u64) {
    (a.to_string(), b.to_string(), count)
}

#[test]
fn cat_and_dog_graph() {
    let data = cat_and_dog();
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(2, 1), out.path()).unwrap();
    let report = pipeline.run_all(data.path(), false).unwrap();
    assert_eq!(report.vocabulary, 4);
    assert_eq!(report.edges, vec![4, 5]);

    let layout = pipeline.layout();
    let dict = GlobalDictionary::load(layout.merged_dict()).unwrap();
    let vocabulary: Vec<(&str, u64)> = (0..4)
        .map(|id| (dict.word(id).unwrap(), dict.count(id).unwrap()))
        .collect();
    assert_eq!(vocabulary, vec![("sat", 2), ("the", 2), ("cat", 1), ("dog", 1)]);

    let window1: BTreeSet<_> = vec![
        edge("cat", "sat", 1), edge("cat", "the", 1), edge("dog", "sat", 1), edge("dog", "the", 1),
    ].into_iter().collect();
    assert_eq!(word_edges(layout, 1), window1);
    let mut window2 = window1;
    window2.insert(edge("sat", "the", 2));
    assert_eq!(word_edges(layout, 2), window2);

    assert_eq!(fs::read_to_string(layout.filtered_vocabulary()).unwrap(),
        "0\t2\tsat\n1\t2\tthe\n2\t1\tcat\n3\t1\tdog\n");
}

#[test]
fn min_count_filters_words_out_of_every_edge() {
    let data = cat_and_dog();
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(2, 2), out.path()).unwrap();
    let report = pipeline.run_all(data.path(), false).unwrap();
    assert_eq!(report.vocabulary, 2);
    assert!(word_edges(pipeline.layout(), 1).is_empty());
    assert_eq!(word_edges(pipeline.layout(), 2),
        vec![edge("sat", "the", 2)].into_iter().collect());
}

/// A few hundred sentences over a small vocabulary, always the same
fn synthetic_corpus(dir: &Path) {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota",
        "kappa", "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau", "upsilon"];
    let mut state: u64 = 12345;
    let mut next = move |n: usize| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % n
    };
    for f in 0..7 {
        let mut text = String::new();
        for _ in 0..40 {
            let len = next(9);
            let sentence: Vec<&str> = (0..len).map(|_| words[next(words.len()) % (5 + f * 2)]).collect();
            text.push_str(&sentence.join(" "));
            text.push('\n');
        }
        fs::write(dir.join(format!("doc{}.txt", f)), text).unwrap();
    }
}

fn graph_bytes(layout: &Layout, windows: usize) -> Vec<Vec<u8>> {
    let mut files: Vec<Vec<u8>> = (1..=windows).map(|w| fs::read(layout.graph_edges(w)).unwrap()).collect();
    files.push(fs::read(layout.merged_dict()).unwrap());
    files.push(fs::read(layout.filtered_vocabulary()).unwrap());
    files
}

#[test]
fn worker_count_does_not_change_the_graph() {
    let data = TempDir::new().unwrap();
    synthetic_corpus(data.path());
    let mut outputs = vec![];
    for &workers in &[1, 3, 8] {
        let out = TempDir::new().unwrap();
        let mut s = settings(workers, 3);
        s.max_window_size = 4;
        s.max_vocab_size = 12;
        s.safe_files_number_per_processor = 3;
        s.flush_pairs = 10;
        let pipeline = Pipeline::new(s, out.path()).unwrap();
        pipeline.run_all(data.path(), false).unwrap();
        outputs.push(graph_bytes(pipeline.layout(), 4));
    }
    assert!(!outputs[0][3].is_empty());
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn graph_obeys_the_filters_and_the_windows() {
    let data = TempDir::new().unwrap();
    synthetic_corpus(data.path());
    let out = TempDir::new().unwrap();
    let mut s = settings(3, 4);
    s.max_vocab_size = 9;
    let pipeline = Pipeline::new(s, out.path()).unwrap();
    pipeline.run_all(data.path(), false).unwrap();
    let layout = pipeline.layout();
    let dict = GlobalDictionary::load(layout.merged_dict()).unwrap();

    let window1 = read_graph_edges(layout.graph_edges(1)).unwrap();
    let window2 = read_graph_edges(layout.graph_edges(2)).unwrap();
    assert!(!window2.is_empty());
    for &(a, b, count) in &window2 {
        assert!(a < b, "self pairs and unordered pairs never appear");
        assert!(b < 9, "rank within max_vocab_size");
        assert!(dict.count(a).unwrap() >= 4 && dict.count(b).unwrap() >= 4);
        assert!(count >= 1);
    }
    // A wider window only ever adds pairs and counts
    for &(a, b, count) in &window1 {
        let wider = window2.iter().find(|&&(x, y, _)| x == a && y == b).unwrap();
        assert!(wider.2 >= count);
    }
}

#[test]
fn windows_stop_at_sentence_ends() {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("a.txt"), "red green\nblue yellow\nred\n").unwrap();
    let out = TempDir::new().unwrap();
    let mut s = settings(1, 1);
    s.max_window_size = 5;
    let pipeline = Pipeline::new(s, out.path()).unwrap();
    pipeline.run_all(data.path(), false).unwrap();
    assert_eq!(word_edges(pipeline.layout(), 5),
        vec![edge("green", "red", 1), edge("blue", "yellow", 1)].into_iter().collect());
}

#[test]
fn rerunning_the_aggregation_is_idempotent() {
    let data = TempDir::new().unwrap();
    synthetic_corpus(data.path());
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(2, 1), out.path()).unwrap();
    let first = pipeline.run_all(data.path(), false).unwrap();
    let before = graph_bytes(pipeline.layout(), 2);
    let second = pipeline.word_pairs_processing().unwrap();
    assert_eq!(first, second);
    assert_eq!(before, graph_bytes(pipeline.layout(), 2));
}

#[test]
fn sub_commands_resume_from_earlier_output() {
    let data = cat_and_dog();
    let out = TempDir::new().unwrap();
    Pipeline::new(settings(2, 1), out.path()).unwrap().word_processing(data.path()).unwrap();
    // A later phase may run with a different worker count
    let later = Pipeline::new(settings(1, 1), out.path()).unwrap();
    later.sentence_processing().unwrap();
    let report = later.word_pairs_processing().unwrap();
    assert_eq!(report.edges, vec![4, 5]);
}

#[test]
fn phases_out_of_order_say_what_is_missing() {
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(1, 1), out.path()).unwrap();
    match pipeline.word_pairs_processing() {
        Err(Error::Phase(phase, inner)) => {
            assert_eq!(phase, "word pairs processing");
            match *inner {
                Error::MissingFile(..) => {}
                ref other => panic!("unexpected inner error {}", other),
            }
        }
        other => panic!("expected a phase error, got {:?}", other),
    }
}

#[test]
fn unreadable_files_are_skipped() {
    let data = cat_and_dog();
    fs::write(data.path().join("c.txt"), &[0x74, 0x68, 0xff, 0xfe, 0x0a]).unwrap();
    fs::create_dir(data.path().join("subdir")).unwrap();
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(3, 1), out.path()).unwrap();
    let (dict, _) = pipeline.word_processing(data.path()).unwrap();
    assert_eq!(dict.len(), 4);
}

#[test]
fn json_corpus_collects_unique_nodes() {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("a.json"),
        r#"{"maintext": "The cat sat. The dog sat.", "author": "author1"}"#).unwrap();
    fs::write(data.path().join("b.json"),
        r#"[{"maintext": "A bird flew.", "author": "author1"},
            {"maintext": "The fish swam.", "author": "author2"}]"#).unwrap();
    fs::write(data.path().join("c.json"), r#"{"maintext": "", "author": "author1"}"#).unwrap();
    let out = TempDir::new().unwrap();
    let mut s = settings(3, 1);
    s.file_parser = "json".into();
    s.node_attribute = Some("author".into());
    let pipeline = Pipeline::new(s, out.path()).unwrap();
    pipeline.run_all(data.path(), true).unwrap();

    let mut nodes: Vec<String> = fs::read_to_string(out.path().join("nodes_author.txt")).unwrap()
        .lines().map(str::to_string).collect();
    nodes.sort();
    assert_eq!(nodes, vec!["author1", "author2"]);
    assert!(word_edges(pipeline.layout(), 1).contains(&edge("cat", "the", 1)));
    // --clean removed the shards
    assert_eq!(fs::read_dir(pipeline.layout().edges()).unwrap().count(), 1);
}

#[test]
fn library_hooks_replace_parser_and_words() {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("a.csv"), "x;the cat sat\ny;the dog sat\n").unwrap();
    let out = TempDir::new().unwrap();
    let source = SentenceSource::defined(|path: &Path| {
        let text = fs::read_to_string(path).map_err(Error::from)?;
        let sentences: Vec<Result<String>> = text.lines()
            .filter_map(|l| l.splitn(2, ';').nth(1).map(|s| Ok(s.to_string())))
            .collect();
        Ok(Box::new(sentences.into_iter()) as Sentences<'static>)
    });
    let pipeline = Pipeline::new(settings(1, 1), out.path()).unwrap()
        .with_source(source)
        .with_word_transformer(Arc::new(|w: &str| w.to_uppercase()));
    pipeline.run_all(data.path(), false).unwrap();
    assert!(word_edges(pipeline.layout(), 2).contains(&edge("SAT", "THE", 2)));
}

#[test]
fn bad_settings_fail_before_any_phase() {
    let out = TempDir::new().unwrap();
    let mut s = settings(1, 1);
    s.file_parser = "docx".into();
    assert!(Pipeline::new(s, out.path()).is_err());
    let mut s = settings(1, 1);
    s.lang = "tlh".into();
    assert!(Pipeline::new(s, out.path()).is_err());
    assert!(!out.path().join("dicts_and_encoded_texts").exists());
}

fn two_corpora() -> (TempDir, TempDir) {
    let first = TempDir::new().unwrap();
    fs::write(first.path().join("a.txt"), "apple banana\n").unwrap();
    let second = TempDir::new().unwrap();
    fs::write(second.path().join("b.txt"), "cherry date\nelder fig\n").unwrap();
    (first, second)
}

fn inner_error(result: Result<wordgraph::aggregate::AggregateReport>) -> Error {
    match result {
        Err(Error::Phase(_, inner)) => *inner,
        other => panic!("expected a phase error, got {:?}", other),
    }
}

#[test]
fn new_vocabulary_discards_old_shards_and_graphs() {
    let (first, second) = two_corpora();
    let out = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(1, 1), out.path()).unwrap();
    pipeline.run_all(first.path(), false).unwrap();
    pipeline.word_processing(second.path()).unwrap();

    assert!(!pipeline.layout().graph_edges(1).exists());
    match inner_error(pipeline.word_pairs_processing()) {
        Error::MissingFile(..) => {}
        other => panic!("unexpected inner error {}", other),
    }
    pipeline.sentence_processing().unwrap();
    pipeline.word_pairs_processing().unwrap();
    assert_eq!(word_edges(pipeline.layout(), 1),
        vec![edge("cherry", "date", 1), edge("elder", "fig", 1)].into_iter().collect());
}

#[test]
fn shards_of_another_dictionary_are_rejected() {
    let (first, second) = two_corpora();
    let out = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(1, 1), out.path()).unwrap();
    pipeline.run_all(first.path(), false).unwrap();
    Pipeline::new(settings(1, 1), elsewhere.path()).unwrap().word_processing(second.path()).unwrap();
    let replaced = Layout::new(elsewhere.path()).merged_dict();
    fs::copy(replaced, pipeline.layout().merged_dict()).unwrap();

    match inner_error(pipeline.word_pairs_processing()) {
        Error::MergeInconsistency(info) => assert!(info.contains("sentenceprocessing")),
        other => panic!("unexpected inner error {}", other),
    }
}
