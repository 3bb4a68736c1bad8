//! Sentence sources: turn one corpus file into a lazy sequence of sentences
//!
//! Each input format is one variant of `SentenceSource`. Plain text is streamed line by line;
//! XML and JSON documents have to be parsed whole, and are then split into sentences on unicode
//! sentence bounds.
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use regex::Regex;
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;
use crate::errors::*;

/// A lazy stream of sentences; an `Err` item means the rest of the file is unusable
pub type Sentences<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// A user-supplied parser, for formats the built-in variants don't know
pub type ParseFn = dyn Fn(&Path) -> Result<Sentences<'static>> + Send + Sync;

#[derive(Clone)]
pub enum SentenceSource {
    /// One sentence per line
    Text,
    /// The text of every element at the end of a `/`-separated node path, with the predefined
    /// and numeric character references decoded
    Xml { node_path: Vec<String>, tags: Regex },
    /// The value of a (dotted) attribute of each JSON document
    Json { attribute: String, node_attribute: Option<String> },
    /// Anything else
    Defined(Arc<ParseFn>),
}

impl fmt::Debug for SentenceSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SentenceSource::Text => write!(f, "Text"),
            SentenceSource::Xml { ref node_path, .. } => write!(f, "Xml({})", node_path.join("/")),
            SentenceSource::Json { ref attribute, .. } => write!(f, "Json({})", attribute),
            SentenceSource::Defined(_) => write!(f, "Defined"),
        }
    }
}

impl SentenceSource {
    pub fn xml(node_path: &str) -> Result<Self> {
        let node_path: Vec<String> = node_path.split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if node_path.is_empty() {
            return Err(Error::Configuration("xml_node_path must name at least one element".into()));
        }
        let tags = Regex::new(concat!(
            r"(?s)<!--.*?-->",
            r"|<!\[CDATA\[(?P<cdata>.*?)\]\]>",
            r"|<[?!][^>]*>",
            r"|<(?P<close>/)?(?P<name>[^\s/>]+)[^>]*?(?P<empty>/)?>"))?;
        Ok(SentenceSource::Xml { node_path, tags })
    }

    pub fn json(attribute: &str, node_attribute: Option<&str>) -> Self {
        SentenceSource::Json {
            attribute: attribute.to_string(),
            node_attribute: node_attribute.map(str::to_string),
        }
    }

    pub fn defined<F>(parser: F) -> Self
        where F: Fn(&Path) -> Result<Sentences<'static>> + Send + Sync + 'static {
        SentenceSource::Defined(Arc::new(parser))
    }

    /// Pick a source by the name used on the command line and in config files
    pub fn from_kind(kind: &str, json_attribute: &str, xml_node_path: Option<&str>,
                     node_attribute: Option<&str>) -> Result<Self> {
        match kind {
            "txt" => Ok(SentenceSource::Text),
            "json" => Ok(SentenceSource::json(json_attribute, node_attribute)),
            "xml" => match xml_node_path {
                Some(path) => SentenceSource::xml(path),
                None => Err(Error::Configuration("the xml file parser needs xml_node_path".into())),
            },
            "defined" => Err(Error::Configuration(
                "the defined file parser has to be supplied as a function through the library".into())),
            other => Err(Error::Configuration(format!(
                "file_parser should be txt, xml, json or defined, not \"{}\"", other))),
        }
    }

    /// The name of the per-document node records this source produces, if any
    pub fn node_attribute(&self) -> Option<&str> {
        match *self {
            SentenceSource::Json { node_attribute: Some(ref attr), .. } => Some(attr),
            _ => None,
        }
    }

    /// Stream the sentences of one file
    pub fn sentences<'a>(&'a self, path: &Path) -> Result<Sentences<'a>> {
        match *self {
            SentenceSource::Text => {
                let file = File::open(path).map_err(|e| ingestion(path, e))?;
                let owned = path.to_path_buf();
                Ok(Box::new(BufReader::new(file).lines().filter_map(move |line| match line {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() { None } else { Some(Ok(line.to_string())) }
                    }
                    Err(e) => Some(Err(ingestion(&owned, e))),
                })))
            }
            SentenceSource::Xml { ref node_path, ref tags } => {
                let text = fs::read_to_string(path).map_err(|e| ingestion(path, e))?;
                let paragraphs = xml_paragraphs(&text, node_path, tags);
                Ok(Box::new(split_paragraphs(paragraphs).map(Ok)))
            }
            SentenceSource::Json { ref attribute, .. } => {
                let paragraphs = json_values(path, attribute)?;
                Ok(Box::new(split_paragraphs(paragraphs).map(Ok)))
            }
            SentenceSource::Defined(ref parser) => parser(path),
        }
    }

    /// The node records (e.g. authors) of one file; empty unless configured
    pub fn nodes(&self, path: &Path) -> Result<Vec<String>> {
        match self.node_attribute() {
            Some(attr) => json_values(path, attr),
            None => Ok(vec![]),
        }
    }
}

fn ingestion<E: fmt::Display>(path: &Path, err: E) -> Error {
    Error::Ingestion(path.to_path_buf(), err.to_string())
}

fn split_paragraphs(paragraphs: Vec<String>) -> impl Iterator<Item = String> {
    paragraphs.into_iter().flat_map(|paragraph| {
        paragraph.split_sentence_bounds()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<String>>()
    })
}

/// The character of one entity name (the text between `&` and `;`)
fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => name.strip_prefix('#').and_then(|dec| dec.parse().ok()),
            };
            code.and_then(std::char::from_u32)
        }
    }
}

/// Decode the predefined and numeric character references, in a single pass. Anything else
/// that starts with `&` is kept as written.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        // `&#x10FFFF;` is the longest reference we decode
        let decoded = rest.find(';')
            .filter(|&end| end <= 9)
            .and_then(|end| entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Collect the text under every element whose ancestry ends with `node_path`
fn xml_paragraphs(text: &str, node_path: &[String], tags: &Regex) -> Vec<String> {
    let mut paragraphs = vec![];
    let mut stack: Vec<&str> = vec![];
    // Depth of the element being captured, if we are inside one
    let mut capture: Option<usize> = None;
    let mut buf = String::new();
    let mut last = 0;
    for caps in tags.captures_iter(text) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if capture.is_some() {
            buf.push_str(&decode_entities(&text[last..whole.start()]));
            buf.push(' ');
        }
        last = whole.end();
        if let Some(cdata) = caps.name("cdata") {
            if capture.is_some() {
                buf.push_str(cdata.as_str());
            }
            continue;
        }
        let name = match caps.name("name") {
            Some(n) => n.as_str(),
            None => continue, // comment or declaration
        };
        if caps.name("close").is_some() {
            if let Some(pos) = stack.iter().rposition(|t| *t == name) {
                stack.truncate(pos);
            }
            if let Some(depth) = capture {
                if stack.len() < depth {
                    let paragraph = buf.trim().to_string();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph);
                    }
                    buf.clear();
                    capture = None;
                }
            }
        } else if caps.name("empty").is_none() {
            stack.push(name);
            if capture.is_none() && stack.len() >= node_path.len()
                && stack[stack.len() - node_path.len()..].iter().zip(node_path).all(|(a, b)| *a == b.as_str()) {
                capture = Some(stack.len());
            }
        }
    }
    paragraphs
}

/// All string values at a dotted attribute path, over one document or an array of them
fn json_values(path: &Path, attribute: &str) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| ingestion(path, e))?;
    let doc: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| ingestion(path, e))?;
    let documents = match doc {
        Value::Array(docs) => docs,
        other => vec![other],
    };
    let mut found = false;
    let mut values = vec![];
    for document in &documents {
        let mut node = Some(document);
        for key in attribute.split('.') {
            node = node.and_then(|n| n.get(key));
        }
        match node {
            Some(&Value::String(ref s)) => { found = true; values.push(s.clone()); }
            Some(&Value::Array(ref items)) => {
                found = true;
                values.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
            Some(_) => { found = true; }
            None => {}
        }
    }
    if !found && !documents.is_empty() {
        return Err(ingestion(path, format!("no document has the attribute \"{}\"", attribute)));
    }
    Ok(values)
}
