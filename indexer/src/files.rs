use kvsearch_core::{Article, Corpus, SearchError};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Articles read from `.json` (one object or an array of objects) and `.jsonl` files. A
/// directory is walked recursively in path order.
pub struct FileCorpus {
    files: Vec<PathBuf>,
}

impl FileCorpus {
    pub fn open<P: AsRef<Path>>(input: P) -> anyhow::Result<Self> {
        let input = input.as_ref();
        let mut files = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && is_input_file(p) {
                    files.push(p.to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            anyhow::bail!("input path {} does not exist", input.display());
        }
        tracing::info!(files = files.len(), input = %input.display(), "collected input files");
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] { &self.files }
}

fn is_input_file(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl"))
}

fn corpus_err(file: &Path, detail: impl std::fmt::Display) -> SearchError {
    SearchError::Corpus(format!("{}: {detail}", file.display()))
}

/// Accepts numeric ids, `body` in place of `content`, and missing text fields. Records that end up
/// with no usable id or text are left for the loader to reject.
fn to_article(file: &Path, value: Value) -> kvsearch_core::Result<Article> {
    let Value::Object(mut obj) = value else {
        return Err(corpus_err(file, "record is not a JSON object"));
    };
    if let Some(Value::Number(n)) = obj.get("id") {
        let id = n.to_string();
        obj.insert("id".into(), Value::String(id));
    }
    if !obj.contains_key("content") {
        if let Some(body) = obj.remove("body") {
            obj.insert("content".into(), body);
        }
    }
    fill_missing(&mut obj, &["id", "title", "content", "author"]);
    serde_json::from_value(Value::Object(obj)).map_err(|e| corpus_err(file, e))
}

fn fill_missing(obj: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if obj.get(*key).map_or(true, Value::is_null) {
            obj.insert((*key).to_string(), Value::String(String::new()));
        }
    }
}

type Records = Box<dyn Iterator<Item = kvsearch_core::Result<Article>> + Send>;

fn read_file(file: PathBuf) -> Records {
    let f = match File::open(&file) {
        Ok(f) => f,
        Err(e) => return Box::new(std::iter::once(Err(corpus_err(&file, e)))),
    };
    let reader = BufReader::new(f);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        Box::new(reader.lines().enumerate().filter_map(move |(n, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(corpus_err(&file, e))),
            };
            if line.trim().is_empty() {
                return None;
            }
            let parsed = serde_json::from_str::<Value>(&line).map_err(|e| corpus_err(&file, format!("line {}: {e}", n + 1)));
            Some(parsed.and_then(|v| to_article(&file, v)))
        }))
    } else {
        match serde_json::from_reader::<_, Value>(reader) {
            Ok(Value::Array(items)) => Box::new(items.into_iter().map(move |v| to_article(&file, v))),
            Ok(value) => Box::new(std::iter::once(to_article(&file, value))),
            Err(e) => Box::new(std::iter::once(Err(corpus_err(&file, e)))),
        }
    }
}

impl Corpus for FileCorpus {
    fn documents(&self) -> Box<dyn Iterator<Item = kvsearch_core::Result<Article>> + Send + '_> {
        Box::new(self.files.iter().cloned().flat_map(read_file))
    }
}
