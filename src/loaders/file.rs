//! Primary loader: reads files by suffix.
//!
//! # Supported Formats
//! - `csv`, `tsv`: delimited text with a header row (kwargs: `delimiter`/`sep`,
//!   `has_header`, `names`)
//! - `json`: an array of records
//! - `jsonl`, `ndjson`: one record per line
//!
//! Any of these may be wrapped in `gz`/`gzip` or a single-member `zip`
//! (`sales.csv.gz`, `s3://bucket/sales.csv.zip`); the format comes from the
//! inner suffix.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde_json::{Map, Number, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::datasets::DatasetDefinition;
use crate::loaders::{DatasetLoader, Frame, LoaderFailure, ParamBucket};
use crate::source::{ReadSource, SourceLocation};

/// Compression suffixes that are recognised but cannot be read.
pub const UNSUPPORTED_COMPRESSION: &[&str] = &["bz2", "zstd", "xz", "tar"];

/// Compression wrapped around a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zip,
}

impl Compression {
    pub const SUFFIXES: &'static [&'static str] = &["gz", "gzip", "zip"];

    fn from_suffix(suffix: &str) -> Result<Self, String> {
        match suffix {
            "gz" | "gzip" => Ok(Self::Gzip),
            "zip" => Ok(Self::Zip),
            other if UNSUPPORTED_COMPRESSION.contains(&other) => Err(format!(
                "'{}' compression is not supported; use one of {}",
                other,
                Self::SUFFIXES.join(", ")
            )),
            _ => Ok(Self::None),
        }
    }

    /// Undo the compression. A zip archive must hold exactly one file.
    pub fn decompress(self, raw: Vec<u8>) -> Result<Vec<u8>, LoaderFailure> {
        match self {
            Self::None => Ok(raw),
            Self::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(raw.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| LoaderFailure::Malformed(format!("gzip: {}", e)))?;
                Ok(out)
            }
            Self::Zip => {
                let zip_error = |e: zip::result::ZipError| LoaderFailure::Malformed(format!("zip: {}", e));
                let mut archive = zip::ZipArchive::new(Cursor::new(raw)).map_err(zip_error)?;
                if archive.len() != 1 {
                    return Err(LoaderFailure::Malformed(format!(
                        "zip: expected one file in the archive, found {}",
                        archive.len()
                    )));
                }
                let mut member = archive.by_index(0).map_err(zip_error)?;
                let mut out = Vec::new();
                member
                    .read_to_end(&mut out)
                    .map_err(|e| LoaderFailure::Malformed(format!("zip: {}", e)))?;
                Ok(out)
            }
        }
    }
}

/// File formats the primary loader can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    JsonLines,
}

impl FileFormat {
    pub const SUFFIXES: &'static [&'static str] = &["csv", "tsv", "json", "jsonl", "ndjson"];

    /// Derive the format from the path's suffix. Query strings are ignored.
    pub fn from_path(path: &str) -> Result<Self, String> {
        Self::with_compression(path).map(|(format, _)| format)
    }

    /// Derive the format and the compression wrapped around it.
    pub fn with_compression(path: &str) -> Result<(Self, Compression), String> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        let mut suffixes = file_name.rsplit('.');
        let last = suffixes.next().unwrap_or(&file_name);

        let compression = Compression::from_suffix(last)?;
        let suffix = match compression {
            Compression::None => last,
            _ => suffixes.next().unwrap_or(""),
        };

        let format = match suffix {
            "csv" => Self::Csv,
            "tsv" => Self::Tsv,
            "json" => Self::Json,
            "jsonl" | "ndjson" => Self::JsonLines,
            other => {
                return Err(format!(
                    "suffix '{}' not in {}",
                    other,
                    Self::SUFFIXES.join(", ")
                ))
            }
        };
        Ok((format, compression))
    }

    fn default_delimiter(self) -> u8 {
        match self {
            Self::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Reader options taken from `loader_kwargs`.
#[derive(Debug, Clone, PartialEq)]
struct ReadOptions {
    delimiter: Option<u8>,
    has_header: bool,
    names: Option<Vec<String>>,
}

impl ReadOptions {
    fn from_kwargs(kwargs: &toml::Table) -> Result<Self, LoaderFailure> {
        let mut options = Self {
            delimiter: None,
            has_header: true,
            names: None,
        };

        for (key, value) in kwargs {
            let invalid = |message: &str| LoaderFailure::InvalidParameter {
                key: key.clone(),
                message: message.to_string(),
            };
            match key.as_str() {
                "delimiter" | "sep" => {
                    let text = value.as_str().ok_or_else(|| invalid("expected a string"))?;
                    match text.as_bytes() {
                        [byte] if byte.is_ascii() => options.delimiter = Some(*byte),
                        _ => return Err(invalid("expected exactly one ASCII character")),
                    }
                }
                "has_header" => {
                    options.has_header = value.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
                }
                "names" => {
                    let names = value
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|v| v.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| invalid("expected an array of strings"))?;
                    options.names = Some(names);
                }
                _ => return Err(invalid("unknown option for the file loader")),
            }
        }

        Ok(options)
    }
}

/// Reads the definition's `source_path` through a [`ReadSource`].
pub struct FileLoader {
    reader: Arc<dyn ReadSource>,
}

impl FileLoader {
    pub const ID: &'static str = "file";

    pub fn new(reader: Arc<dyn ReadSource>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl DatasetLoader for FileLoader {
    fn id(&self) -> &str {
        Self::ID
    }

    fn prefix(&self) -> Option<String> {
        None
    }

    async fn load(
        &self,
        definition: &DatasetDefinition,
        _params: &ParamBucket,
    ) -> Result<Frame, LoaderFailure> {
        let (format, compression) =
            FileFormat::with_compression(&definition.source_path).map_err(LoaderFailure::Format)?;
        let options = ReadOptions::from_kwargs(&definition.loader_kwargs)?;
        let location = SourceLocation::parse(&definition.source_path)?;

        let raw = compression.decompress(self.reader.read(&location).await?)?;

        let (headers, rows) = match format {
            FileFormat::Csv | FileFormat::Tsv => {
                let delimiter = options.delimiter.unwrap_or(format.default_delimiter());
                delimited_records(&raw, delimiter, &options)?
            }
            FileFormat::Json => {
                let text = utf8(&raw)?;
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| LoaderFailure::Malformed(e.to_string()))?;
                let Value::Array(items) = value else {
                    return Err(LoaderFailure::Malformed("expected an array of records".to_string()));
                };
                json_records(items)?
            }
            FileFormat::JsonLines => {
                let items = utf8(&raw)?
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(n, line)| {
                        serde_json::from_str(line)
                            .map_err(|e| LoaderFailure::Malformed(format!("line {}: {}", n + 1, e)))
                    })
                    .collect::<Result<Vec<Value>, _>>()?;
                json_records(items)?
            }
        };

        let frame = Frame::from_records(&definition.index_column, headers, rows)?;
        frame.require_columns(definition.aggregations.keys())?;
        Ok(frame)
    }

    fn keyed_params(&self, _params: &ParamBucket) -> ParamBucket {
        ParamBucket::new()
    }
}

type Records = (Vec<String>, Vec<Vec<Value>>);

fn utf8(raw: &[u8]) -> Result<&str, LoaderFailure> {
    std::str::from_utf8(raw).map_err(|e| LoaderFailure::Malformed(format!("not UTF-8: {}", e)))
}

fn csv_error(e: csv::Error) -> LoaderFailure {
    LoaderFailure::Malformed(e.to_string())
}

fn delimited_records(raw: &[u8], delimiter: u8, options: &ReadOptions) -> Result<Records, LoaderFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(options.has_header)
        .flexible(false)
        .from_reader(raw);

    let headers = match (&options.names, options.has_header) {
        (Some(names), _) => names.clone(),
        (None, true) => reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect(),
        (None, false) => {
            return Err(LoaderFailure::InvalidParameter {
                key: "names".to_string(),
                message: "required when has_header = false".to_string(),
            })
        }
    };

    let rows = reader
        .records()
        .map(|record| record.map(|fields| fields.iter().map(infer_cell).collect()))
        .collect::<Result<Vec<Vec<Value>>, csv::Error>>()
        .map_err(csv_error)?;
    Ok((headers, rows))
}

fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

fn json_records(items: Vec<Value>) -> Result<Records, LoaderFailure> {
    let mut headers: Vec<String> = Vec::new();
    let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(items.len());

    for (n, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            return Err(LoaderFailure::Malformed(format!("record {} is not an object", n + 1)));
        };
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        objects.push(object);
    }

    let rows = objects
        .into_iter()
        .map(|mut object| {
            headers
                .iter()
                .map(|h| object.remove(h).unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use std::collections::HashMap;

    struct Files(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ReadSource for Files {
        async fn read(&self, location: &SourceLocation) -> Result<Vec<u8>, SourceError> {
            self.0
                .get(&location.to_string())
                .cloned()
                .ok_or_else(|| SourceError::NotFound(location.to_string()))
        }
    }

    fn loader(files: &[(&str, &str)]) -> FileLoader {
        binary_loader(files.iter().map(|(k, v)| (*k, v.as_bytes().to_vec())).collect())
    }

    fn binary_loader(files: Vec<(&str, Vec<u8>)>) -> FileLoader {
        let files = files.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        FileLoader::new(Arc::new(Files(files)))
    }

    const SALES: &str = "ts,amount\n2019-05-11,20\n2019-05-12,19\n2019-05-13,23\n";

    fn gzipped(text: &str) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn zipped(members: &[(&str, &str)]) -> Vec<u8> {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, text) in members {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(text.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path("data.csv"), Ok(FileFormat::Csv));
        assert_eq!(FileFormat::from_path("s3://b/DATA.JSON"), Ok(FileFormat::Json));
        assert_eq!(
            FileFormat::from_path("https://x/d.ndjson?token=1"),
            Ok(FileFormat::JsonLines)
        );
        assert!(FileFormat::from_path("data.xlsx").unwrap_err().contains("xlsx"));
        assert!(FileFormat::from_path("README").is_err());
    }

    #[test]
    fn test_compressed_paths() {
        assert_eq!(
            FileFormat::with_compression("s3://my-bucket/my-data.csv.zip"),
            Ok((FileFormat::Csv, Compression::Zip))
        );
        assert_eq!(
            FileFormat::with_compression("rows.JSONL.gz"),
            Ok((FileFormat::JsonLines, Compression::Gzip))
        );
        assert_eq!(
            FileFormat::with_compression("rows.tsv.gzip?v=2"),
            Ok((FileFormat::Tsv, Compression::Gzip))
        );
        assert_eq!(
            FileFormat::with_compression("rows.csv"),
            Ok((FileFormat::Csv, Compression::None))
        );
        assert!(FileFormat::from_path("data.csv.bz2").unwrap_err().contains("bz2"));
        assert!(FileFormat::from_path("data.xlsx.gz").unwrap_err().contains("xlsx"));
        assert!(FileFormat::from_path("data.gz").is_err());
    }

    #[tokio::test]
    async fn test_quotes_inside_unquoted_fields() {
        let loader = loader(&[(
            "/data/tv.csv",
            "ts,item,n\n2019-05-11,5\" screen,3\n2019-05-12,7\" screen,4\n",
        )]);
        let def = DatasetDefinition::new("tv", "local:///data/tv.csv", "ts");

        let frame = loader.load(&def, &ParamBucket::new()).await.unwrap();
        assert_eq!(frame.len(), 2);
        let item = frame.column("item").unwrap();
        assert_eq!(item.values[0], Value::from("5\" screen"));
        assert_eq!(item.values[1], Value::from("7\" screen"));
        assert_eq!(frame.column("n").unwrap().values[1], Value::from(4));
    }

    #[tokio::test]
    async fn test_quoted_fields_and_blank_lines() {
        let loader = loader(&[(
            "q.csv",
            "ts,note\r\n2019-05-11,\"x, y\"\r\n\r\n2019-05-12,\"say \"\"hi\"\"\"\r\n",
        )]);
        let frame = loader
            .load(&DatasetDefinition::new("q", "q.csv", "ts"), &ParamBucket::new())
            .await
            .unwrap();
        let note = frame.column("note").unwrap();
        assert_eq!(note.values, vec![Value::from("x, y"), Value::from("say \"hi\"")]);
    }

    #[tokio::test]
    async fn test_ragged_rows_rejected() {
        let loader = loader(&[("r.csv", "ts,a\n2019-05-11,1\n2019-05-12,2,3\n")]);
        let err = loader
            .load(&DatasetDefinition::new("r", "r.csv", "ts"), &ParamBucket::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderFailure::Malformed(_)));
    }

    #[tokio::test]
    async fn test_load_gzipped_csv() {
        let loader = binary_loader(vec![("/data/sales.csv.gz", gzipped(SALES))]);
        let def = DatasetDefinition::new("sales", "local:///data/sales.csv.gz", "ts");

        let frame = loader.load(&def, &ParamBucket::new()).await.unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("amount").unwrap().values[2], Value::from(23));
    }

    #[tokio::test]
    async fn test_load_zipped_csv() {
        let loader = binary_loader(vec![
            ("sales.csv.zip", zipped(&[("sales.csv", SALES)])),
            ("two.csv.zip", zipped(&[("a.csv", SALES), ("b.csv", SALES)])),
            ("broken.csv.gz", b"not gzip".to_vec()),
        ]);

        let frame = loader
            .load(&DatasetDefinition::new("sales", "sales.csv.zip", "ts"), &ParamBucket::new())
            .await
            .unwrap();
        assert_eq!(frame.len(), 3);

        let err = loader
            .load(&DatasetDefinition::new("two", "two.csv.zip", "ts"), &ParamBucket::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderFailure::Malformed(m) if m.contains("found 2")));

        let err = loader
            .load(&DatasetDefinition::new("broken", "broken.csv.gz", "ts"), &ParamBucket::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderFailure::Malformed(m) if m.starts_with("gzip")));
    }

    #[tokio::test]
    async fn test_load_csv() {
        let loader = loader(&[(
            "/data/sales.csv",
            "ts,amount,store\n2019-05-11,20,north\n2019-05-12,19.5,\n",
        )]);
        let mut def = DatasetDefinition::new("sales", "local:///data/sales.csv", "ts");
        def.aggregations.insert("amount".into(), "sum".into());

        let frame = loader.load(&def, &ParamBucket::new()).await.unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column_names(), vec!["amount", "store"]);
        let amount = frame.column("amount").unwrap();
        assert_eq!(amount.values[0], Value::from(20));
        assert_eq!(amount.values[1], Value::from(19.5));
        assert_eq!(frame.column("store").unwrap().values[1], Value::Null);
    }

    #[tokio::test]
    async fn test_load_csv_with_kwargs() {
        let loader = loader(&[("rows.csv", "2019-05-11;1\n2019-05-12;2\n")]);
        let mut def = DatasetDefinition::new("rows", "rows.csv", "day");
        def.loader_kwargs.insert("sep".into(), toml::Value::String(";".into()));
        def.loader_kwargs.insert("has_header".into(), toml::Value::Boolean(false));
        def.loader_kwargs.insert(
            "names".into(),
            toml::Value::Array(vec!["day".into(), "n".into()]),
        );

        let frame = loader.load(&def, &ParamBucket::new()).await.unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column_names(), vec!["n"]);
    }

    #[tokio::test]
    async fn test_unknown_kwarg_rejected() {
        let loader = loader(&[("a.csv", "ts\n2019-01-01\n")]);
        let mut def = DatasetDefinition::new("a", "a.csv", "ts");
        def.loader_kwargs.insert("engine".into(), toml::Value::String("c".into()));

        let err = loader.load(&def, &ParamBucket::new()).await.unwrap_err();
        assert!(matches!(err, LoaderFailure::InvalidParameter { key, .. } if key == "engine"));
    }

    #[tokio::test]
    async fn test_load_json_and_jsonl() {
        let loader = loader(&[
            ("a.json", r#"[{"ts": "2019-05-11", "x": 1}, {"ts": "2019-05-12", "y": 2}]"#),
            ("b.jsonl", "{\"ts\": 1557606600, \"x\": 1}\n\n{\"ts\": 1557606900, \"x\": 2}\n"),
        ]);

        let a = loader
            .load(&DatasetDefinition::new("a", "a.json", "ts"), &ParamBucket::new())
            .await
            .unwrap();
        assert_eq!(a.column_names(), vec!["x", "y"]);
        assert_eq!(a.column("y").unwrap().values[0], Value::Null);

        let b = loader
            .load(&DatasetDefinition::new("b", "b.jsonl", "ts"), &ParamBucket::new())
            .await
            .unwrap();
        assert_eq!(b.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_aggregation_column() {
        let loader = loader(&[("a.csv", "ts,x\n2019-01-01,1\n")]);
        let mut def = DatasetDefinition::new("a", "a.csv", "ts");
        def.aggregations.insert("y".into(), "max".into());

        let err = loader.load(&def, &ParamBucket::new()).await.unwrap_err();
        assert!(matches!(err, LoaderFailure::MissingColumn(c) if c == "y"));
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let loader = loader(&[]);
        let err = loader
            .load(&DatasetDefinition::new("a", "gone.csv", "ts"), &ParamBucket::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderFailure::Source(SourceError::NotFound(_))));
    }

    #[test]
    fn test_params_do_not_key_the_cache() {
        let loader = loader(&[]);
        let mut params = ParamBucket::new();
        params.insert("step".into(), "3".into());
        assert!(loader.keyed_params(&params).is_empty());
    }
}
