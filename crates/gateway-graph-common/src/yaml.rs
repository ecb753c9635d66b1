//! YAML loading for configuration files and resource manifests
//!
//! YAML is parsed with yaml-rust2 and converted to `serde_json::Value`, so
//! every typed structure only needs serde's JSON data model.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::Error;

/// Parse a single YAML document into a JSON value
///
/// Returns `Value::Null` for empty input. Extra documents are ignored.
pub fn parse_yaml(input: &str) -> Result<Value, Error> {
    let docs = load(input)?;
    match docs.into_iter().next() {
        Some(doc) => to_json(doc),
        None => Ok(Value::Null),
    }
}

/// Parse a multi-document YAML stream into JSON values
///
/// Empty documents (e.g. a trailing `---`) are skipped.
pub fn parse_yaml_documents(input: &str) -> Result<Vec<Value>, Error> {
    load(input)?
        .into_iter()
        .map(to_json)
        .filter(|doc| !matches!(doc, Ok(Value::Null)))
        .collect()
}

fn load(input: &str) -> Result<Vec<Yaml>, Error> {
    YamlLoader::load_from_str(input).map_err(|e| Error::serialization(e.to_string()))
}

fn to_json(yaml: Yaml) -> Result<Value, Error> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| Error::serialization(e.to_string()))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((key_string(k)?, to_json(v)?)))
            .collect::<Result<Map<String, Value>, Error>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(Error::serialization("YAML aliases are not supported")),
        Yaml::BadValue => Err(Error::serialization("bad YAML value")),
    }
}

fn key_string(key: Yaml) -> Result<String, Error> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(Error::serialization("unsupported YAML key type")),
    }
}
