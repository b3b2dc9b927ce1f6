//! Argument preset engine (§4.4): applies configured preset values at a
//! JSON-path location in the argument tree before a request is built,
//! filtered by a set of operation-name regexes.
//!
//! Per §9's resolved open question, each preset is applied exactly once
//! per `Apply` call — a single pass over the preset list, not the
//! recursive self-application some source variants had.

use std::collections::BTreeMap;

use httpconn_codec::error::FieldPath;
use httpconn_codec::scalar_codec::coerce_scalar;
use httpconn_schema::{ArgumentPresetConfig, HttpSchema, PresetValue, ScalarRepresentation, Value};
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::ConnectorError;

/// Only a bare field-name segment is a supported JSON-path selector
/// (§4.4, §9): no index, wildcard, or filter expressions. `path` is
/// `.`-separated, e.g. `"metadata.tenant_id"`.
fn parse_path(path: &str) -> Result<Vec<String>, ConnectorError> {
    if path.is_empty() {
        return Err(ConnectorError::InvalidArgument {
            path: path.to_string(),
            message: "argument preset path must name at least one field".to_string(),
        });
    }
    path.split('.')
        .map(|segment| {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if valid {
                Ok(segment.to_string())
            } else {
                Err(ConnectorError::InvalidArgument {
                    path: path.to_string(),
                    message: format!(
                        "unsupported argument preset path segment '{segment}': only bare field names are supported"
                    ),
                })
            }
        })
        .collect()
}

/// Look up the scalar representation of the root field a preset targets,
/// by scanning every operation the preset's targets match for an argument
/// named `path[0]`. The first matching operation whose argument resolves
/// to a scalar type wins; operations with no such argument, or whose
/// argument is an object/array type, are skipped.
fn resolve_root_scalar(schema: &HttpSchema, targets: &CompiledTargets, path: &[String]) -> Option<ScalarRepresentation> {
    let root = path.first()?;
    for name in schema.operation_names() {
        if !targets.matches(name) {
            continue;
        }
        let Some(operation) = schema.operation(name) else { continue };
        let Some(arg) = operation.arguments.get(root) else { continue };
        let Some(type_name) = arg.field.field_type.root_name() else { continue };
        if let Some(scalar) = schema.scalar_type(type_name) {
            return Some(scalar.representation.clone());
        }
    }
    None
}

struct CompiledTargets {
    patterns: Vec<Regex>,
}

impl CompiledTargets {
    fn compile(targets: &[String]) -> Result<Self, ConnectorError> {
        let patterns = targets
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ConnectorError::InvalidArgument {
                        path: pattern.clone(),
                        message: format!("invalid argument preset target regex: {e}"),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// An empty target list matches every operation; otherwise an
    /// operation matches if ANY pattern matches (§4.4).
    fn matches(&self, operation_name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(operation_name))
    }
}

/// One compiled preset, ready to apply against an invocation's arguments
/// and forwarded headers.
pub struct CompiledPreset {
    path: Vec<String>,
    /// For `PresetValue::Env`, resolved once here rather than re-read on
    /// every `apply` (§4.4, §9: "captured at construction"); `None` means
    /// either the value isn't `Env` or the variable was unset at compile
    /// time.
    resolved_env: Option<String>,
    value: PresetValue,
    targets: CompiledTargets,
    /// The target argument's root field scalar representation, if one
    /// could be resolved across the matching operations (§4.4: "coerced
    /// to the scalar representation of the target argument's root
    /// field").
    scalar_repr: Option<ScalarRepresentation>,
}

impl CompiledPreset {
    pub fn compile(config: &ArgumentPresetConfig, schema: &HttpSchema) -> Result<Self, ConnectorError> {
        let path = parse_path(&config.path)?;
        let targets = CompiledTargets::compile(&config.targets)?;
        let resolved_env = match &config.value {
            PresetValue::Env(name) => std::env::var(name).ok(),
            _ => None,
        };
        let scalar_repr = resolve_root_scalar(schema, &targets, &path);
        Ok(Self {
            path,
            resolved_env,
            value: config.value.clone(),
            targets,
            scalar_repr,
        })
    }

    fn resolve_value(&self, headers: &BTreeMap<String, String>) -> Result<Option<JsonValue>, ConnectorError> {
        let raw = match &self.value {
            PresetValue::Literal(v) => Some(v.clone()),
            PresetValue::Env(_) => self.resolved_env.clone().map(JsonValue::String),
            PresetValue::ForwardHeader(name) => headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| JsonValue::String(v.clone())),
        };
        let Some(raw) = raw else { return Ok(None) };
        let Some(repr) = &self.scalar_repr else { return Ok(Some(raw)) };
        let coerced = coerce_scalar(repr, Value::from_json(&raw), &FieldPath::root())
            .map_err(|e| ConnectorError::InvalidArgument { path: self.path.join("."), message: e.to_string() })?;
        Ok(Some(coerced.to_json()))
    }

    /// Apply this preset to `arguments` if `operation_name` is targeted
    /// (§4.4 `Apply` steps 1-3). A `null`/missing resolved value is
    /// skipped rather than writing an explicit null.
    pub fn apply(
        &self,
        operation_name: &str,
        arguments: &mut JsonValue,
        headers: &BTreeMap<String, String>,
    ) -> Result<(), ConnectorError> {
        if !self.targets.matches(operation_name) {
            return Ok(());
        }
        let Some(value) = self.resolve_value(headers)? else {
            return Ok(());
        };
        if !arguments.is_object() {
            *arguments = JsonValue::Object(serde_json::Map::new());
        }
        let mut cursor = arguments;
        for segment in &self.path[..self.path.len() - 1] {
            let obj = cursor.as_object_mut().expect("cursor is always coerced to an object above");
            cursor = obj
                .entry(segment.clone())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
            if !cursor.is_object() {
                *cursor = JsonValue::Object(serde_json::Map::new());
            }
        }
        let last = self.path.last().expect("path is non-empty, checked in parse_path");
        let obj = cursor.as_object_mut().expect("cursor is always coerced to an object above");
        obj.insert(last.clone(), value);
        Ok(())
    }
}

/// A namespace- or server-scoped set of compiled presets, applied in
/// declaration order (§4.4).
#[derive(Default)]
pub struct PresetEngine {
    presets: Vec<CompiledPreset>,
}

impl PresetEngine {
    pub fn compile(configs: &[ArgumentPresetConfig], schema: &HttpSchema) -> Result<Self, ConnectorError> {
        let presets = configs
            .iter()
            .map(|config| CompiledPreset::compile(config, schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { presets })
    }

    pub fn apply(
        &self,
        operation_name: &str,
        arguments: &mut JsonValue,
        headers: &BTreeMap<String, String>,
    ) -> Result<(), ConnectorError> {
        for preset in &self.presets {
            preset.apply(operation_name, arguments, headers)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpconn_schema::{HttpMethod, OperationInfo, RequestSpec, RuntimeSettings, ScalarRepresentation, ScalarType};
    use serde_json::json;

    fn schema() -> HttpSchema {
        HttpSchema::default()
    }

    /// A schema with one function, `setCount`, whose `count` argument is
    /// declared `Int64`, used to exercise preset value coercion against
    /// the target argument's root field representation.
    fn schema_with_int_argument() -> HttpSchema {
        let mut scalar_types = BTreeMap::new();
        scalar_types.insert("Int64".to_string(), ScalarType { representation: ScalarRepresentation::Int64 });

        let mut arguments = BTreeMap::new();
        arguments.insert(
            "count".to_string(),
            ArgumentSpec {
                field: httpconn_schema::FieldSpec { field_type: httpconn_schema::TypeRef::named("Int64"), http: None },
                http: None,
            },
        );

        let operation = OperationInfo {
            request: RequestSpec {
                url: "/count".to_string(),
                method: HttpMethod::Post,
                headers: BTreeMap::new(),
                security: vec![],
                servers: None,
                request_body: None,
                runtime: RuntimeSettings::default(),
            },
            arguments,
            result_type: httpconn_schema::TypeRef::named("Int64"),
        };

        let mut functions = BTreeMap::new();
        functions.insert("setCount".to_string(), operation);
        HttpSchema { functions, procedures: BTreeMap::new(), object_types: BTreeMap::new(), scalar_types }
    }

    #[test]
    fn literal_preset_sets_nested_field() {
        let config = ArgumentPresetConfig {
            path: "metadata.tenant_id".to_string(),
            value: PresetValue::Literal(json!("tenant-1")),
            targets: vec![],
        };
        let engine = PresetEngine::compile(&[config], &schema()).unwrap();
        let mut args = json!({});
        engine.apply("findPets", &mut args, &BTreeMap::new()).unwrap();
        assert_eq!(args, json!({"metadata": {"tenant_id": "tenant-1"}}));
    }

    #[test]
    fn target_regex_filters_operations() {
        let config = ArgumentPresetConfig {
            path: "tenant_id".to_string(),
            value: PresetValue::Literal(json!("t1")),
            targets: vec!["^find.*".to_string()],
        };
        let engine = PresetEngine::compile(&[config], &schema()).unwrap();
        let mut args = json!({});
        engine.apply("deletePet", &mut args, &BTreeMap::new()).unwrap();
        assert_eq!(args, json!({}));
        engine.apply("findPets", &mut args, &BTreeMap::new()).unwrap();
        assert_eq!(args, json!({"tenant_id": "t1"}));
    }

    #[test]
    fn forward_header_preset_reads_headers() {
        let config = ArgumentPresetConfig {
            path: "trace_id".to_string(),
            value: PresetValue::ForwardHeader("X-Trace-Id".to_string()),
            targets: vec![],
        };
        let engine = PresetEngine::compile(&[config], &schema()).unwrap();
        let mut args = json!({});
        let mut headers = BTreeMap::new();
        headers.insert("X-Trace-Id".to_string(), "abc123".to_string());
        engine.apply("op", &mut args, &headers).unwrap();
        assert_eq!(args, json!({"trace_id": "abc123"}));
    }

    #[test]
    fn indexed_path_segment_is_rejected() {
        let config = ArgumentPresetConfig {
            path: "items[0].id".to_string(),
            value: PresetValue::Literal(json!(1)),
            targets: vec![],
        };
        assert!(CompiledPreset::compile(&config, &schema()).is_err());
    }

    #[test]
    fn literal_preset_is_coerced_to_the_target_argument_scalar_type() {
        let config = ArgumentPresetConfig {
            path: "count".to_string(),
            value: PresetValue::Literal(json!("123")),
            targets: vec!["setCount".to_string()],
        };
        let engine = PresetEngine::compile(&[config], &schema_with_int_argument()).unwrap();
        let mut args = json!({});
        engine.apply("setCount", &mut args, &BTreeMap::new()).unwrap();
        assert_eq!(args, json!({"count": 123}));
    }

    #[test]
    fn env_preset_value_is_captured_once_at_compile_time() {
        let var = "HTTPCONN_PRESET_TEST_REGION";
        // SAFETY: test-only, single-threaded within this test function, and
        // the variable name is unique to this test.
        unsafe { std::env::set_var(var, "us-east-1") };

        let config = ArgumentPresetConfig {
            path: "region".to_string(),
            value: PresetValue::Env(var.to_string()),
            targets: vec![],
        };
        let engine = PresetEngine::compile(&[config], &schema()).unwrap();

        // SAFETY: same test-only justification as above.
        unsafe { std::env::remove_var(var) };

        let mut args = json!({});
        engine.apply("op", &mut args, &BTreeMap::new()).unwrap();
        assert_eq!(args, json!({"region": "us-east-1"}));
    }
}
