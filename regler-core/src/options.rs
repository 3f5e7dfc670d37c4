//! Interpretation of a setting's options matrix.
//!
//! Each active row maps a builder param name to a literal argument. The
//! literal is parsed against the param's declared shape, it is never
//! evaluated. Resolution failures stay local: the field degrades to the
//! registry's fallback type so the settings UI cannot be broken by a
//! corrupt configuration.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::codec;
use crate::codec::SettingValue;
use crate::fields::FieldRegistry;
use crate::fields::FieldType;
use crate::fields::ParamShape;
use crate::model::OptionRow;
use crate::model::Setting;

/// Error returned by [`parse_literal`]
#[derive(Debug, Error)]
pub enum LiteralError {
    /// The literal is not valid JSON.
    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    /// The literal parsed but has the wrong shape.
    #[error("Expected a {expected} literal, got a {got}")]
    Shape {
        expected: &'static str,
        got: &'static str,
    },
}

/// Error returned by [`resolve`]
#[derive(Debug, Error)]
pub enum ResolveError {
    /// An active row carries a literal the param cannot accept.
    #[error("Bad literal for param '{param}': {source}")]
    BadLiteral {
        param: String,
        source: LiteralError,
    },
}

/// Parses a param literal in the restricted grammar.
///
/// The grammar is plain JSON checked against the param's shape, with one
/// concession to hand-typed input: a literal which is not valid JSON is
/// accepted verbatim for [`ParamShape::Text`] params, so admins may write
/// `Pick one…` instead of `"Pick one…"`.
pub fn parse_literal(shape: ParamShape, text: &str) -> Result<serde_json::Value, LiteralError> {
    let text = text.trim();

    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value,
        Err(error) => {
            if shape == ParamShape::Text {
                return Ok(serde_json::Value::String(text.to_string()));
            }
            return Err(LiteralError::Parse(error));
        }
    };

    if shape_matches(shape, &value) {
        Ok(value)
    } else {
        Err(LiteralError::Shape {
            expected: shape.name(),
            got: json_kind(&value),
        })
    }
}

fn shape_matches(shape: ParamShape, value: &serde_json::Value) -> bool {
    match shape {
        ParamShape::Bool => value.is_boolean(),
        ParamShape::Integer => value.is_i64() || value.is_u64(),
        ParamShape::Number => value.is_number(),
        ParamShape::Text => value.is_string(),
        ParamShape::List => value.is_array(),
        ParamShape::Map => value.is_object(),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "text",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}

/// Resolves a setting's option rows against its field type.
///
/// Inactive rows are skipped. Rows naming a param the type does not
/// declare are ignored as well: they are stale leftovers from a previous
/// type and harmless by contract. The last row wins per param name and
/// the result iterates in name order.
pub fn resolve(
    field: &FieldType,
    rows: &[OptionRow],
) -> Result<BTreeMap<&'static str, serde_json::Value>, ResolveError> {
    let mut params = BTreeMap::new();

    for row in rows {
        if !row.active {
            continue;
        }
        let Some(param) = field.find_param(&row.name) else {
            debug!(param = row.name.as_str(), "Skipping stale option row");
            continue;
        };
        let value =
            parse_literal(param.shape, &row.param).map_err(|source| ResolveError::BadLiteral {
                param: row.name.clone(),
                source,
            })?;
        params.insert(param.name, value);
    }

    Ok(params)
}

/// Everything the (external) renderer needs to draw one setting's field.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedField {
    /// Identifier of the resolved field type.
    ///
    /// This is the registry's fallback when the stored type could not be
    /// resolved, not necessarily the type on the record.
    pub field_type: &'static str,

    /// Name path the widget submits its value under.
    pub field_name: String,

    /// Title shown above the field.
    pub title: String,

    /// Help text shown below it.
    pub help: Option<String>,

    /// The setting's decoded value.
    pub value: Option<SettingValue>,

    /// Resolved builder params, in name order.
    pub params: BTreeMap<&'static str, serde_json::Value>,
}

/// Builds the renderable field for a setting.
///
/// This cannot fail: an unknown field type or a bad param literal is
/// logged and the setting degrades to the registry's fallback type with
/// no params applied.
pub fn build_field(registry: &FieldRegistry, setting: &Setting) -> RenderedField {
    let mut field = match registry.get(&setting.field_type) {
        Some(field) => field,
        None => {
            warn!(
                key = &*setting.key,
                field_type = &*setting.field_type,
                "Unknown field type, falling back to a generic input"
            );
            registry.fallback()
        }
    };

    let params = match resolve(field, &setting.options.0) {
        Ok(params) => params,
        Err(error) => {
            warn!(
                key = &*setting.key,
                field_type = field.ident(),
                error.display = %error,
                "Failed to resolve field options, falling back to a generic input"
            );
            field = registry.fallback();
            BTreeMap::new()
        }
    };

    RenderedField {
        field_type: field.ident(),
        field_name: format!("{}.new_value", &*setting.key),
        title: setting.name.to_string(),
        help: setting.description.clone(),
        value: codec::decode(setting.value.as_deref(), setting.is_array_value),
        params,
    }
}

#[cfg(test)]
mod tests {
    use rorm::fields::types::Json;
    use rorm::fields::types::MaxStr;
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;
    use crate::fields::FieldKind;

    fn setting(field_type: &str, options: Vec<OptionRow>) -> Setting {
        Setting {
            key: MaxStr::new("site_mode".to_string()).expect("short key"),
            field_type: MaxStr::new(field_type.to_string()).expect("short ident"),
            name: MaxStr::new("Site Mode".to_string()).expect("short name"),
            group: MaxStr::new("General".to_string()).expect("short group"),
            position: 1,
            description: Some("How the site behaves".to_string()),
            value: None,
            options: Json(options),
            is_array_value: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn row(active: bool, name: &str, param: &str) -> OptionRow {
        OptionRow {
            active,
            name: name.to_string(),
            param: param.to_string(),
            full: None,
        }
    }

    #[test]
    fn literals_parse_against_their_shape() {
        assert_eq!(
            parse_literal(ParamShape::Bool, "true").expect("valid"),
            json!(true)
        );
        assert_eq!(
            parse_literal(ParamShape::Integer, " 42 ").expect("valid"),
            json!(42)
        );
        assert_eq!(
            parse_literal(ParamShape::Number, "1.5").expect("valid"),
            json!(1.5)
        );
        assert_eq!(
            parse_literal(ParamShape::Map, r#"{"a": "A"}"#).expect("valid"),
            json!({"a": "A"})
        );
        assert_eq!(
            parse_literal(ParamShape::List, r#"[1, 2]"#).expect("valid"),
            json!([1, 2])
        );
    }

    #[test]
    fn bare_text_is_accepted_for_text_params_only() {
        assert_eq!(
            parse_literal(ParamShape::Text, "Pick one").expect("bare text"),
            json!("Pick one")
        );
        assert!(matches!(
            parse_literal(ParamShape::Map, "Pick one"),
            Err(LiteralError::Parse(_))
        ));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        assert!(matches!(
            parse_literal(ParamShape::Bool, "1"),
            Err(LiteralError::Shape { expected: "bool", got: "number" })
        ));
        assert!(matches!(
            parse_literal(ParamShape::Integer, "1.5"),
            Err(LiteralError::Shape { expected: "integer", .. })
        ));
    }

    #[test]
    fn resolve_keeps_active_known_rows_only() {
        let registry = FieldRegistry::builtins();
        let select = registry.get("select").expect("builtin");

        let params = resolve(
            select,
            &[
                row(true, "options", r#"{"on": "On", "off": "Off"}"#),
                row(false, "multiple", "true"),
                // stale leftover from a previous matrix type
                row(true, "columns", r#"["key"]"#),
            ],
        )
        .expect("valid rows");

        assert_eq!(
            params.keys().copied().collect::<Vec<_>>(),
            vec!["options"]
        );
    }

    #[test]
    fn resolve_iterates_in_name_order_with_last_row_winning() {
        let registry = FieldRegistry::builtins();
        let select = registry.get("select").expect("builtin");

        let params = resolve(
            select,
            &[
                row(true, "multiple", "true"),
                row(true, "empty", "No selection"),
                row(true, "multiple", "false"),
            ],
        )
        .expect("valid rows");

        assert_eq!(
            params.keys().copied().collect::<Vec<_>>(),
            vec!["empty", "multiple"]
        );
        assert_eq!(params["multiple"], json!(false));
    }

    #[test]
    fn unknown_type_degrades_to_the_fallback() {
        let registry = FieldRegistry::builtins();
        let rendered = build_field(&registry, &setting("holo_display", Vec::new()));
        assert_eq!(rendered.field_type, "input");
        assert!(rendered.params.is_empty());
        assert_eq!(rendered.field_name, "site_mode.new_value");
        assert_eq!(rendered.title, "Site Mode");
    }

    #[test]
    fn bad_literal_degrades_to_the_fallback() {
        let registry = FieldRegistry::builtins();
        let rendered = build_field(
            &registry,
            &setting("select", vec![row(true, "options", "{not json")]),
        );
        assert_eq!(rendered.field_type, "input");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn valid_options_render_on_the_declared_type() {
        let registry = FieldRegistry::builtins();
        let rendered = build_field(
            &registry,
            &setting("select", vec![row(true, "options", r#"{"a": "A"}"#)]),
        );
        assert_eq!(rendered.field_type, "select");
        assert_eq!(rendered.params["options"], json!({"a": "A"}));
        assert_eq!(
            registry.get("select").map(FieldType::field_kind),
            Some(FieldKind::Scalar)
        );
    }
}
