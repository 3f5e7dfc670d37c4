use rorm::Model;
use rorm::fields::types::Json;
use rorm::fields::types::MaxStr;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// A single named, typed, ordered configuration entry.
///
/// The `key` is the primary identity used by application code to look the
/// value up. `field_type` names a descriptor in the
/// [`FieldRegistry`](crate::fields::FieldRegistry); `options` holds the
/// admin-authored parameter rows for that type.
#[derive(Model)]
pub struct Setting {
    #[rorm(primary_key)]
    pub key: MaxStr<255>,

    /// Identifier of the entry's field type.
    ///
    /// Named `field_type` instead of the logical `type` because the latter
    /// is a keyword.
    pub field_type: MaxStr<255>,

    /// Human label shown as the field's title.
    pub name: MaxStr<255>,

    /// Settings sharing a group are displayed and ordered together.
    pub group: MaxStr<255>,

    /// Ordinal rank, unique within `group`.
    pub position: i64,

    /// Help text shown below the field.
    #[rorm(max_length = 1024)]
    pub description: Option<String>,

    /// Raw payload, either a plain scalar or a JSON document.
    ///
    /// Interpretation is governed by `is_array_value`,
    /// see [`codec`](crate::codec).
    #[rorm(max_length = 65535)]
    pub value: Option<String>,

    /// Parameter rows toggling the field type's builder params.
    pub options: Json<Vec<OptionRow>>,

    /// Storage format flag: `true` if `value` holds a JSON document.
    pub is_array_value: bool,

    pub created_at: OffsetDateTime,

    pub updated_at: OffsetDateTime,
}

/// One row of a setting's options matrix.
///
/// A row toggles a single builder param of the setting's field type.
/// `param` is a literal in the restricted grammar parsed by
/// [`options::parse_literal`](crate::options::parse_literal), never code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    /// Only active rows are applied when rendering the field.
    #[serde(default)]
    pub active: bool,

    /// Name of the builder param this row configures.
    pub name: String,

    /// Literal argument for the param.
    #[serde(default)]
    pub param: String,

    /// Display-only signature, e.g. `options({})`.
    ///
    /// Populated when rows are generated from a descriptor and tolerated
    /// on input. The resolver ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::OptionRow;

    #[test]
    fn option_row_tolerates_missing_fields() {
        let row: OptionRow = serde_json::from_str(r#"{"name": "options"}"#)
            .expect("name alone should be enough");
        assert!(!row.active);
        assert_eq!(row.name, "options");
        assert_eq!(row.param, "");
        assert_eq!(row.full, None);
    }

    #[test]
    fn option_row_roundtrips_through_json() {
        let row = OptionRow {
            active: true,
            name: "columns".to_string(),
            param: r#"["key", "value"]"#.to_string(),
            full: Some(r#"columns(["key", "value"])"#.to_string()),
        };
        let json = serde_json::to_string(&row).expect("serialization cannot fail");
        let back: OptionRow = serde_json::from_str(&json).expect("just serialized");
        assert_eq!(row, back);
    }
}
