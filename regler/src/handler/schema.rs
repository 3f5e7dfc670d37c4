//! Request and response bodies of the admin API.

use regler_core::codec;
use regler_core::codec::SettingValue;
use regler_core::fields::FieldRegistry;
use regler_core::fields::FieldTypeDescriptor;
use regler_core::model::OptionRow;
use regler_core::model::Setting;
use regler_core::options;
use regler_core::options::RenderedField;
use regler_core::store::Direction;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// One setting, plus the rendered field the UI draws for it.
#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub field_type: String,
    pub name: String,
    pub group: String,
    pub position: i64,
    pub description: Option<String>,

    /// The decoded value.
    pub value: Option<serde_json::Value>,

    pub options: Vec<OptionRow>,
    pub is_array_value: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// What the renderer needs to draw the edit widget.
    pub field: RenderedField,
}

impl SettingResponse {
    pub fn new(registry: &FieldRegistry, setting: Setting) -> Self {
        let field = options::build_field(registry, &setting);
        let value = codec::decode(setting.value.as_deref(), setting.is_array_value)
            .map(SettingValue::into_json);
        Self {
            key: setting.key.to_string(),
            field_type: setting.field_type.to_string(),
            name: setting.name.to_string(),
            group: setting.group.to_string(),
            position: setting.position,
            description: setting.description,
            value,
            options: setting.options.0,
            is_array_value: setting.is_array_value,
            created_at: setting.created_at,
            updated_at: setting.updated_at,
            field,
        }
    }
}

/// All settings, clustered by group in display order.
#[derive(Debug, Serialize)]
pub struct SettingsList {
    pub groups: Vec<SettingGroup>,
}

/// One group's tab.
#[derive(Debug, Serialize)]
pub struct SettingGroup {
    pub group: String,
    pub settings: Vec<SettingResponse>,
}

impl SettingsList {
    /// Clusters settings by group.
    ///
    /// `settings` must already be ordered by group and position, the way
    /// [`SettingStore::list`](regler_core::SettingStore::list) yields them.
    pub fn new(registry: &FieldRegistry, settings: Vec<Setting>) -> Self {
        let mut groups: Vec<SettingGroup> = Vec::new();
        for setting in settings {
            let response = SettingResponse::new(registry, setting);
            match groups.last_mut() {
                Some(group) if group.group == response.group => group.settings.push(response),
                _ => groups.push(SettingGroup {
                    group: response.group.clone(),
                    settings: vec![response],
                }),
            }
        }
        Self { groups }
    }
}

/// The available field types.
#[derive(Debug, Serialize)]
pub struct FieldTypesResponse {
    pub types: Vec<FieldTypeDescriptor>,
}

/// Body of `PUT /settings/{key}/value`
#[derive(Debug, Deserialize)]
pub struct SaveValueRequest {
    /// The new value; `null` or absent clears it.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Body of `POST /settings/{key}/move`
#[derive(Debug, Deserialize)]
pub struct MoveSettingRequest {
    pub direction: Direction,
}

/// Maps a transported JSON value onto the stored sum type.
///
/// Strings stay scalars; everything else is a structured document. `null`
/// clears the value.
pub(crate) fn to_setting_value(value: Option<serde_json::Value>) -> Option<SettingValue> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(raw) => Some(SettingValue::Scalar(raw)),
        other => Some(SettingValue::Structured(other)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transported_values_map_onto_the_sum_type() {
        assert_eq!(to_setting_value(None), None);
        assert_eq!(to_setting_value(Some(json!(null))), None);
        assert_eq!(
            to_setting_value(Some(json!("My Site"))),
            Some(SettingValue::Scalar("My Site".to_string()))
        );
        assert_eq!(
            to_setting_value(Some(json!([{"label": "Home", "url": "/"}]))),
            Some(SettingValue::Structured(
                json!([{"label": "Home", "url": "/"}])
            ))
        );
        assert_eq!(
            to_setting_value(Some(json!(7))),
            Some(SettingValue::Structured(json!(7)))
        );
    }

    #[test]
    fn move_request_accepts_lowercase_directions() {
        let request: MoveSettingRequest =
            serde_json::from_str(r#"{"direction": "up"}"#).expect("valid body");
        assert_eq!(request.direction, Direction::Up);
    }
}
