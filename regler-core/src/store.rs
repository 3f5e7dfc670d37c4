//! The read/write façade over the settings table.
//!
//! Every mutating operation runs in its own transaction: either every write
//! lands or none does. Reads through [`SettingStore::value`] never raise,
//! matching the availability-first contract of the public accessor.

use std::sync::Arc;

use rorm::Database;
use rorm::fields::types::Json;
use rorm::fields::types::MaxStr;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use tracing::warn;
use uuid::Uuid;

use crate::attachments::AttachmentRef;
use crate::attachments::AttachmentStore;
use crate::codec;
use crate::codec::SettingValue;
use crate::fields::FieldRegistry;
use crate::model::OptionRow;
use crate::model::Setting;

/// Error returned by the mutating [`SettingStore`] operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is empty.
    #[error("The field '{field}' is required")]
    Validation { field: &'static str },

    /// A field exceeds its column's maximum length.
    #[error("The field '{field}' exceeds its maximum length")]
    TooLong { field: &'static str },

    /// The key does not name a setting.
    #[error("There is no setting under the key '{key}'")]
    NotFound { key: String },

    /// The key is already taken by another setting.
    #[error("The settings key '{key}' is already taken")]
    AlreadyExists { key: String },

    /// The field type is not registered in the catalog.
    #[error("The field type '{ident}' is not registered")]
    UnknownType { ident: String },

    /// A concurrent write got there first, the operation was rolled back.
    #[error("The setting was modified concurrently")]
    Conflict,

    /// The database failed.
    #[error("{0}")]
    Database(#[from] rorm::Error),
}

/// Data for [`SettingStore::create`]
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSetting {
    pub key: String,
    pub field_type: String,
    pub name: String,
    pub group: String,
    pub description: Option<String>,

    /// Options matrix rows; defaults to the field type's descriptor rows.
    pub options: Option<Vec<OptionRow>>,
}

/// Data for [`SettingStore::update`]
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSetting {
    /// The (possibly new) key.
    ///
    /// Renaming re-targets the primary identity and behaves like
    /// delete-old/insert-new.
    pub key: String,
    pub field_type: String,
    pub name: String,
    pub group: String,
    pub description: Option<String>,
    pub options: Vec<OptionRow>,
}

/// Direction of a [`SettingStore::swap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards lower positions.
    Up,

    /// Towards higher positions.
    Down,
}

/// What a read through the public accessor yields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingLookup {
    /// The resolved attachments of a file-type setting.
    Attachments(Vec<AttachmentRef>),

    /// A decoded JSON document.
    Structured(serde_json::Value),

    /// A plain scalar.
    Scalar(String),
}

impl SettingLookup {
    /// Converts the lookup into a plain `serde_json::Value` for transport.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            SettingLookup::Attachments(refs) => {
                serde_json::to_value(refs).unwrap_or(serde_json::Value::Null)
            }
            SettingLookup::Structured(value) => value,
            SettingLookup::Scalar(raw) => serde_json::Value::String(raw),
        }
    }
}

/// The settings registry service.
///
/// Constructed once per process and passed to whoever needs configuration
/// lookups; there is deliberately no free-floating global accessor.
pub struct SettingStore {
    db: Database,
    registry: FieldRegistry,
    attachments: Arc<dyn AttachmentStore>,
}

impl SettingStore {
    pub fn new(
        db: Database,
        registry: FieldRegistry,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            db,
            registry,
            attachments,
        }
    }

    /// The catalog this store renders fields against.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Fetches a single setting.
    pub async fn get(&self, key: &str) -> Result<Setting, StoreError> {
        rorm::query(&self.db, Setting)
            .condition(Setting.key.equals(key))
            .optional()
            .await?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    /// Lists every setting, ordered by group and position.
    pub async fn list(&self) -> Result<Vec<Setting>, StoreError> {
        let mut settings = rorm::query(&self.db, Setting).all().await?;
        settings.sort_by(|a, b| {
            (&*a.group)
                .cmp(&*b.group)
                .then(a.position.cmp(&b.position))
        });
        Ok(settings)
    }

    /// Creates a new setting at the end of the position order.
    pub async fn create(&self, data: CreateSetting) -> Result<Setting, StoreError> {
        require("key", &data.key)?;
        require("name", &data.name)?;
        require("group", &data.group)?;
        require("field_type", &data.field_type)?;
        let field = self
            .registry
            .get(&data.field_type)
            .ok_or_else(|| StoreError::UnknownType {
                ident: data.field_type.clone(),
            })?;
        let options = data.options.unwrap_or_else(|| field.option_rows());

        let mut tx = self.db.start_transaction().await?;

        let taken = rorm::query(&mut tx, Setting.key)
            .condition(Setting.key.equals(data.key.as_str()))
            .optional()
            .await?;
        if taken.is_some() {
            return Err(StoreError::AlreadyExists { key: data.key });
        }

        // The original counter is global, not per group. Gaps within a
        // group are permitted anyway, so this keeps positions unique
        // without renumbering on delete.
        let max_position = rorm::query(&mut tx, Setting.position)
            .all()
            .await?
            .into_iter()
            .max()
            .unwrap_or(0);

        let now = OffsetDateTime::now_utc();
        let setting = Setting {
            key: max_str("key", data.key)?,
            field_type: max_str("field_type", data.field_type)?,
            name: max_str("name", data.name)?,
            group: max_str("group", data.group)?,
            position: max_position + 1,
            description: data.description,
            value: None,
            options: Json(options),
            is_array_value: false,
            created_at: now,
            updated_at: now,
        };
        rorm::insert(&mut tx, Setting).single(&setting).await?;

        tx.commit().await?;

        debug!(key = &*setting.key, "Created setting");
        Ok(setting)
    }

    /// Updates a setting's metadata.
    ///
    /// `old_key` identifies the record; `data.key` may differ to rename it.
    pub async fn update(&self, old_key: &str, data: UpdateSetting) -> Result<Setting, StoreError> {
        require("key", &data.key)?;
        require("name", &data.name)?;
        require("group", &data.group)?;
        require("field_type", &data.field_type)?;
        if self.registry.get(&data.field_type).is_none() {
            return Err(StoreError::UnknownType {
                ident: data.field_type,
            });
        }

        let mut tx = self.db.start_transaction().await?;

        let Some(current) = rorm::query(&mut tx, Setting)
            .condition(Setting.key.equals(old_key))
            .optional()
            .await?
        else {
            return Err(StoreError::NotFound {
                key: old_key.to_string(),
            });
        };

        let now = OffsetDateTime::now_utc();
        let updated = Setting {
            key: max_str("key", data.key)?,
            field_type: max_str("field_type", data.field_type)?,
            name: max_str("name", data.name)?,
            group: max_str("group", data.group)?,
            position: current.position,
            description: data.description,
            value: current.value,
            options: Json(data.options),
            is_array_value: current.is_array_value,
            created_at: current.created_at,
            updated_at: now,
        };

        if &*updated.key != old_key {
            // Renaming re-targets the primary key: insert-new, delete-old.
            let clash = rorm::query(&mut tx, Setting.key)
                .condition(Setting.key.equals(&*updated.key))
                .optional()
                .await?;
            if clash.is_some() {
                return Err(StoreError::AlreadyExists {
                    key: updated.key.to_string(),
                });
            }
            rorm::insert(&mut tx, Setting).single(&updated).await?;
            rorm::delete(&mut tx, Setting)
                .condition(Setting.key.equals(old_key))
                .await?;
        } else {
            rorm::update(&mut tx, Setting)
                .set(Setting.field_type, updated.field_type.clone())
                .set(Setting.name, updated.name.clone())
                .set(Setting.group, updated.group.clone())
                .set(Setting.description, updated.description.clone())
                .set(Setting.options, updated.options.clone())
                .set(Setting.updated_at, now)
                .condition(Setting.key.equals(old_key))
                .await?;
        }

        tx.commit().await?;

        debug!(key = &*updated.key, "Updated setting");
        Ok(updated)
    }

    /// Stores a new value for a setting.
    ///
    /// The old and new value are compared post-decode; writing the value a
    /// setting already holds is elided and still succeeds.
    pub async fn set_value(
        &self,
        key: &str,
        new: Option<SettingValue>,
    ) -> Result<Setting, StoreError> {
        let mut tx = self.db.start_transaction().await?;

        let Some(mut current) = rorm::query(&mut tx, Setting)
            .condition(Setting.key.equals(key))
            .optional()
            .await?
        else {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        };

        let old = codec::decode(current.value.as_deref(), current.is_array_value);
        if old == new {
            tx.commit().await?;
            debug!(key, "Value unchanged, skipping write");
            return Ok(current);
        }

        let (value, is_array_value) = match &new {
            Some(new) => {
                let (raw, is_array) = codec::encode(new);
                (Some(raw), is_array)
            }
            None => (None, false),
        };
        let now = OffsetDateTime::now_utc();

        rorm::update(&mut tx, Setting)
            .set(Setting.value, value.clone())
            .set(Setting.is_array_value, is_array_value)
            .set(Setting.updated_at, now)
            .condition(Setting.key.equals(key))
            .await?;

        tx.commit().await?;

        debug!(key, "Saved setting value");
        current.value = value;
        current.is_array_value = is_array_value;
        current.updated_at = now;
        Ok(current)
    }

    /// Swaps a setting with its neighbour in the same group.
    ///
    /// Without a neighbour in the requested direction this is a successful
    /// no-op. Both position writes are guarded by the positions read at the
    /// start of the transaction; a guard miss rolls everything back and
    /// reports [`StoreError::Conflict`], so two concurrent swaps can never
    /// leave duplicate positions behind.
    pub async fn swap(&self, key: &str, direction: Direction) -> Result<(), StoreError> {
        let mut tx = self.db.start_transaction().await?;

        let Some(current) = rorm::query(&mut tx, Setting)
            .condition(Setting.key.equals(key))
            .optional()
            .await?
        else {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        };

        let group = rorm::query(&mut tx, Setting)
            .condition(Setting.group.equals(&*current.group))
            .all()
            .await?;
        let Some(partner) = swap_partner(&group, &current.key, current.position, direction) else {
            // already at the boundary, reordering is a successful no-op
            tx.commit().await?;
            return Ok(());
        };

        let moved = rorm::update(&mut tx, Setting)
            .set(Setting.position, partner.position)
            .condition(rorm::and![
                Setting.key.equals(&*current.key),
                Setting.position.equals(current.position)
            ])
            .await?;
        let partner_moved = rorm::update(&mut tx, Setting)
            .set(Setting.position, current.position)
            .condition(rorm::and![
                Setting.key.equals(&*partner.key),
                Setting.position.equals(partner.position)
            ])
            .await?;
        if moved != 1 || partner_moved != 1 {
            return Err(StoreError::Conflict);
        }

        tx.commit().await?;

        debug!(
            key,
            partner = &*partner.key,
            "Swapped setting positions"
        );
        Ok(())
    }

    /// Deletes a setting.
    ///
    /// For file-type settings the referenced attachments are deleted first;
    /// individual attachment failures are logged and skipped, they never
    /// block the deletion of the record or of the remaining attachments.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let setting = self.get(key).await?;

        if self.registry.is_file(&setting.field_type) {
            for id in attachment_ids(setting.value.as_deref(), setting.is_array_value) {
                if let Err(error) = self.attachments.delete(id).await {
                    warn!(
                        key,
                        attachment = %id,
                        error.display = %error,
                        "Failed to delete attachment, continuing"
                    );
                }
            }
        }

        let removed = rorm::delete(&self.db, Setting)
            .condition(Setting.key.equals(key))
            .await?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }

        debug!(key, "Deleted setting");
        Ok(())
    }

    /// The public read accessor.
    ///
    /// Yields the resolved attachments for file-type settings, the decoded
    /// document for array-flagged values (falling back to the raw scalar on
    /// malformed history) and the raw scalar otherwise. Absent keys and
    /// unset values yield `None`. This never raises.
    pub async fn value(&self, key: &str) -> Option<SettingLookup> {
        let setting = match rorm::query(&self.db, Setting)
            .condition(Setting.key.equals(key))
            .optional()
            .await
        {
            Ok(Some(setting)) => setting,
            Ok(None) => return None,
            Err(error) => {
                warn!(key, error.display = %error, "Failed to look up setting");
                return None;
            }
        };
        self.read(setting).await
    }

    /// [`value`](Self::value) with a default for absent keys and unset values.
    pub async fn value_or(&self, key: &str, default: SettingLookup) -> SettingLookup {
        self.value(key).await.unwrap_or(default)
    }

    async fn read(&self, setting: Setting) -> Option<SettingLookup> {
        if self.registry.is_file(&setting.field_type) {
            let ids = attachment_ids(setting.value.as_deref(), setting.is_array_value);
            return Some(match self.attachments.resolve(&ids).await {
                Ok(refs) => SettingLookup::Attachments(refs),
                Err(error) => {
                    warn!(
                        key = &*setting.key,
                        error.display = %error,
                        "Failed to resolve attachments, falling back to the raw id list"
                    );
                    SettingLookup::Structured(serde_json::Value::Array(
                        ids.iter()
                            .map(|id| serde_json::Value::String(id.to_string()))
                            .collect(),
                    ))
                }
            });
        }

        match codec::decode(setting.value.as_deref(), setting.is_array_value)? {
            SettingValue::Structured(value) => Some(SettingLookup::Structured(value)),
            SettingValue::Scalar(raw) => Some(SettingLookup::Scalar(raw)),
        }
    }
}

/// Picks the adjacent setting to exchange positions with.
///
/// `rows` are the settings of one group, in any order. Gaps between
/// positions are fine; the partner is the nearest position in the requested
/// direction. `None` means the setting already sits at that boundary.
fn swap_partner<'a>(
    rows: &'a [Setting],
    current_key: &str,
    position: i64,
    direction: Direction,
) -> Option<&'a Setting> {
    let candidates = rows.iter().filter(|row| &*row.key != current_key);
    match direction {
        Direction::Up => candidates
            .filter(|row| row.position < position)
            .max_by_key(|row| row.position),
        Direction::Down => candidates
            .filter(|row| row.position > position)
            .min_by_key(|row| row.position),
    }
}

/// Extracts attachment identifiers from a stored value.
///
/// A scalar holds a single identifier, a JSON list holds many. Entries
/// which do not parse as identifiers are logged and skipped.
fn attachment_ids(raw: Option<&str>, is_array: bool) -> Vec<Uuid> {
    let mut ids = Vec::new();
    match codec::decode(raw, is_array) {
        None => {}
        Some(SettingValue::Scalar(raw)) => match raw.parse::<Uuid>() {
            Ok(id) => ids.push(id),
            Err(_) => warn!(value = raw.as_str(), "Skipping malformed attachment id"),
        },
        Some(SettingValue::Structured(serde_json::Value::Array(items))) => {
            for item in items {
                match item.as_str().map(|raw| raw.parse::<Uuid>()) {
                    Some(Ok(id)) => ids.push(id),
                    _ => warn!(value = %item, "Skipping malformed attachment id"),
                }
            }
        }
        Some(SettingValue::Structured(other)) => {
            warn!(value = %other, "Attachment value is neither an id nor a list of ids");
        }
    }
    ids
}

fn require(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        Err(StoreError::Validation { field })
    } else {
        Ok(())
    }
}

fn max_str<const N: usize>(field: &'static str, value: String) -> Result<MaxStr<N>, StoreError> {
    MaxStr::new(value).map_err(|_| StoreError::TooLong { field })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;

    fn setting(key: &str, position: i64) -> Setting {
        Setting {
            key: MaxStr::new(key.to_string()).expect("short key"),
            field_type: MaxStr::new("input".to_string()).expect("short ident"),
            name: MaxStr::new(key.to_string()).expect("short name"),
            group: MaxStr::new("General".to_string()).expect("short group"),
            position,
            description: None,
            value: None,
            options: Json(Vec::new()),
            is_array_value: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn swap_partner_picks_the_adjacent_position() {
        // gap between 1 and 7 on purpose
        let rows = vec![setting("a", 1), setting("b", 7), setting("c", 9)];

        let partner = swap_partner(&rows, "b", 7, Direction::Up).expect("a is above");
        assert_eq!(&*partner.key, "a");
        let partner = swap_partner(&rows, "b", 7, Direction::Down).expect("c is below");
        assert_eq!(&*partner.key, "c");
        let partner = swap_partner(&rows, "c", 9, Direction::Up).expect("b is above");
        assert_eq!(&*partner.key, "b");
    }

    #[test]
    fn swap_partner_is_none_at_the_boundaries() {
        let rows = vec![setting("a", 1), setting("b", 2)];

        assert!(swap_partner(&rows, "a", 1, Direction::Up).is_none());
        assert!(swap_partner(&rows, "b", 2, Direction::Down).is_none());
    }

    #[test]
    fn swap_partner_of_a_singleton_group_is_none() {
        let rows = vec![setting("a", 3)];

        assert!(swap_partner(&rows, "a", 3, Direction::Up).is_none());
        assert!(swap_partner(&rows, "a", 3, Direction::Down).is_none());
    }

    #[test]
    fn attachment_ids_accepts_a_single_scalar_id() {
        let id = Uuid::new_v4();
        assert_eq!(attachment_ids(Some(&id.to_string()), false), vec![id]);
    }

    #[test]
    fn attachment_ids_accepts_a_json_list() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let raw = json!([a.to_string(), b.to_string()]).to_string();
        assert_eq!(attachment_ids(Some(&raw), true), vec![a, b]);
    }

    #[test]
    fn attachment_ids_skips_malformed_entries() {
        let id = Uuid::new_v4();
        let raw = json!([id.to_string(), "not-an-id", 7]).to_string();
        assert_eq!(attachment_ids(Some(&raw), true), vec![id]);

        assert_eq!(attachment_ids(Some("not-an-id"), false), Vec::<Uuid>::new());
        assert_eq!(attachment_ids(None, false), Vec::<Uuid>::new());
    }

    #[test]
    fn empty_required_fields_are_rejected_by_name() {
        assert!(require("key", "site_title").is_ok());
        assert!(matches!(
            require("key", "  "),
            Err(StoreError::Validation { field: "key" })
        ));
        assert!(matches!(
            require("group", ""),
            Err(StoreError::Validation { field: "group" })
        ));
    }

    #[test]
    fn overlong_fields_are_rejected_by_name() {
        let result: Result<MaxStr<8>, _> = max_str("key", "x".repeat(9));
        assert!(matches!(result, Err(StoreError::TooLong { field: "key" })));
    }
}
