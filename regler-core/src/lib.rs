//! The storage-facing core of regler's dynamic settings registry.
//!
//! # "Settings" refresher
//!
//! In regler's naming, **"settings"** refer to configuration values which an
//! admin defines and edits at runtime, without code changes or migrations.
//! They are stored in the database, one row per entry, each carrying its own
//! field type, ordering position and rendering options.
//!
//! **"config"** values require a restart and access to the application's
//! host server. They are stored in files or environment variables and are
//! not handled by this crate.
//!
//! # Starting point
//!
//! Build a [`FieldRegistry`] (usually from [`FieldRegistry::builtins`]),
//! construct a [`SettingStore`] on top of it and use the store for every
//! read and write. Application code reads through [`SettingStore::value`].

pub use crate::attachments::AttachmentRef;
pub use crate::attachments::AttachmentStore;
pub use crate::codec::SettingValue;
pub use crate::fields::FieldRegistry;
pub use crate::fields::FieldType;
pub use crate::model::Setting;
pub use crate::store::SettingStore;

pub mod attachments;
pub mod codec;
pub mod fields;
pub mod model;
pub mod options;
pub mod store;
