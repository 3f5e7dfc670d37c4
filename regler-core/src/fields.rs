//! The field type catalog.
//!
//! Every value a setting can hold is rendered and validated through a
//! *field type*: a named descriptor carrying the set of builder params an
//! admin may toggle per setting. The catalog is populated by an explicit
//! registration step at startup instead of scanning a type namespace at
//! runtime, so its content is static data with no reflection involved.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::model::OptionRow;

/// Identifier of the generic free-text type every registry must contain.
///
/// It doubles as the fallback whenever a setting's type cannot be resolved,
/// see [`options::build_field`](crate::options::build_field).
pub const FALLBACK_FIELD: &str = "input";

/// How a field type's value is stored and read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A plain scalar, stored verbatim.
    Scalar,

    /// A JSON document, stored with the `is_array_value` flag set.
    Structured,

    /// A list of attachment identifiers resolved through the
    /// [`AttachmentStore`](crate::attachments::AttachmentStore).
    File,
}

/// The literal shape a builder param accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    Bool,
    Integer,
    Number,
    Text,
    List,
    Map,
}

impl ParamShape {
    /// Human name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParamShape::Bool => "bool",
            ParamShape::Integer => "integer",
            ParamShape::Number => "number",
            ParamShape::Text => "text",
            ParamShape::List => "list",
            ParamShape::Map => "map",
        }
    }
}

/// A configurable aspect of a field type.
///
/// Params mirror the chainable configuration methods of the renderer's
/// field widgets; which ones exist per type is declared here once instead
/// of being discovered through method introspection.
#[derive(Debug, Clone)]
pub struct BuilderParam {
    pub name: &'static str,

    /// Shape the literal argument must parse to.
    pub shape: ParamShape,

    /// Default literal, present for required params.
    pub default: Option<&'static str>,

    /// Required params surface pre-activated in the options matrix so the
    /// generated field is usable out of the box.
    pub required: bool,
}

impl BuilderParam {
    /// Display signature, e.g. `options({})`.
    pub fn full(&self) -> String {
        format!("{}({})", self.name, self.default.unwrap_or(""))
    }
}

/// A named kind of editable value with its own parameter schema.
#[derive(Debug, Clone)]
pub struct FieldType {
    ident: &'static str,
    name: &'static str,
    kind: FieldKind,
    params: Vec<BuilderParam>,
}

impl FieldType {
    /// Starts a new scalar field type.
    pub fn new(ident: &'static str, name: &'static str) -> Self {
        Self {
            ident,
            name,
            kind: FieldKind::Scalar,
            params: Vec::new(),
        }
    }

    /// Sets how the type's value is stored.
    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declares an optional builder param.
    pub fn param(mut self, name: &'static str, shape: ParamShape) -> Self {
        self.params.push(BuilderParam {
            name,
            shape,
            default: None,
            required: false,
        });
        self
    }

    /// Declares a required builder param with its default literal.
    pub fn required_param(
        mut self,
        name: &'static str,
        shape: ParamShape,
        default: &'static str,
    ) -> Self {
        self.params.push(BuilderParam {
            name,
            shape,
            default: Some(default),
            required: true,
        });
        self
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_kind(&self) -> FieldKind {
        self.kind
    }

    /// The type's params, deduplicated by name and sorted alphabetically.
    pub fn params(&self) -> &[BuilderParam] {
        &self.params
    }

    pub fn find_param(&self, name: &str) -> Option<&BuilderParam> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Pre-populated options matrix rows for this type.
    ///
    /// Required params come back active with their default literal filled
    /// in; everything else is inactive with an empty argument.
    pub fn option_rows(&self) -> Vec<OptionRow> {
        self.params
            .iter()
            .map(|param| OptionRow {
                active: param.required,
                name: param.name.to_string(),
                param: param.default.unwrap_or("").to_string(),
                full: Some(param.full()),
            })
            .collect()
    }

    /// Deduplicates params by name (first declaration wins) and sorts them.
    fn normalize(mut self) -> Self {
        let mut by_name = BTreeMap::new();
        for param in self.params {
            by_name.entry(param.name).or_insert(param);
        }
        self.params = by_name.into_values().collect();
        self
    }
}

/// The wire form of a field type, consumed by the type-selection dropdown
/// and the dynamic options editor.
#[derive(Debug, Clone, Serialize)]
pub struct FieldTypeDescriptor {
    pub ident: &'static str,
    pub name: &'static str,
    pub kind: FieldKind,

    /// Options matrix rows to pre-fill when this type is selected.
    pub options: Vec<OptionRow>,
}

/// Error returned while assembling a [`FieldRegistry`]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The identifier has already been registered.
    #[error("The field type '{0}' has already been registered.")]
    DuplicateIdent(&'static str),

    /// Every registry must contain the generic [`FALLBACK_FIELD`] type.
    #[error("The registry is missing the '{FALLBACK_FIELD}' fallback type.")]
    MissingFallback,
}

/// The catalog of available field types.
///
/// Construct one through [`FieldRegistry::builtins`] or register types one
/// by one on a [`FieldRegistryBuilder`].
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    types: BTreeMap<&'static str, FieldType>,
    fallback: FieldType,
}

impl FieldRegistry {
    /// Starts an empty registry builder.
    pub fn builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder {
            types: BTreeMap::new(),
        }
    }

    /// A builder pre-loaded with the builtin types.
    pub fn builtins_builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder {
            types: builtin_types()
                .into_iter()
                .map(|field| (field.ident, field.normalize()))
                .collect(),
        }
    }

    /// The builtin catalog.
    pub fn builtins() -> Self {
        let types = Self::builtins_builder().types;
        let fallback = types[FALLBACK_FIELD].clone();
        Self { types, fallback }
    }

    pub fn get(&self, ident: &str) -> Option<&FieldType> {
        self.types.get(ident)
    }

    /// The generic free-text type substituted on resolution failure.
    pub fn fallback(&self) -> &FieldType {
        &self.fallback
    }

    /// Whether the identifier names a registered file-accepting type.
    pub fn is_file(&self, ident: &str) -> bool {
        self.types
            .get(ident)
            .is_some_and(|field| field.kind == FieldKind::File)
    }

    /// Lists descriptors, ordered by identifier.
    ///
    /// With a filter only the named types are returned; unknown
    /// identifiers in the filter are skipped, not fatal.
    pub fn types(&self, filter: Option<&[&str]>) -> Vec<FieldTypeDescriptor> {
        match filter {
            None => self.types.values().map(Self::describe).collect(),
            Some(idents) => {
                let mut descriptors: Vec<_> = idents
                    .iter()
                    .filter_map(|ident| self.types.get(*ident))
                    .map(Self::describe)
                    .collect();
                descriptors.sort_by_key(|descriptor| descriptor.ident);
                descriptors.dedup_by_key(|descriptor| descriptor.ident);
                descriptors
            }
        }
    }

    /// The descriptor of a single type.
    pub fn descriptor(&self, ident: &str) -> Option<FieldTypeDescriptor> {
        self.types.get(ident).map(Self::describe)
    }

    fn describe(field: &FieldType) -> FieldTypeDescriptor {
        FieldTypeDescriptor {
            ident: field.ident,
            name: field.name,
            kind: field.kind,
            options: field.option_rows(),
        }
    }
}

/// Builder assembling a [`FieldRegistry`] through explicit registration.
#[derive(Debug, Default)]
pub struct FieldRegistryBuilder {
    types: BTreeMap<&'static str, FieldType>,
}

impl FieldRegistryBuilder {
    /// Registers a field type.
    ///
    /// The identifier must not have been registered before, neither by a
    /// builtin nor by an earlier call.
    pub fn register(mut self, field: FieldType) -> Result<Self, RegistryError> {
        if self.types.contains_key(field.ident) {
            return Err(RegistryError::DuplicateIdent(field.ident));
        }
        self.types.insert(field.ident, field.normalize());
        Ok(self)
    }

    /// Finishes the registry.
    pub fn build(self) -> Result<FieldRegistry, RegistryError> {
        let fallback = self
            .types
            .get(FALLBACK_FIELD)
            .cloned()
            .ok_or(RegistryError::MissingFallback)?;
        Ok(FieldRegistry {
            types: self.types,
            fallback,
        })
    }
}

/// The builtin field types.
///
/// They mirror the renderer's generically drivable widgets; structural
/// widgets (relations, raw views, labels, passwords, ranges) are not
/// registrable through the settings UI and have no entry here.
fn builtin_types() -> Vec<FieldType> {
    use FieldKind::*;
    use ParamShape::*;

    vec![
        FieldType::new("input", "Input")
            .param("mask", Text)
            .param("max_length", Integer)
            .param("placeholder", Text)
            .param("readonly", Bool),
        FieldType::new("textarea", "Text Area")
            .param("placeholder", Text)
            .param("readonly", Bool)
            .param("rows", Integer),
        FieldType::new("checkbox", "Check Box")
            .required_param("send_true_or_false", Bool, "true")
            .param("indeterminate", Bool),
        FieldType::new("select", "Select")
            .required_param("options", Map, "{}")
            .param("empty", Text)
            .param("multiple", Bool),
        FieldType::new("radio_buttons", "Radio Buttons").required_param("options", Map, "{}"),
        FieldType::new("matrix", "Matrix")
            .kind(Structured)
            .required_param("columns", List, r#"["key", "value"]"#)
            .param("key_value", Bool)
            .param("max_rows", Integer),
        FieldType::new("code", "Code")
            .param("language", Text)
            .param("line_numbers", Bool),
        FieldType::new("datetime", "Date Time")
            .param("allow_input", Bool)
            .param("enable_time", Bool)
            .param("format", Text),
        FieldType::new("upload", "Upload")
            .kind(File)
            .param("accepted_files", Text)
            .param("max_files", Integer)
            .param("storage", Text),
        FieldType::new("picture", "Picture")
            .kind(File)
            .param("height", Integer)
            .param("storage", Text)
            .param("width", Integer),
        FieldType::new("cropper", "Cropper")
            .kind(File)
            .param("height", Integer)
            .param("min_canvas", Integer)
            .param("width", Integer),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_contain_the_fallback() {
        let registry = FieldRegistry::builtins();
        assert_eq!(registry.fallback().ident(), FALLBACK_FIELD);
        assert!(registry.get(FALLBACK_FIELD).is_some());
    }

    #[test]
    fn descriptors_are_ordered_by_identifier() {
        let registry = FieldRegistry::builtins();
        let idents: Vec<_> = registry
            .types(None)
            .into_iter()
            .map(|descriptor| descriptor.ident)
            .collect();
        let mut sorted = idents.clone();
        sorted.sort();
        assert_eq!(idents, sorted);
    }

    #[test]
    fn params_are_deduplicated_and_sorted() {
        let field = FieldType::new("custom", "Custom")
            .param("zebra", ParamShape::Text)
            .param("alpha", ParamShape::Bool)
            .param("zebra", ParamShape::Integer)
            .normalize();
        let names: Vec<_> = field.params().iter().map(|param| param.name).collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
        // first declaration wins
        assert_eq!(
            field.find_param("zebra").map(|param| param.shape),
            Some(ParamShape::Text)
        );
    }

    #[test]
    fn required_params_surface_active_with_defaults() {
        let registry = FieldRegistry::builtins();
        let select = registry.descriptor("select").expect("builtin");
        let options = select
            .options
            .iter()
            .find(|row| row.name == "options")
            .expect("required param present");
        assert!(options.active);
        assert_eq!(options.param, "{}");
        assert_eq!(options.full.as_deref(), Some("options({})"));

        let multiple = select
            .options
            .iter()
            .find(|row| row.name == "multiple")
            .expect("optional param present");
        assert!(!multiple.active);
    }

    #[test]
    fn filtered_listing_skips_unknown_identifiers() {
        let registry = FieldRegistry::builtins();
        let descriptors = registry.types(Some(&["select", "no_such_type", "input"]));
        let idents: Vec<_> = descriptors
            .into_iter()
            .map(|descriptor| descriptor.ident)
            .collect();
        assert_eq!(idents, vec!["input", "select"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = FieldRegistry::builtins_builder()
            .register(FieldType::new("input", "Other Input"));
        assert!(matches!(result, Err(RegistryError::DuplicateIdent("input"))));
    }

    #[test]
    fn registry_without_fallback_does_not_build() {
        let result = FieldRegistry::builder()
            .register(FieldType::new("select", "Select"))
            .expect("fresh ident")
            .build();
        assert!(matches!(result, Err(RegistryError::MissingFallback)));
    }

    #[test]
    fn file_kinds_are_exactly_the_upload_types() {
        let registry = FieldRegistry::builtins();
        for ident in ["upload", "picture", "cropper"] {
            assert!(registry.is_file(ident), "{ident} should be a file type");
        }
        for ident in ["input", "matrix", "select", "no_such_type"] {
            assert!(!registry.is_file(ident), "{ident} should not be a file type");
        }
    }
}
