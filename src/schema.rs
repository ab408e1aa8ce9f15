//! Shapes of the provider block, resources and data sources.
//!
//! Besides shape and optionality an attribute carries the plan-time behavior
//! the lifecycle engine needs: value validators, a semantic normalizer and
//! the "use state for unknown" modifier of server computed values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tagfilter;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Text, including enum-like Instana fields such as `boundary_scope`.
    String,
    /// Whole numbers such as `granularity` in milliseconds.
    Int64,
    /// Fractional numbers such as threshold values.
    Float64,
    /// Flags such as `enabled`.
    Bool,
    /// Ordered elements of one type.
    List(Box<AttributeType>),
    /// Unordered unique elements of one type.
    Set(Box<AttributeType>),
    /// String keyed values of one type.
    Map(Box<AttributeType>),
    /// Fixed set of named fields.
    Object(HashMap<String, AttributeType>),
    /// Any JSON value.
    Dynamic,
}

impl AttributeType {
    /// `List(element)`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// `Set(element)`.
    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    /// `Map(element)`.
    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }

    /// `Object(fields)`.
    pub fn object(fields: HashMap<String, AttributeType>) -> Self {
        Self::Object(fields)
    }
}

/// Who supplies an attribute value and whether it is secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be set in configuration.
    pub required: bool,
    /// May be set in configuration.
    pub optional: bool,
    /// Filled in by the provider from the Instana API.
    pub computed: bool,
    /// Redacted by the host, e.g. `api_token`.
    pub sensitive: bool,
}

impl AttributeFlags {
    const NONE: Self = Self {
        required: false,
        optional: false,
        computed: false,
        sensitive: false,
    };

    /// Set by the user only.
    pub fn required() -> Self {
        Self { required: true, ..Self::NONE }
    }

    /// Optionally set by the user.
    pub fn optional() -> Self {
        Self { optional: true, ..Self::NONE }
    }

    /// Set by the provider only.
    pub fn computed() -> Self {
        Self { computed: true, ..Self::NONE }
    }

    /// Set by the user or, when omitted, by the provider.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::NONE
        }
    }

    /// Same flags, redacted.
    pub fn sensitive(self) -> Self {
        Self { sensitive: true, ..self }
    }
}

/// A single attribute of a resource, data source or nested block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Requiredness and secrecy.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the Instana entity instead of updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when the configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Checks applied to known values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    /// Keep the prior state value while the planned value is unknown.
    #[serde(default)]
    pub use_state_for_unknown: bool,
    /// Equality under which prior values are kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<Normalizer>,
}

macro_rules! typed_attributes {
    ($($name:ident => $ty:ident, $flags:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($ty), "` attribute with `", stringify!($flags), "` flags.")]
            pub fn $name() -> Self {
                Self::new(AttributeType::$ty, AttributeFlags::$flags())
            }
        )*
    };
}

impl Attribute {
    /// Attribute of `attr_type` without defaults, validators or modifiers.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
            use_state_for_unknown: false,
            normalizer: None,
        }
    }

    typed_attributes! {
        required_string => String, required;
        optional_string => String, optional;
        computed_string => String, computed;
        optional_computed_string => String, optional_computed;
        required_int64 => Int64, required;
        optional_int64 => Int64, optional;
        computed_int64 => Int64, computed;
        required_float64 => Float64, required;
        optional_float64 => Float64, optional;
        required_bool => Bool, required;
        optional_bool => Bool, optional;
        computed_bool => Bool, computed;
    }

    /// A string attribute holding a tag filter expression.
    pub fn tag_filter(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::String, flags)
            .with_validator(Validator::TagFilter)
            .with_normalizer(Normalizer::TagFilter)
    }

    /// Attach documentation.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// Replace the entity when this attribute changes.
    pub fn with_force_new(self) -> Self {
        Self { force_new: true, ..self }
    }

    /// Plan `default` when the attribute is not configured.
    pub fn with_default(self, default: serde_json::Value) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    /// Redact the value.
    pub fn sensitive(self) -> Self {
        let flags = self.flags.sensitive();
        Self { flags, ..self }
    }

    /// Reject known values failing `validator`.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Keep the prior state value while the planned value is unknown.
    pub fn with_use_state_for_unknown(self) -> Self {
        Self {
            use_state_for_unknown: true,
            ..self
        }
    }

    /// Compare values with `normalizer` instead of textually.
    pub fn with_normalizer(self, normalizer: Normalizer) -> Self {
        Self {
            normalizer: Some(normalizer),
            ..self
        }
    }
}

/// Constraint on the value of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// The string must be one of the given values.
    OneOf(Vec<String>),
    /// The string length (in characters) must be within the bounds.
    LengthBetween {
        /// Inclusive lower bound.
        min: usize,
        /// Inclusive upper bound.
        max: usize,
    },
    /// The integer must be within the bounds.
    IntBetween {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// The string must parse as a tag filter expression.
    TagFilter,
    /// The string must be a JSON document.
    Json,
}

impl Validator {
    /// Create a [`Validator::OneOf`] from string slices.
    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check a known value, returning the reason when it is rejected.
    pub fn check(&self, value: &serde_json::Value) -> Result<(), String> {
        match self {
            Validator::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
                Some(s) => Err(format!(
                    "value '{}' must be one of [{}]",
                    s,
                    allowed.join(", ")
                )),
                None => Ok(()),
            },
            Validator::LengthBetween { min, max } => match value.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if len < *min || len > *max {
                        Err(format!(
                            "length must be between {} and {}, got {}",
                            min, max, len
                        ))
                    } else {
                        Ok(())
                    }
                },
                None => Ok(()),
            },
            Validator::IntBetween { min, max } => match value.as_i64() {
                Some(n) if n < *min || n > *max => {
                    Err(format!("value must be between {} and {}, got {}", min, max, n))
                },
                _ => Ok(()),
            },
            Validator::TagFilter => match value.as_str() {
                Some(s) => tagfilter::parse(s).map(|_| ()).map_err(|e| e.to_string()),
                None => Ok(()),
            },
            Validator::Json => match value.as_str() {
                Some(s) => serde_json::from_str::<serde_json::Value>(s)
                    .map(|_| ())
                    .map_err(|e| format!("invalid JSON: {}", e)),
                None => Ok(()),
            },
        }
    }
}

/// Semantic equality applied by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    /// Tag filter expressions compare by their canonical form.
    TagFilter,
    /// JSON documents compare structurally.
    Json,
}

impl Normalizer {
    /// Whether two values are equal under this normalizer.
    ///
    /// Values that cannot be normalized are compared textually.
    pub fn equivalent(&self, a: &serde_json::Value, b: &serde_json::Value) -> bool {
        if a == b {
            return true;
        }
        let (Some(a), Some(b)) = (a.as_str(), b.as_str()) else {
            return false;
        };
        match self {
            Normalizer::TagFilter => tagfilter::semantically_equal(a, b),
            Normalizer::Json => {
                match (
                    serde_json::from_str::<serde_json::Value>(a),
                    serde_json::from_str::<serde_json::Value>(b),
                ) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            },
        }
    }
}

/// How often a nested block may appear and how its instances are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one instance, encoded as an object.
    #[default]
    Single,
    /// Ordered instances.
    List,
    /// Unordered instances.
    Set,
    /// Instances keyed by name.
    Map,
}

/// Attributes and nested blocks at one level of a schema, such as the
/// `rule` of an application alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add attribute `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add nested block `name`.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A [`Block`] placed inside another one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Content of each instance.
    #[serde(flatten)]
    pub block: Block,
    /// Cardinality of the block.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest instances the configuration must contain.
    #[serde(default)]
    pub min_items: u32,
    /// Most instances allowed; 0 means unbounded.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn nested(block: Block, nesting_mode: BlockNestingMode) -> Self {
        let max_items = u32::from(nesting_mode == BlockNestingMode::Single);
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// Zero or one instance.
    pub fn single(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Single)
    }

    /// Any number of ordered instances.
    pub fn list(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::List)
    }

    /// Any number of unordered instances.
    pub fn set(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Set)
    }

    /// Instances keyed by name.
    pub fn map(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Map)
    }

    /// Require at least `min` instances.
    pub fn with_min_items(self, min: u32) -> Self {
        Self {
            min_items: min,
            ..self
        }
    }

    /// Allow at most `max` instances.
    pub fn with_max_items(self, max: u32) -> Self {
        Self {
            max_items: max,
            ..self
        }
    }
}

/// Schema of a resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// State version; bumped whenever stored state needs an upgrader.
    #[serde(default)]
    pub version: u64,
    /// Top level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
    /// Warning shown when the type is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
}

impl Schema {
    /// An empty schema at state `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// An empty schema at state version 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Add top level attribute `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block = self.block.with_attribute(name, attr);
        self
    }

    /// Add top level block `name`.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block = self.block.with_block(name, block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block = self.block.with_description(description);
        self
    }

    /// Flag the type as deprecated.
    pub fn with_deprecation_message(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }
}

/// Everything GetSchema reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider "instana"` block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider attributes, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `schema` for the provider block.
    pub fn with_provider_config(self, schema: Schema) -> Self {
        Self {
            provider: schema,
            ..self
        }
    }

    /// Register resource `name`.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register data source `name`.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went ahead.
    Warning,
}

/// A message reported back to the host, optionally tied to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted attribute path, e.g. `rule.threshold.value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Tie the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}
