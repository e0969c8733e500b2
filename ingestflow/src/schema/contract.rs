//! Versioned schema contracts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number with no fractional part.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Any non-null value.
    Any,
}

impl FieldType {
    /// Returns true if the value has this type.
    #[must_use]
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => !value.is_null(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Returns the JSON type name of a value.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A constraint on a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "snake_case")]
pub enum Constraint {
    /// Inclusive numeric range.
    Range {
        /// Lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Value must equal one of the listed values.
    OneOf {
        /// Allowed values.
        values: Vec<serde_json::Value>,
    },
    /// String must match the regular expression.
    Pattern {
        /// Regular expression source.
        pattern: String,
    },
    /// Strings must contain non-whitespace, arrays and objects must have entries.
    NonEmpty,
    /// Inclusive length bounds, in characters for strings and elements for arrays.
    Length {
        /// Minimum length.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        /// Maximum length.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    /// Every array element must have this type.
    Items {
        /// Element type.
        item_type: FieldType,
    },
}

/// Declaration of one field in a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Expected type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present and non-null.
    #[serde(default)]
    pub required: bool,
    /// Additional constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    /// Declares a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            constraints: Vec::new(),
            description: None,
        }
    }

    /// Declares an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Adds an inclusive numeric range.
    #[must_use]
    pub fn in_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Restricts the value to an enumeration.
    #[must_use]
    pub fn one_of(mut self, values: impl IntoIterator<Item = serde_json::Value>) -> Self {
        self.constraints.push(Constraint::OneOf {
            values: values.into_iter().collect(),
        });
        self
    }

    /// Requires string values to match a regular expression.
    #[must_use]
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.push(Constraint::Pattern {
            pattern: pattern.into(),
        });
        self
    }

    /// Rejects empty strings, arrays and objects.
    #[must_use]
    pub fn non_empty(mut self) -> Self {
        self.constraints.push(Constraint::NonEmpty);
        self
    }

    /// Adds inclusive length bounds.
    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraints.push(Constraint::Length { min, max });
        self
    }

    /// Requires every array element to have a type.
    #[must_use]
    pub fn items(mut self, item_type: FieldType) -> Self {
        self.constraints.push(Constraint::Items { item_type });
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named, versioned description of a payload's required shape.
///
/// The id of a contract is `<name>.v<version>`. Once registered a version is
/// immutable; a changed shape needs a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaContract {
    /// Contract name.
    pub name: String,
    /// Contract version.
    pub version: u32,
    /// Declared fields, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Reject fields the contract does not declare.
    #[serde(default)]
    pub strict: bool,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaContract {
    /// Creates an empty, non-strict contract.
    #[must_use]
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            fields: Vec::new(),
            strict: false,
            description: None,
        }
    }

    /// Returns the contract id, `<name>.v<version>`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.v{}", self.name, self.version)
    }

    /// Adds a field declaration.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Rejects undeclared fields.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Looks up a field declaration by name.
    #[must_use]
    pub fn field_named(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the required fields.
    #[must_use]
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }
}
