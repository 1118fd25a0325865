//! Attribute types for ABAC evaluation.
//!
//! Five attribute categories drive access decisions:
//! - **Subject**: who is asking (role, department, clearance)
//! - **Resource**: what is being accessed (type, owner, sensitivity)
//! - **Action**: what is being done (read, write, delete)
//! - **Environment**: when and where (time, source country, network)
//! - **Context**: anything else the caller resolved for this request
//!
//! Attribute values are a closed sum type, [`AttrValue`], with total
//! coercion functions. Operators never guess at types: a value either
//! coerces or the comparison fails closed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Category
// ============================================================================

/// The category an attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeCategory {
    Subject,
    Resource,
    Action,
    Environment,
    Context,
}

impl AttributeCategory {
    /// All categories, in bare-name lookup order.
    pub const ALL: [AttributeCategory; 5] = [
        Self::Subject,
        Self::Resource,
        Self::Action,
        Self::Environment,
        Self::Context,
    ];

    /// Returns the lowercase name used in qualified attribute names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Resource => "resource",
            Self::Action => "action",
            Self::Environment => "environment",
            Self::Context => "context",
        }
    }

    /// Parses a category prefix such as `"subject"`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == prefix)
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AttrValue
// ============================================================================

/// A typed attribute value.
///
/// Serializes to and from plain JSON: arrays become [`AttrValue::List`],
/// objects become [`AttrValue::Json`], and datetimes are written as
/// RFC 3339 strings (they read back as strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum AttrValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    List(Vec<AttrValue>),
    Json(Value),
}

impl AttrValue {
    /// Coerces the value to a float.
    ///
    /// Strings are trimmed and parsed; datetimes become Unix seconds;
    /// booleans become 1.0 / 0.0. Lists, objects, null and non-numeric
    /// strings do not coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            Self::DateTime(ts) => {
                Some(ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9)
            }
            Self::Json(Value::Number(n)) => n.as_f64(),
            Self::Json(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Self::List(_) | Self::Json(_) => None,
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list elements if this value is a collection.
    ///
    /// JSON arrays are converted on the fly.
    pub fn as_list(&self) -> Option<Vec<AttrValue>> {
        match self {
            Self::List(items) => Some(items.clone()),
            Self::Json(Value::Array(items)) => {
                Some(items.iter().cloned().map(AttrValue::from).collect())
            }
            _ => None,
        }
    }

    /// Value equality used by `eq`, `ne`, `in` and `not_in`.
    ///
    /// Integers and floats compare numerically; everything else compares
    /// structurally. Strings are lower-cased first when `case_sensitive`
    /// is false.
    pub fn loosely_equals(&self, other: &AttrValue, case_sensitive: bool) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => {
                if case_sensitive {
                    a == b
                } else {
                    a.to_lowercase() == b.to_lowercase()
                }
            }
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(x, y)| x.loosely_equals(y, case_sensitive))
            }
            (a, b) => a == b,
        }
    }

    /// Short type name for log fields.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::List(_) | Self::Json(_) => {
                let json = Value::from(self.clone());
                write!(f, "{json}")
            }
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::String(s),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Json(Value::Number(n)), Self::Float),
            },
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            other => Self::Json(other),
        }
    }
}

impl From<AttrValue> for Value {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::String(s) => Value::String(s),
            AttrValue::Int(i) => Value::from(i),
            AttrValue::Float(f) => Value::from(f),
            AttrValue::Bool(b) => Value::Bool(b),
            AttrValue::DateTime(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            AttrValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            AttrValue::Json(v) => v,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::DateTime(ts)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// A single resolved attribute, as produced by an attribute source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub category: AttributeCategory,
    /// How much the resolving source trusts this value, in `[0, 1]`.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Attribute {
    /// Creates an attribute with full confidence, stamped now.
    pub fn new(category: AttributeCategory, name: &str, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            category,
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }

    /// Sets the confidence, clamped to `[0, 1]`. NaN becomes 0.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    /// Sets the resolution timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// AccessRequest
// ============================================================================

/// One authorization check.
///
/// Attribute maps are ordered so the cache key is stable across calls.
/// Requests are built once and never mutated by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessRequest {
    pub request_id: String,
    pub subject: BTreeMap<String, Attribute>,
    pub resource: BTreeMap<String, Attribute>,
    pub action: BTreeMap<String, Attribute>,
    pub environment: BTreeMap<String, Attribute>,
    pub context: BTreeMap<String, Attribute>,
}

impl AccessRequest {
    /// Creates an empty request.
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            ..Self::default()
        }
    }

    /// Places an attribute into the map for its category.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.map_mut(attribute.category)
            .insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds a subject attribute.
    pub fn subject(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.with_attribute(Attribute::new(AttributeCategory::Subject, name, value))
    }

    /// Adds a resource attribute.
    pub fn resource(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.with_attribute(Attribute::new(AttributeCategory::Resource, name, value))
    }

    /// Adds an action attribute.
    pub fn action(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.with_attribute(Attribute::new(AttributeCategory::Action, name, value))
    }

    /// Adds an environment attribute.
    pub fn environment(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.with_attribute(Attribute::new(AttributeCategory::Environment, name, value))
    }

    /// Adds a context attribute.
    pub fn context(self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.with_attribute(Attribute::new(AttributeCategory::Context, name, value))
    }

    /// Returns the attribute map for a category.
    pub fn map(&self, category: AttributeCategory) -> &BTreeMap<String, Attribute> {
        match category {
            AttributeCategory::Subject => &self.subject,
            AttributeCategory::Resource => &self.resource,
            AttributeCategory::Action => &self.action,
            AttributeCategory::Environment => &self.environment,
            AttributeCategory::Context => &self.context,
        }
    }

    fn map_mut(&mut self, category: AttributeCategory) -> &mut BTreeMap<String, Attribute> {
        match category {
            AttributeCategory::Subject => &mut self.subject,
            AttributeCategory::Resource => &mut self.resource,
            AttributeCategory::Action => &mut self.action,
            AttributeCategory::Environment => &mut self.environment,
            AttributeCategory::Context => &mut self.context,
        }
    }

    /// Resolves an attribute name to a value.
    ///
    /// A qualified name (`"subject.role"`) is looked up in its category
    /// first. Failing that, the name is looked up verbatim in every
    /// category in [`AttributeCategory::ALL`] order.
    pub fn resolve(&self, attribute_name: &str) -> Option<&AttrValue> {
        if let Some((prefix, name)) = attribute_name.split_once('.') {
            if let Some(category) = AttributeCategory::from_prefix(prefix) {
                if let Some(attr) = self.map(category).get(name) {
                    return Some(&attr.value);
                }
            }
        }

        AttributeCategory::ALL
            .into_iter()
            .find_map(|category| self.map(category).get(attribute_name))
            .map(|attr| &attr.value)
    }

    /// Iterates `(category, attribute)` over every attribute on the request.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeCategory, &Attribute)> {
        AttributeCategory::ALL
            .into_iter()
            .flat_map(move |category| self.map(category).values().map(move |a| (category, a)))
    }

    /// Total number of attributes across all categories.
    pub fn len(&self) -> usize {
        AttributeCategory::ALL
            .into_iter()
            .map(|c| self.map(c).len())
            .sum()
    }

    /// Returns true if the request carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic cache key: request id plus the sorted `(name, value)`
    /// pairs of each category. Confidence and timestamps are excluded.
    pub fn cache_key(&self) -> String {
        let mut key = serde_json::to_string(&self.request_id).unwrap_or_default();
        for category in AttributeCategory::ALL {
            let pairs: BTreeMap<&str, &AttrValue> = self
                .map(category)
                .iter()
                .map(|(name, attr)| (name.as_str(), &attr.value))
                .collect();
            key.push('|');
            key.push_str(category.as_str());
            key.push_str(&serde_json::to_string(&pairs).unwrap_or_default());
        }
        key
    }
}

/// Wire shape of a request: raw JSON values per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDocument {
    pub request_id: String,
    pub subject: BTreeMap<String, AttrValue>,
    pub resource: BTreeMap<String, AttrValue>,
    pub action: BTreeMap<String, AttrValue>,
    pub environment: BTreeMap<String, AttrValue>,
    pub context: BTreeMap<String, AttrValue>,
}

impl From<RequestDocument> for AccessRequest {
    fn from(doc: RequestDocument) -> Self {
        let mut request = AccessRequest::new(&doc.request_id);
        let maps = [
            (AttributeCategory::Subject, doc.subject),
            (AttributeCategory::Resource, doc.resource),
            (AttributeCategory::Action, doc.action),
            (AttributeCategory::Environment, doc.environment),
            (AttributeCategory::Context, doc.context),
        ];
        for (category, map) in maps {
            for (name, value) in map {
                request = request.with_attribute(Attribute::new(category, &name, value));
            }
        }
        request
    }
}

// ============================================================================
// Tests
// ============================================================================
