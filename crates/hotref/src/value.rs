//! body representation
//!
//! Documents are parsed by [serde_yaml] and converted into a [Value] exactly once. The conversion recognizes the
//! intrinsic functions this crate resolves:
//! - `get_param`
//! - `get_resource`
//! - `get_attr`
//!
//! A single-key mapping whose key is one of those becomes a [Value::Call]. Every other mapping stays an
//! [Value::Object], including other intrinsic functions (`str_replace`, `list_join`, ...) which are opaque here.
//!
//! Arguments of a call are kept as a list of [Element]s, the "hierarchy" of the reference. A bare argument
//! (`get_param: name`) is a hierarchy of length one.
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

/// All possible value types of a parsed document
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Call(Intrinsic),
}

/// A reference to another part of the template forest
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    GetParam(Vec<Element>),
    GetResource(Element),
    GetAttr(Vec<Element>),
}

/// One step of a reference hierarchy
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// mapping key, or name of the referenced parameter/resource/output
    Key(String),
    /// sequence index
    Index(i64),
    /// a nested intrinsic call, resolved in the referencing scope
    Call(Box<Intrinsic>),
    /// anything else, always fails to resolve
    Invalid(Box<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Mapping lookup, `None` for missing keys and non-mappings
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Intrinsic {
    pub fn function_name(&self) -> &'static str {
        match self {
            Intrinsic::GetParam(_) => "get_param",
            Intrinsic::GetResource(_) => "get_resource",
            Intrinsic::GetAttr(_) => "get_attr",
        }
    }

    /// Recognize an intrinsic call by its key
    fn from_call(function: &str, argument: Value) -> Option<Self> {
        let call = match function {
            "get_param" => Intrinsic::GetParam(Element::hierarchy(argument)),
            "get_attr" => Intrinsic::GetAttr(Element::hierarchy(argument)),
            "get_resource" => Intrinsic::GetResource(argument.into()),
            _ => return None,
        };

        Some(call)
    }
}

impl Element {
    /// A list argument is the hierarchy itself, anything else is a single element
    fn hierarchy(argument: Value) -> Vec<Element> {
        match argument {
            Value::Array(elements) => elements.into_iter().map(Into::into).collect(),
            other => vec![other.into()],
        }
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Element::Key(s),
            Value::Integer(i) => Element::Index(i),
            Value::Call(call) => Element::Call(Box::new(call)),
            other => Element::Invalid(Box::new(other)),
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Element::Key(key) => f.write_str(key),
            Element::Index(index) => write!(f, "{index}"),
            Element::Call(call) => write!(f, "nested {}", call.function_name()),
            Element::Invalid(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<serde_yaml::Number> for Value {
    fn from(value: serde_yaml::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // u64 beyond i64::MAX and every float end up here
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => b.into(),
            Yaml::Number(n) => n.into(),
            Yaml::String(s) => s.into(),
            Yaml::Sequence(sequence) => Value::Array(sequence.into_iter().map(Into::into).collect()),
            Yaml::Mapping(mapping) => {
                let single = mapping.iter().next().filter(|_| mapping.len() == 1);
                if let Some(call) = single.and_then(|(key, argument)| {
                    Intrinsic::from_call(key.as_str()?, argument.clone().into())
                }) {
                    return Value::Call(call);
                }

                Value::Object(
                    mapping
                        .into_iter()
                        .map(|(k, v)| (key_to_string(k), v.into()))
                        .collect(),
                )
            }
            Yaml::Tagged(tagged) => tagged.value.into(),
        }
    }
}

/// Mapping keys are not restricted to strings in yaml. We only address them by string.
fn key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
