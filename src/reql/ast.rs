//! ReQL Abstract Syntax Tree (AST).
//!
//! A query is a tree of `Term` nodes, where each node has:
//!
//! - A `TermType` specifying the operation
//! - Positional arguments (`args`): child terms
//! - Optional named arguments (`optargs`): key-value pairs
//! - A datum value for literal (`DATUM`) leaves
//!
//! # Wire Format
//!
//! Terms are rendered as JSON arrays:
//!
//! ```json
//! [term_type, [arg1, arg2, ...], {"optarg1": value1, ...}]
//! ```
//!
//! Literal leaves render as their bare JSON value, except arrays, which are
//! wrapped as `[MAKE_ARRAY, [...]]` so the server does not read them as terms.
//! `MAKE_OBJ` renders as a bare JSON object.
//!
//! # Example
//!
//! Building `r.table("users").filter({age: 25})` by hand:
//!
//! ```rust,ignore
//! use rethinkdb_client::reql::{Term, TermType, Datum};
//! use serde_json::json;
//!
//! let query = Term::new(TermType::Filter)
//!     .with_arg(Term::table("users"))
//!     .with_arg(Term::datum(Datum::from(json!({"age": 25}))));
//!
//! assert_eq!(query.to_json(), json!([39, [[15, ["users"]], {"age": 25}]]));
//! ```

use super::datum::Datum;
use super::terms::TermType;
use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A ReQL Term - one immutable node of a query tree.
///
/// Chain methods never modify the receiver; each builds a new node that
/// holds a copy of it, so a sub-expression can be reused in any number of
/// queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// The type of this term
    pub term_type: TermType,

    /// Positional arguments
    pub args: Vec<Term>,

    /// Optional named arguments
    pub optargs: HashMap<String, Term>,

    /// Datum value (for Datum terms)
    pub datum: Option<Datum>,
}

impl Term {
    /// Create a new term with given type
    pub fn new(term_type: TermType) -> Self {
        Self {
            term_type,
            args: Vec::new(),
            optargs: HashMap::new(),
            datum: None,
        }
    }

    /// Create a datum term
    pub fn datum(datum: Datum) -> Self {
        Self {
            term_type: TermType::Datum,
            args: Vec::new(),
            optargs: HashMap::new(),
            datum: Some(datum),
        }
    }

    /// Add a positional argument
    pub fn with_arg(mut self, arg: impl Into<Term>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple positional arguments
    pub fn with_args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an optional named argument
    pub fn with_optarg<S: Into<String>>(mut self, name: S, value: impl Into<Term>) -> Self {
        self.optargs.insert(name.into(), value.into());
        self
    }

    /// Add every entry of an options dictionary as an optional argument.
    pub fn with_options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Term>,
    {
        self.optargs
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Get the first argument
    pub fn first_arg(&self) -> Option<&Term> {
        self.args.first()
    }

    /// Get argument at index
    pub fn arg(&self, index: usize) -> Option<&Term> {
        self.args.get(index)
    }

    /// Get optional argument by name
    pub fn optarg(&self, name: &str) -> Option<&Term> {
        self.optargs.get(name)
    }

    /// Check if this is a datum term
    pub fn is_datum(&self) -> bool {
        self.term_type == TermType::Datum
    }

    /// Get datum value if this is a datum term
    pub fn as_datum(&self) -> Option<&Datum> {
        self.datum.as_ref()
    }

    /// Render the term in wire JSON form.
    pub fn to_json(&self) -> Value {
        match self.term_type {
            TermType::Datum => literal_json(
                self.datum
                    .as_ref()
                    .map(Datum::to_json)
                    .unwrap_or(Value::Null),
            ),
            TermType::MakeObj if self.args.is_empty() => Value::Object(self.optargs_json()),
            term_type => {
                let mut encoded = vec![Value::from(term_type.to_u64())];
                if !self.args.is_empty() || !self.optargs.is_empty() {
                    encoded.push(Value::Array(self.args.iter().map(Term::to_json).collect()));
                }
                if !self.optargs.is_empty() {
                    encoded.push(Value::Object(self.optargs_json()));
                }
                Value::Array(encoded)
            }
        }
    }

    fn optargs_json(&self) -> Map<String, Value> {
        self.optargs
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }

    /// Parse a term from its wire JSON form.
    ///
    /// Arrays are read as `[term_type, [args...], {optargs...}]`, objects as
    /// `MAKE_OBJ` and everything else as a literal.
    pub fn from_json(json: &Value) -> Result<Self> {
        match json {
            Value::Array(arr) => Self::compound_from_json(arr),
            Value::Object(obj) => {
                if obj.contains_key(super::datum::REQL_TYPE_KEY) {
                    return Ok(Term::datum(Datum::from_json(json.clone())));
                }
                let optargs = obj
                    .iter()
                    .map(|(key, value)| Self::from_json(value).map(|term| (key.clone(), term)))
                    .collect::<Result<HashMap<_, _>>>()?;
                Ok(Term::new(TermType::MakeObj).with_options(optargs))
            }
            other => Ok(Term::datum(Datum::from_json(other.clone()))),
        }
    }

    fn compound_from_json(arr: &[Value]) -> Result<Self> {
        let first = arr
            .first()
            .ok_or_else(|| Error::Protocol("Empty term array".to_string()))?;

        let term_type_num = first.as_u64().ok_or_else(|| {
            Error::Protocol(format!("Invalid term type: expected number, got {}", first))
        })?;

        let term_type = TermType::from_u64(term_type_num)
            .ok_or_else(|| Error::Protocol(format!("Unknown term type: {}", term_type_num)))?;

        if term_type == TermType::Datum {
            let value = arr
                .get(1)
                .ok_or_else(|| Error::Protocol("DATUM term requires value argument".to_string()))?;
            return Ok(Term::datum(Datum::from_json(value.clone())));
        }

        let mut term = Term::new(term_type);

        if let Some(args) = arr.get(1) {
            let args = args.as_array().ok_or_else(|| {
                Error::Protocol(format!("{} arguments must be an array", term_type))
            })?;
            for arg in args {
                term.args.push(Self::from_json(arg)?);
            }
        }

        if let Some(optargs) = arr.get(2) {
            let optargs = optargs.as_object().ok_or_else(|| {
                Error::Protocol(format!("{} optargs must be an object", term_type))
            })?;
            for (key, value) in optargs {
                term.optargs.insert(key.clone(), Self::from_json(value)?);
            }
        }

        Ok(term)
    }

    /// Pretty print the term tree
    pub fn pretty_print(&self, indent: usize) -> String {
        let indent_str = "  ".repeat(indent);
        let mut result = format!("{}{}(", indent_str, self.term_type.name());

        if let Some(datum) = &self.datum {
            result.push_str(&datum.to_string());
        }

        if !self.args.is_empty() {
            result.push('\n');
            for (i, arg) in self.args.iter().enumerate() {
                result.push_str(&arg.pretty_print(indent + 1));
                if i < self.args.len() - 1 {
                    result.push(',');
                }
                result.push('\n');
            }
            result.push_str(&indent_str);
        }

        if !self.optargs.is_empty() {
            let mut keys: Vec<&String> = self.optargs.keys().collect();
            keys.sort();
            result.push_str(" {");
            for key in keys {
                result.push_str(&format!("\n{}  {}: ", indent_str, key));
                result.push_str(self.optargs[key].pretty_print(indent + 2).trim_start());
            }
            result.push_str(&format!("\n{}}}", indent_str));
        }

        result.push(')');
        result
    }
}

/// Wrap every nested array of a literal as MAKE_ARRAY.
fn literal_json(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(vec![
            Value::from(TermType::MakeArray.to_u64()),
            Value::Array(items.into_iter().map(literal_json).collect()),
        ]),
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, literal_json(v)))
                .collect(),
        ),
        other => other,
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// Literal conversion: every native value becomes a DATUM leaf.

impl From<Datum> for Term {
    fn from(datum: Datum) -> Self {
        Term::datum(datum)
    }
}

impl From<&Term> for Term {
    fn from(term: &Term) -> Self {
        term.clone()
    }
}

macro_rules! term_from_literal {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Term {
                fn from(value: $t) -> Self {
                    Term::datum(Datum::from(value))
                }
            }
        )*
    };
}

term_from_literal!(
    (), bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64,
    String, &str, &String, &[u8], bytes::Bytes, Value
);

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for Term {
    fn from(value: chrono::DateTime<Tz>) -> Self {
        Term::datum(Datum::from(value))
    }
}

impl<T: Into<Term>> From<Vec<T>> for Term {
    fn from(items: Vec<T>) -> Self {
        Term::new(TermType::MakeArray).with_args(items)
    }
}

impl<T: Into<Term>> From<Option<T>> for Term {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(|| Term::datum(Datum::Null))
    }
}

impl<T: Into<Term>> From<HashMap<String, T>> for Term {
    fn from(map: HashMap<String, T>) -> Self {
        Term::new(TermType::MakeObj).with_options(map)
    }
}

impl<T: Into<Term>> From<std::collections::BTreeMap<String, T>> for Term {
    fn from(map: std::collections::BTreeMap<String, T>) -> Self {
        Term::new(TermType::MakeObj).with_options(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_term_creation() {
        let term = Term::new(TermType::Db);
        assert_eq!(term.term_type, TermType::Db);
        assert!(term.args.is_empty());
        assert_eq!(term.to_json(), json!([14]));
    }

    #[test]
    fn test_datum_term() {
        let term = Term::datum(Datum::String("test".to_string()));
        assert!(term.is_datum());
        assert_eq!(term.as_datum().unwrap().as_string(), Some("test"));
        assert_eq!(term.to_json(), json!("test"));
    }

    #[test]
    fn test_literal_arrays_are_wrapped() {
        let term = Term::from(json!({"tags": ["a", "b"], "n": 1}));
        assert_eq!(term.to_json(), json!({"tags": [2, ["a", "b"]], "n": 1}));

        let term = Term::from(vec![1, 2, 3]);
        assert_eq!(term.to_json(), json!([2, [1, 2, 3]]));
    }

    #[test]
    fn test_optargs_render() {
        let term = Term::new(TermType::Insert)
            .with_arg(Term::new(TermType::Table).with_arg("users"))
            .with_arg(json!({"name": "Bob"}))
            .with_optarg("conflict", "replace");
        assert_eq!(
            term.to_json(),
            json!([56, [[15, ["users"]], {"name": "Bob"}], {"conflict": "replace"}])
        );
    }

    #[test]
    fn test_make_obj_renders_bare() {
        let mut fields = HashMap::new();
        fields.insert("n".to_string(), Term::new(TermType::Now));
        let term = Term::from(fields);
        assert_eq!(term.to_json(), json!({"n": [103]}));
    }

    #[test]
    fn test_from_json_round_trip() {
        let wire = json!([39, [[15, ["users"]], {"active": true}], {"default": false}]);
        let term = Term::from_json(&wire).unwrap();
        assert_eq!(term.term_type, TermType::Filter);
        assert_eq!(term.args.len(), 2);
        assert!(term.optarg("default").is_some());
        assert_eq!(term.to_json(), wire);
    }

    #[test]
    fn test_from_json_rejects_unknown_opcode() {
        assert!(Term::from_json(&json!([9999, []])).is_err());
        assert!(Term::from_json(&json!([])).is_err());
        assert!(Term::from_json(&json!(["x"])).is_err());
    }

    #[test]
    fn test_pretty_print() {
        let term = Term::new(TermType::Table).with_arg("users");
        let printed = term.pretty_print(0);
        assert!(printed.starts_with("TABLE("));
        assert!(printed.contains("\"users\""));
    }
}
