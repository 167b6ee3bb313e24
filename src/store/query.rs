//! Query predicates, paging and continuation tokens
//!
//! A [`QueryFilter`] is a conjunction of [`Predicate`]s. Store adapters that
//! speak Cosmos SQL push it down with [`QueryFilter::to_sql`]; the in-memory
//! store evaluates it directly with [`QueryFilter::matches`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::arm::PartitionKey;

use super::errors::{StoreError, StoreResult};
use super::StoredItem;

/// JSON pointer of the resource type field on every document
pub const RESOURCE_TYPE_FIELD: &str = "/resourceType";

/// JSON pointer of the canonical resource ID on every document
pub const RESOURCE_ID_FIELD: &str = "/resourceId";

/// Which partitions a query reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    Partition(PartitionKey),
    /// Every partition in the container. Not for request hot paths.
    CrossPartition,
}

/// One condition on a document
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `resourceType` equals the value, ignoring case
    ResourceType(String),
    /// `resourceId` starts with the value, ignoring case
    ResourceIdPrefix(String),
    /// `resourceId` contains exactly this many `/`
    ResourceIdDepth(usize),
    FieldEquals {
        pointer: String,
        value: Value,
        ignore_case: bool,
    },
    FieldStartsWith {
        pointer: String,
        prefix: String,
        ignore_case: bool,
    },
    /// The field is absent or holds none of the values
    FieldNotIn { pointer: String, values: Vec<Value> },
    /// At least one of the nested predicates holds
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Predicate::ResourceType(t) => string_at(doc, RESOURCE_TYPE_FIELD)
                .map(|s| s.eq_ignore_ascii_case(t))
                .unwrap_or(false),
            Predicate::ResourceIdPrefix(prefix) => string_at(doc, RESOURCE_ID_FIELD)
                .map(|s| starts_with_ignore_case(s, prefix))
                .unwrap_or(false),
            Predicate::ResourceIdDepth(depth) => string_at(doc, RESOURCE_ID_FIELD)
                .map(|s| s.matches('/').count() == *depth)
                .unwrap_or(false),
            Predicate::FieldEquals {
                pointer,
                value,
                ignore_case,
            } => match (doc.pointer(pointer), value) {
                (Some(Value::String(a)), Value::String(b)) if *ignore_case => {
                    a.eq_ignore_ascii_case(b)
                }
                (Some(found), expected) => found == expected,
                (None, _) => false,
            },
            Predicate::FieldStartsWith {
                pointer,
                prefix,
                ignore_case,
            } => string_at(doc, pointer)
                .map(|s| {
                    if *ignore_case {
                        starts_with_ignore_case(s, prefix)
                    } else {
                        s.starts_with(prefix.as_str())
                    }
                })
                .unwrap_or(false),
            Predicate::FieldNotIn { pointer, values } => match doc.pointer(pointer) {
                Some(found) => !values.contains(found),
                None => true,
            },
            Predicate::AnyOf(options) => options.iter().any(|p| p.matches(doc)),
        }
    }

    fn render(&self, params: &mut Vec<SqlParameter>) -> String {
        match self {
            Predicate::ResourceType(t) => {
                let name = push_param(params, Value::String(t.clone()));
                format!("STRINGEQUALS(c.resourceType, {}, true)", name)
            }
            Predicate::ResourceIdPrefix(prefix) => {
                let name = push_param(params, Value::String(prefix.clone()));
                format!("STARTSWITH(c.resourceId, {}, true)", name)
            }
            // An integer we control, so no parameter needed.
            Predicate::ResourceIdDepth(depth) => format!(
                "(LENGTH(c.resourceId) - LENGTH(REPLACE(c.resourceId, '/', ''))) = {}",
                depth
            ),
            Predicate::FieldEquals {
                pointer,
                value,
                ignore_case,
            } => {
                let path = sql_path(pointer);
                let name = push_param(params, value.clone());
                if *ignore_case && value.is_string() {
                    format!("STRINGEQUALS({}, {}, true)", path, name)
                } else {
                    format!("{} = {}", path, name)
                }
            }
            Predicate::FieldStartsWith {
                pointer,
                prefix,
                ignore_case,
            } => {
                let name = push_param(params, Value::String(prefix.clone()));
                format!("STARTSWITH({}, {}, {})", sql_path(pointer), name, ignore_case)
            }
            Predicate::FieldNotIn { pointer, values } => {
                let name = push_param(params, Value::Array(values.clone()));
                format!("NOT ARRAY_CONTAINS({}, {})", name, sql_path(pointer))
            }
            Predicate::AnyOf(options) => {
                let parts: Vec<String> = options.iter().map(|p| p.render(params)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

/// A conjunction of predicates; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    predicates: Vec<Predicate>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(doc))
    }

    /// Render as a parameterized Cosmos SQL query.
    pub fn to_sql(&self) -> SqlQuery {
        let mut parameters = Vec::new();
        let mut text = String::from("SELECT * FROM c");
        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|p| p.render(&mut parameters))
            .collect();
        if !clauses.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&clauses.join(" AND "));
        }
        SqlQuery { text, parameters }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub text: String,
    pub parameters: Vec<SqlParameter>,
}

/// Page size and resume position for one query round-trip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` returns every remaining match in one page
    pub max_items: Option<usize>,
    pub continuation: Option<String>,
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<StoredItem>,
    /// Present when more results may follow
    pub continuation: Option<String>,
}

/// Encode a resume position as an opaque token.
pub fn encode_continuation(partition: &str, key: &str) -> String {
    BASE64.encode(format!("{}\n{}", partition, key))
}

/// Decode a token produced by [`encode_continuation`].
pub fn decode_continuation(token: &str) -> StoreResult<(String, String)> {
    let bytes = BASE64
        .decode(token)
        .map_err(|_| invalid_token(token))?;
    let text = String::from_utf8(bytes).map_err(|_| invalid_token(token))?;
    let (partition, key) = text.split_once('\n').ok_or_else(|| invalid_token(token))?;
    Ok((partition.to_string(), key.to_string()))
}

fn invalid_token(token: &str) -> StoreError {
    StoreError::InvalidRequest(format!("invalid continuation token: {:?}", token))
}

fn push_param(params: &mut Vec<SqlParameter>, value: Value) -> String {
    let name = format!("@p{}", params.len());
    params.push(SqlParameter {
        name: name.clone(),
        value,
    });
    name
}

fn sql_path(pointer: &str) -> String {
    let mut path = String::from("c");
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        path.push_str(&format!("[\"{}\"]", segment.replace('"', "\\\"")));
    }
    path
}

fn string_at<'a>(doc: &'a Value, pointer: &str) -> Option<&'a str> {
    doc.pointer(pointer).and_then(Value::as_str)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}
