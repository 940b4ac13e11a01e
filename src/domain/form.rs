//! Donation form definitions and submission payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One node of a decoded form definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldNode {
    Leaf,
    Group(BTreeMap<String, FieldNode>),
}

impl FieldNode {
    pub fn group<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldNode)>,
        K: Into<String>,
    {
        FieldNode::Group(
            children
                .into_iter()
                .map(|(key, node)| (key.into(), node))
                .collect(),
        )
    }

    pub fn children(&self) -> Option<&BTreeMap<String, FieldNode>> {
        match self {
            FieldNode::Group(children) => Some(children),
            FieldNode::Leaf => None,
        }
    }
}

/// Objects become groups, arrays become groups keyed by position, scalars are leaves.
impl From<&Value> for FieldNode {
    fn from(value: &Value) -> Self {
        match value {
            Value::Object(map) => FieldNode::Group(
                map.iter()
                    .map(|(key, child)| (key.clone(), FieldNode::from(child)))
                    .collect(),
            ),
            Value::Array(items) => FieldNode::Group(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| (index.to_string(), FieldNode::from(child)))
                    .collect(),
            ),
            _ => FieldNode::Leaf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Open,
    Closed,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Open => "open",
            FormStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(FormStatus::Open),
            "closed" => Some(FormStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub id: Uuid,
    pub title: String,
    pub status: FormStatus,
    pub elements: FieldNode,
}

/// Untyped string-keyed submission payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionData(Map<String, Value>);

impl SubmissionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` unless the value is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads a nested scalar as text. Numbers are rendered as written.
    pub fn text(&self, path: &[&str]) -> Option<String> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.get(*key)?;
        }

        match current {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub data: SubmissionData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSubmission {
    pub fn new(id: Uuid, form_id: Uuid, data: SubmissionData) -> Self {
        let now = Utc::now();
        Self {
            id,
            form_id,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}
