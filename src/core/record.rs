//! Indexed record types (tasks, plugins) and their wire shapes

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, SearchError};

/// Default number of results returned by a search
pub const DEFAULT_TOP_K: i64 = 3;

/// Independent id space backed by its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Tasks,
    Plugins,
}

impl Namespace {
    pub fn table(&self) -> &'static str {
        match self {
            Namespace::Tasks => "tasks",
            Namespace::Plugins => "plugins",
        }
    }

    /// Metadata columns after `id`, in embedding text order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Namespace::Tasks => &["name", "description", "category"],
            Namespace::Plugins => &[
                "name",
                "description",
                "category",
                "graph_type",
                "plugin_type",
            ],
        }
    }

    pub fn all() -> &'static [Namespace] {
        &[Namespace::Tasks, Namespace::Plugins]
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A record that can be embedded, stored and ranked.
///
/// `fields()` and `from_fields()` use the column order of `NAMESPACE`, with the
/// name first. The same order drives the text handed to the embedding model.
pub trait Record: Clone + Send + Sync + 'static {
    const NAMESPACE: Namespace;

    /// Search result shape: the record's fields plus a score
    type Scored: Serialize;

    fn id(&self) -> &str;

    fn fields(&self) -> Vec<Option<&str>>;

    fn from_fields(id: String, fields: Vec<Option<String>>) -> Self;

    fn into_scored(self, score: f32) -> Self::Scored;

    /// Non-blank fields joined with newlines
    fn embedding_text(&self) -> String {
        self.fields()
            .into_iter()
            .flatten()
            .filter(|f| !f.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reject records missing their key or name
    fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(SearchError::Validation(format!(
                "{} record has a blank id",
                Self::NAMESPACE
            )));
        }
        let name = self.fields().into_iter().next().flatten().unwrap_or("");
        if name.trim().is_empty() {
            return Err(SearchError::Validation(format!(
                "{} record '{}' has a blank name",
                Self::NAMESPACE,
                self.id()
            )));
        }
        Ok(())
    }
}

/// Empty or whitespace-only optional fields mean "absent"
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pops the next column value; missing columns read as absent
fn next_field(fields: &mut impl Iterator<Item = Option<String>>) -> Option<String> {
    non_blank(fields.next().flatten())
}

/// Task as accepted by the bulk index operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub struct TaskIn {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TaskIn {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_blank(Some(description.into()));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(Some(category.into()));
        self
    }

    /// Collapse blank optional fields to `None`
    pub fn normalized(self) -> Self {
        Self {
            description: non_blank(self.description),
            category: non_blank(self.category),
            ..self
        }
    }
}

impl Record for TaskIn {
    const NAMESPACE: Namespace = Namespace::Tasks;
    type Scored = TaskResult;

    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.name.as_str()),
            self.description.as_deref(),
            self.category.as_deref(),
        ]
    }

    fn from_fields(id: String, fields: Vec<Option<String>>) -> Self {
        let mut fields = fields.into_iter();
        Self {
            id,
            name: next_field(&mut fields).unwrap_or_default(),
            description: next_field(&mut fields),
            category: next_field(&mut fields),
        }
    }

    fn into_scored(self, score: f32) -> TaskResult {
        TaskResult {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            score,
        }
    }
}

/// Task search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub score: f32,
}

/// Plugin as accepted by the bulk index operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct PluginIn {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub graph_type: Option<String>,
    #[serde(default)]
    pub plugin_type: Option<String>,
}

impl PluginIn {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            category: None,
            graph_type: None,
            plugin_type: None,
        }
    }

    pub fn normalized(self) -> Self {
        Self {
            description: non_blank(self.description),
            category: non_blank(self.category),
            graph_type: non_blank(self.graph_type),
            plugin_type: non_blank(self.plugin_type),
            ..self
        }
    }
}

impl Record for PluginIn {
    const NAMESPACE: Namespace = Namespace::Plugins;
    type Scored = PluginResult;

    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.name.as_str()),
            self.description.as_deref(),
            self.category.as_deref(),
            self.graph_type.as_deref(),
            self.plugin_type.as_deref(),
        ]
    }

    fn from_fields(id: String, fields: Vec<Option<String>>) -> Self {
        let mut fields = fields.into_iter();
        Self {
            id,
            name: next_field(&mut fields).unwrap_or_default(),
            description: next_field(&mut fields),
            category: next_field(&mut fields),
            graph_type: next_field(&mut fields),
            plugin_type: next_field(&mut fields),
        }
    }

    fn into_scored(self, score: f32) -> PluginResult {
        PluginResult {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            graph_type: self.graph_type.unwrap_or_default(),
            plugin_type: self.plugin_type.unwrap_or_default(),
            score,
        }
    }
}

/// Plugin search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub graph_type: String,
    pub plugin_type: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct BulkIndexRequest {
    #[serde(default)]
    pub tasks: Vec<TaskIn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PluginBulkIndexRequest {
    #[serde(default)]
    pub plugins: Vec<PluginIn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K
}

/// Response of the bulk index operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCount {
    pub indexed: usize,
}
