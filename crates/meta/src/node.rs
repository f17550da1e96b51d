//! The metadata tree.

use serde_json::Value;
use tabmeta_format::Format;
use tabmeta_read::ReadCommand;

/// What a node holds besides its own description.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Content {
    /// Unclassified, or recursion failed.
    #[default]
    Empty,
    /// A dataset that can be read directly.
    Command(ReadCommand),
    /// Named sub-datasets, in discovery order.
    Datasets(Vec<MetaNode>),
}

/// One source, container or dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaNode {
    /// Where the tree came from. Only set on the root.
    pub source: Option<String>,
    /// Name within the parent container. Never set on the root.
    pub name: Option<String>,
    pub format: Option<Format>,
    pub content: Content,
    pub error: Option<String>,
    /// Set once the node's command has been read.
    pub stats: Option<Stats>,
}

/// What materializing a leaf found.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub rows: usize,
    /// Number of columns, kept when [`Columns::See`] replaces the details.
    pub width: usize,
    /// Whether reading stopped at the row cap.
    pub capped: bool,
    pub columns: Columns,
    pub head: Preview,
    pub sample: Preview,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Columns {
    Stats(Vec<ColumnStat>),
    /// Same column names as the named sibling; see its statistics.
    See(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStat {
    pub name: String,
    pub dtype: String,
    pub missing: usize,
    pub nunique: usize,
    /// Most frequent non-null values with their counts, most frequent first.
    pub top: Vec<(String, usize)>,
    /// Only for integer and floating-point columns.
    pub moments: Option<Moments>,
}

/// Descriptive statistics over the non-null values of a numeric column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl Moments {
    /// `(label, value)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("count", Some(self.count as f64)),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.q50),
            ("75%", self.q75),
            ("max", self.max),
        ]
    }
}

/// Some rows of a frame in split orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preview {
    pub columns: Vec<String>,
    /// Original row positions.
    pub index: Vec<usize>,
    pub data: Vec<Vec<Value>>,
}

impl MetaNode {
    /// A fresh root for `source`.
    pub fn root(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), ..Self::default() }
    }

    /// A fresh child called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_command(mut self, command: ReadCommand) -> Self {
        self.content = Content::Command(command);
        self
    }

    /// Name for display: the name, else the source.
    pub fn label(&self) -> &str {
        self.name.as_deref().or(self.source.as_deref()).unwrap_or_default()
    }

    pub fn command(&self) -> Option<&ReadCommand> {
        match &self.content {
            Content::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn datasets(&self) -> Option<&[MetaNode]> {
        match &self.content {
            Content::Datasets(children) => Some(children),
            _ => None,
        }
    }

    pub fn datasets_mut(&mut self) -> Option<&mut Vec<MetaNode>> {
        match &mut self.content {
            Content::Datasets(children) => Some(children),
            _ => None,
        }
    }

    /// The direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&MetaNode> {
        self.datasets()?.iter().find(|child| child.name.as_deref() == Some(name))
    }

    /// Column statistics, unless collapsed into a back-reference.
    pub fn column_stats(&self) -> Option<&[ColumnStat]> {
        match &self.stats.as_ref()?.columns {
            Columns::Stats(columns) => Some(columns),
            Columns::See(_) => None,
        }
    }

    /// Whether the node has been read, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.stats.is_some() || self.error.is_some()
    }

    /// This node and all its descendants, parents before children.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Visit this node and all descendants mutably, parents before children.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut MetaNode)) {
        visit(self);
        if let Content::Datasets(children) = &mut self.content {
            for child in children {
                child.walk_mut(visit);
            }
        }
    }
}

/// Pre-order iterator over a tree.
pub struct Walk<'a> {
    stack: Vec<&'a MetaNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MetaNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Content::Datasets(children) = &node.content {
            self.stack.extend(children.iter().rev());
        }
        Some(node)
    }
}
