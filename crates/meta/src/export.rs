//! JSON projection of the tree.
//!
//! Nodes serialize as ordered maps. Absent fields are omitted rather than
//! written as `null`, so an unread leaf and a failed one look different.

use crate::node::{ColumnStat, Columns, Content, MetaNode, Moments, Preview};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A node prepared for export.
///
/// Read commands and previews are dropped unless [`Export::full`] is set; they
/// matter for re-reading a dataset, not for describing it.
#[derive(Debug, Clone, Copy)]
pub struct Export<'a> {
    node: &'a MetaNode,
    full: bool,
}

impl<'a> Export<'a> {
    pub fn new(node: &'a MetaNode) -> Self {
        Self { node, full: false }
    }

    /// Keep `command`, `head` and `sample`.
    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Export<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.node;
        let mut map = serializer.serialize_map(None)?;
        if let Some(source) = &node.source {
            map.serialize_entry("source", source)?;
        }
        if let Some(name) = &node.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(format) = &node.format {
            map.serialize_entry("format", format)?;
        }
        match &node.content {
            Content::Command(command) if self.full => map.serialize_entry("command", command)?,
            Content::Datasets(children) => {
                map.serialize_entry("datasets", &Datasets { children, full: self.full })?;
            },
            Content::Command(_) | Content::Empty => {},
        }
        if let Some(stats) = &node.stats {
            map.serialize_entry("rows", &stats.rows)?;
            map.serialize_entry("columns", &stats.columns)?;
            if self.full {
                map.serialize_entry("head", &stats.head)?;
                map.serialize_entry("sample", &stats.sample)?;
            }
        }
        if let Some(error) = &node.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

struct Datasets<'a> {
    children: &'a [MetaNode],
    full: bool,
}

impl Serialize for Datasets<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.children.len()))?;
        for child in self.children {
            map.serialize_entry(child.label(), &Export { node: child, full: self.full })?;
        }
        map.end()
    }
}

/// Everything, including commands and previews.
impl Serialize for MetaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Export::new(self).full(true).serialize(serializer)
    }
}

impl Serialize for Columns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Columns::Stats(columns) => {
                let mut map = serializer.serialize_map(Some(columns.len()))?;
                for column in columns {
                    map.serialize_entry(&column.name, column)?;
                }
                map.end()
            },
            Columns::See(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("see", name)?;
                map.end()
            },
        }
    }
}

struct Top<'a>(&'a [(String, usize)]);

impl Serialize for Top<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, count) in self.0 {
            map.serialize_entry(value, count)?;
        }
        map.end()
    }
}

impl Serialize for ColumnStat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("dtype", &self.dtype)?;
        map.serialize_entry("missing", &self.missing)?;
        map.serialize_entry("nunique", &self.nunique)?;
        map.serialize_entry("top", &Top(&self.top))?;
        if let Some(moments) = &self.moments {
            map.serialize_entry("moments", moments)?;
        }
        map.end()
    }
}

impl Serialize for Moments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        map.serialize_entry("count", &self.count)?;
        for (label, value) in &self.entries()[1..] {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl Serialize for Preview {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("columns", &self.columns)?;
        map.serialize_entry("index", &self.index)?;
        map.serialize_entry("data", &self.data)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Stats;
    use serde_json::json;
    use tabmeta_format::Format;
    use tabmeta_read::ReadCommand;

    fn leaf() -> MetaNode {
        let column = ColumnStat {
            name: "a".to_string(),
            dtype: "i64".to_string(),
            missing: 0,
            nunique: 2,
            top: vec![("1".to_string(), 1), ("3".to_string(), 1)],
            moments: Some(Moments { count: 2, mean: Some(2.0), ..Moments::default() }),
        };
        let preview = Preview {
            columns: vec!["a".to_string()],
            index: vec![0, 1],
            data: vec![vec![json!(1)], vec![json!(3)]],
        };
        MetaNode {
            stats: Some(Stats {
                rows: 2,
                width: 1,
                capped: false,
                columns: Columns::Stats(vec![column]),
                head: preview.clone(),
                sample: preview,
            }),
            ..MetaNode::named("x.csv").with_format(Format::Csv).with_command(ReadCommand::Csv("x.csv".into()))
        }
    }

    #[test]
    fn export_drops_commands_and_previews() {
        let value = serde_json::to_value(Export::new(&leaf())).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "x.csv",
                "format": "csv",
                "rows": 2,
                "columns": {"a": {
                    "name": "a", "dtype": "i64", "missing": 0, "nunique": 2,
                    "top": {"1": 1, "3": 1},
                    "moments": {
                        "count": 2, "mean": 2.0, "std": null, "min": null,
                        "25%": null, "50%": null, "75%": null, "max": null
                    }
                }}
            })
        );
    }

    #[test]
    fn full_export_keeps_everything_in_order() {
        let value = serde_json::to_value(leaf()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["name", "format", "command", "rows", "columns", "head", "sample"]);
        assert_eq!(value["command"], json!(["csv", "x.csv"]));
        assert_eq!(value["head"], json!({"columns": ["a"], "index": [0, 1], "data": [[1], [3]]}));
    }

    #[test]
    fn containers_and_back_references() {
        let mut second = leaf();
        second.name = Some("y.csv".to_string());
        if let Some(stats) = &mut second.stats {
            stats.columns = Columns::See("x.csv".to_string());
        }
        let failed = MetaNode { error: Some("bad".into()), ..MetaNode::named("z") };
        let root = MetaNode {
            content: Content::Datasets(vec![leaf(), second, failed]),
            ..MetaNode::root("/data").with_format(Format::Dir)
        };
        let value = serde_json::to_value(Export::new(&root)).unwrap();
        assert_eq!(value["source"], "/data");
        assert_eq!(value["datasets"]["y.csv"]["columns"], json!({"see": "x.csv"}));
        assert_eq!(value["datasets"]["z"], json!({"name": "z", "error": "bad"}));
        let names: Vec<_> = value["datasets"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(names, ["x.csv", "y.csv", "z"]);
    }
}
