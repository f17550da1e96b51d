//! Collapsing siblings that share column names.

use crate::node::{Columns, MetaNode};
use std::collections::HashMap;
use tracing::instrument;

/// In every container, replace the columns of each dataset whose column
/// names (in order) match an earlier sibling's with a reference to that
/// sibling. Rows and previews are kept.
#[instrument(skip_all)]
pub fn merge(tree: &mut MetaNode) {
    tree.walk_mut(&mut |node| {
        if let Some(children) = node.datasets_mut() {
            merge_siblings(children);
        }
    });
}

fn merge_siblings(children: &mut [MetaNode]) {
    let mut seen: HashMap<Vec<String>, String> = HashMap::new();
    for child in children {
        let Some(columns) = child.column_stats() else {
            continue;
        };
        let signature: Vec<String> = columns.iter().map(|column| column.name.clone()).collect();
        match seen.get(&signature) {
            Some(first) => {
                tracing::debug!(name = child.label(), see = first, "Merged column metadata");
                let first = first.clone();
                if let Some(stats) = &mut child.stats {
                    stats.columns = Columns::See(first);
                }
            },
            None => {
                seen.insert(signature, child.label().to_string());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ColumnStat, Content, Preview, Stats};

    fn dataset(name: &str, columns: &[&str]) -> MetaNode {
        let columns = columns
            .iter()
            .map(|column| ColumnStat {
                name: column.to_string(),
                dtype: "i64".to_string(),
                missing: 0,
                nunique: 1,
                top: vec![],
                moments: None,
            })
            .collect::<Vec<_>>();
        MetaNode {
            stats: Some(Stats {
                rows: 1,
                width: columns.len(),
                capped: false,
                columns: Columns::Stats(columns),
                head: Preview::default(),
                sample: Preview::default(),
            }),
            ..MetaNode::named(name)
        }
    }

    fn container(name: &str, children: Vec<MetaNode>) -> MetaNode {
        MetaNode { content: Content::Datasets(children), ..MetaNode::named(name) }
    }

    fn see(node: &MetaNode) -> Option<&str> {
        match &node.stats.as_ref()?.columns {
            Columns::See(name) => Some(name),
            Columns::Stats(_) => None,
        }
    }

    #[test]
    fn later_siblings_point_at_the_first() {
        let mut tree = container(
            "root",
            vec![
                dataset("one", &["x", "y"]),
                dataset("two", &["x", "y"]),
                dataset("other", &["y", "x"]),
                MetaNode { error: Some("broken".to_string()), ..MetaNode::named("broken") },
                dataset("three", &["x", "y"]),
            ],
        );
        merge(&mut tree);
        let children = tree.datasets().unwrap();
        let refs: Vec<_> = children.iter().map(see).collect();
        assert_eq!(refs, [None, Some("one"), None, None, Some("one")]);
        assert_eq!(children[1].stats.as_ref().unwrap().rows, 1);
        assert!(children[3].stats.is_none());
    }

    #[test]
    fn only_direct_siblings_are_compared() {
        let mut tree = container(
            "root",
            vec![dataset("a", &["x"]), container("inner", vec![dataset("b", &["x"]), dataset("c", &["x"])])],
        );
        merge(&mut tree);
        let inner = tree.child("inner").unwrap();
        assert_eq!(see(inner.child("b").unwrap()), None);
        assert_eq!(see(inner.child("c").unwrap()), Some("b"));
        assert_eq!(see(tree.child("a").unwrap()), None);
    }

    #[test]
    fn merging_twice_is_stable() {
        let mut tree = container("root", vec![dataset("a", &["x"]), dataset("b", &["x"])]);
        merge(&mut tree);
        let once = tree.clone();
        merge(&mut tree);
        assert_eq!(tree, once);
    }
}
