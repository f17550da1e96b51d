use std::io::Write;
use std::path::Path;
use tabmeta_config::Config;
use tabmeta_format::Format;
use tabmeta_meta::{Columns, Export, MetaNode, metadata, outline};

fn config(dir: &Path) -> Config {
    Config { seed: Some(42), ..Config::default().with_cache_root(dir.join("cache")) }
}

fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, contents) in members {
        zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap();
}

fn see(node: &MetaNode) -> Option<&str> {
    match &node.stats.as_ref()?.columns {
        Columns::See(name) => Some(name),
        Columns::Stats(_) => None,
    }
}

#[test]
fn single_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.csv");
    std::fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    assert_eq!(tree.format, Some(Format::Csv));
    let stats = tree.stats.as_ref().unwrap();
    assert_eq!(stats.rows, 2);
    let a = &tree.column_stats().unwrap()[0];
    assert_eq!((a.name.as_str(), a.missing, a.nunique), ("a", 0, 2));
    let moments = a.moments.as_ref().unwrap();
    assert_eq!(moments.count, 2);
    assert_eq!(moments.mean, Some(2.0));
    assert_eq!((moments.q25, moments.q50, moments.q75), (Some(1.5), Some(2.0), Some(2.5)));
    assert!((moments.std.unwrap() - 1.4142135624).abs() < 1e-9);
    assert_eq!((moments.min, moments.max), (Some(1.0), Some(3.0)));
}

#[test]
fn archive_members_become_merged_children() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    write_zip(&path, &[("a.csv", b"x,y\n1,2\n"), ("b.csv", b"x,y\n3,4\n"), ("sub/c.csv", b"x,y\n5,6\n")]);
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    assert_eq!(tree.format, Some(Format::Zip));
    let children = tree.datasets().unwrap();
    let names: Vec<_> = children.iter().map(MetaNode::label).collect();
    assert_eq!(names, ["a.csv", "b.csv", "sub/c.csv"]);
    let refs: Vec<_> = children.iter().map(see).collect();
    assert_eq!(refs, [None, Some("a.csv"), Some("a.csv")]);
    assert!(children.iter().all(|child| child.stats.as_ref().is_some_and(|stats| stats.rows == 1)));
}

#[test]
fn nested_compression_inside_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    let packed = Format::Gz.compression().unwrap().compress(b"k,v\na,1\nb,2\n").unwrap();
    let path = dir.path().join("outer.zip");
    write_zip(&path, &[("inner/data.csv.gz", &packed)]);
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    let gz = tree.child("inner/data.csv.gz").unwrap();
    assert_eq!(gz.format, Some(Format::Gz));
    let csv = gz.child("data.csv").unwrap();
    assert_eq!(csv.format, Some(Format::Csv));
    assert_eq!(csv.stats.as_ref().unwrap().rows, 2);
}

#[test]
fn directory_keeps_going_past_a_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    std::fs::write(data.join("one.csv"), "a,b\n1,2\n").unwrap();
    std::fs::write(data.join("two.csv"), "c,d\n1,2\n").unwrap();
    std::fs::write(data.join("three.json"), "{not json").unwrap();
    let tree = metadata(&data.display().to_string(), None, &config(dir.path())).unwrap();

    let children = tree.datasets().unwrap();
    assert_eq!(children.len(), 3);
    let failed: Vec<_> = children.iter().filter(|child| child.error.is_some()).map(MetaNode::label).collect();
    assert_eq!(failed, ["three.json"]);
    assert!(tree.child("one.csv").unwrap().stats.is_some());
    assert!(tree.child("two.csv").unwrap().stats.is_some());
}

#[test]
fn sqlite_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    tabmeta_read::fixtures::write_sqlite(
        &path,
        "CREATE TABLE items (id INTEGER, name TEXT); INSERT INTO items VALUES (1, 'pen'), (2, 'ink'); \
         CREATE TABLE archive (id INTEGER, name TEXT); INSERT INTO archive VALUES (0, 'quill');",
    )
    .unwrap();
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    assert_eq!(tree.format, Some(Format::Sqlite3));
    let items = tree.child("items").unwrap();
    assert_eq!(items.format, Some(Format::Table));
    assert_eq!(items.stats.as_ref().unwrap().rows, 2);
    assert_eq!(tree.child("archive").unwrap().stats.as_ref().unwrap().rows, 1);
    assert_eq!(see(items), Some("archive"));
}

#[test]
fn workbook_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");
    let people: &[&[&str]] = &[&["name", "age"], &["ann", "31"], &["bob", "42"], &["cy", "42"]];
    tabmeta_read::fixtures::write_workbook(&path, &[("people", people)]).unwrap();
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    let people = tree.child("people").unwrap();
    let age = &people.column_stats().unwrap()[1];
    assert_eq!(age.nunique, 2);
    let counts: Vec<_> = age.top.iter().map(|(_, count)| *count).collect();
    assert_eq!(counts, [2, 1]);
}

#[test]
fn export_and_outline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.csv");
    std::fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();
    let tree = metadata(&path.display().to_string(), None, &config(dir.path())).unwrap();

    let json: serde_json::Value = serde_json::from_str(&Export::new(&tree).to_json().unwrap()).unwrap();
    assert_eq!(json["rows"], 2);
    assert_eq!(json["columns"]["a"]["moments"]["mean"], 2.0);
    assert!(json.get("command").is_none() && json.get("head").is_none());
    let full = serde_json::to_value(Export::new(&tree).full(true)).unwrap();
    assert_eq!(full["command"][0], "csv");
    assert_eq!(full["head"]["index"], serde_json::json!([0, 1]));

    let text = outline::to_text(&tree);
    assert!(text.starts_with(&format!("{} (csv) 2 rows 2 cols", path.display())));
}
