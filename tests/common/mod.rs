#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tagtree::{NodeRef, Schema, SchemaBuilder, TagId};
use tempfile::TempDir;

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn geometry_package(&self) -> PathBuf {
        self.fixtures_dir.join("geometry").join("package.xml")
    }

    pub fn invalid_manifest(&self, name: &str) -> PathBuf {
        self.fixtures_dir.join("invalid").join(name)
    }
}

pub const MINIMAL_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package name="tiny">
  <author name="Ada" email="ada@example.org"/>
  <description short="A tiny package"/>
  <module name="tiny">
    <sources><file name="*.c"/></sources>
  </module>
</package>
"#;

/// A package directory holding `package.xml` and a couple of C sources
pub fn create_package_dir(manifest: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("package.xml"), manifest).unwrap();
    fs::write(temp_dir.path().join("one.c"), "int one(void) { return 1; }\n").unwrap();
    fs::write(temp_dir.path().join("two.c"), "int two(void) { return 2; }\n").unwrap();
    temp_dir
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join("package.xml")
}

/// Context recording every hook call in order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventLog {
    pub events: Vec<String>,
}

fn record(
    phase: &'static str,
) -> impl Fn(NodeRef<'_>, &mut EventLog) -> anyhow::Result<()> + Send + Sync {
    move |node, log| {
        log.events.push(format!("{phase} {}", node.element_name()));
        Ok(())
    }
}

/// A small library catalogue schema, with hooks on every tag
pub struct Catalogue {
    pub schema: Schema<EventLog>,
    pub root: TagId,
}

pub fn catalogue_schema() -> Catalogue {
    let mut builder = SchemaBuilder::<EventLog>::new();

    let title = builder
        .tag("title")
        .unique()
        .on_start(record("start"))
        .on_finalize(record("finalize"))
        .declare();
    let author = builder
        .tag("author")
        .mandatory_attribute("name")
        .on_start(record("start"))
        .on_finalize(record("finalize"))
        .declare();
    let book = builder
        .tag("book")
        .mandatory_attribute("isbn")
        .default_attribute("format", "paperback")
        .optional_attribute("year")
        .child(title, true)
        .child(author, false)
        .on_start(record("start"))
        .on_finalize(record("finalize"))
        .declare();
    let shelf = builder
        .tag("shelf")
        .child(book, false)
        .on_start(record("start"))
        .on_finalize(record("finalize"))
        .declare();
    let root = builder
        .tag("#document")
        .child(shelf, true)
        .on_start(record("start"))
        .on_finalize(record("finalize"))
        .declare();

    Catalogue {
        schema: builder.build(),
        root,
    }
}
