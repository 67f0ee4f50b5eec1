//! Package manifest schema.
//!
//! A manifest describes one package of native extension modules:
//!
//! ```xml
//! <package name="geometry" version="2.1">
//!   <author name="Ada" email="ada@example.org"/>
//!   <description short="Shapes">Long description of the package.</description>
//!   <site url="https://example.org/geometry"/>
//!   <module name="shapes" language="c">
//!     <compilation>
//!       <include><directory path="include"/></include>
//!       <libraries><directory path="/opt/lib"/><library name="m"/></libraries>
//!       <macros><define name="NDEBUG"/><undefine name="TRACE"/></macros>
//!       <compile><argument arg="-O2"/></compile>
//!       <link><argument arg="-s"/></link>
//!     </compilation>
//!     <sources><file name="src/*.c"/></sources>
//!   </module>
//! </package>
//! ```
//!
//! The schema is declared once per process. Finalize hooks fill a
//! [`PackageDescriptor`]; `file` names are glob patterns expanded against the
//! manifest's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;

use crate::error::{ManifestError, Result, TagError};
use crate::parser::{ParseOptions, Parser};
use crate::schema::{Schema, SchemaBuilder, TagHandler, TagId};
use crate::sources::SourceMatcher;
use crate::tree::{NodeRef, Tree};

/// Build description of a package, filled while its manifest is parsed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    pub author: Author,
    pub description: Description,
    pub site: Option<String>,
    pub modules: Vec<ModuleDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Description {
    pub short: String,
    /// Text content of the `description` element, trimmed
    pub long: String,
}

/// One native extension module of a package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub language: Option<String>,
    pub compile_args: Vec<String>,
    pub include_dirs: Vec<String>,
    pub library_dirs: Vec<String>,
    pub libraries: Vec<String>,
    pub link_args: Vec<String>,
    pub define_macros: Vec<MacroDefinition>,
    pub undef_macros: Vec<String>,
    pub sources: Vec<PathBuf>,
}

impl ModuleDescriptor {
    /// A fresh module; `MODULENAME` is always defined to the module name
    pub fn new(name: impl Into<String>, language: Option<String>) -> Self {
        let name = name.into();
        Self {
            define_macros: vec![MacroDefinition {
                name: "MODULENAME".to_string(),
                value: Some(name.clone()),
            }],
            name,
            language,
            ..Default::default()
        }
    }

    fn add_source(&mut self, source: PathBuf) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDefinition {
    pub name: String,
    pub value: Option<String>,
}

/// Parse context of the manifest schema
#[derive(Debug)]
pub struct ManifestContext {
    package: PackageDescriptor,
    module_names: HashSet<String>,
    /// Index into `package.modules` of the module being parsed
    current_module: Option<usize>,
    sources: SourceMatcher,
}

impl ManifestContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            package: PackageDescriptor::default(),
            module_names: HashSet::new(),
            current_module: None,
            sources: SourceMatcher::new(base_dir),
        }
    }

    pub fn package(&self) -> &PackageDescriptor {
        &self.package
    }

    pub fn into_package(self) -> PackageDescriptor {
        self.package
    }

    fn begin_module(
        &mut self,
        name: &str,
        language: Option<&str>,
    ) -> std::result::Result<(), ManifestError> {
        if !self.module_names.insert(name.to_string()) {
            return Err(ManifestError::DuplicateModule {
                name: name.to_string(),
            });
        }
        debug!(module = name, "module started");
        self.current_module = Some(self.package.modules.len());
        self.package
            .modules
            .push(ModuleDescriptor::new(name, language.map(str::to_string)));
        Ok(())
    }

    fn end_module(&mut self) {
        self.current_module = None;
    }

    fn module_for(&mut self, node: NodeRef<'_>) -> Result<&mut ModuleDescriptor> {
        self.current_module
            .and_then(|index| self.package.modules.get_mut(index))
            .ok_or_else(|| {
                ManifestError::OutsideModule {
                    element: node.element_name().to_string(),
                }
                .into()
            })
    }
}

/// The manifest schema and its document root tag
#[derive(Debug)]
pub struct ManifestSchema {
    pub schema: Schema<ManifestContext>,
    pub root: TagId,
}

/// The manifest schema, declared on first use
pub fn manifest_schema() -> &'static ManifestSchema {
    static SCHEMA: OnceLock<ManifestSchema> = OnceLock::new();
    SCHEMA.get_or_init(declare_manifest_schema)
}

struct ModuleHooks;

impl TagHandler<ManifestContext> for ModuleHooks {
    fn start(&self, node: NodeRef<'_>, context: &mut ManifestContext) -> anyhow::Result<()> {
        let name = node.require("name")?;
        let language = node.attribute("language")?;
        context
            .begin_module(name, language)
            .map_err(TagError::from)?;
        Ok(())
    }

    fn finalize(&self, _node: NodeRef<'_>, context: &mut ManifestContext) -> anyhow::Result<()> {
        context.end_module();
        Ok(())
    }
}

/// Declare a leaf tag whose single mandatory attribute is appended to a module list
fn module_list_entry(
    builder: &mut SchemaBuilder<ManifestContext>,
    element_name: &str,
    attribute: &'static str,
    list: fn(&mut ModuleDescriptor) -> &mut Vec<String>,
) -> TagId {
    builder
        .tag(element_name)
        .mandatory_attribute(attribute)
        .on_finalize(move |node, context: &mut ManifestContext| {
            let value = node.require(attribute)?.to_string();
            list(context.module_for(node)?).push(value);
            Ok(())
        })
        .declare()
}

fn declare_manifest_schema() -> ManifestSchema {
    let mut builder = SchemaBuilder::<ManifestContext>::new();

    let author = builder
        .tag("author")
        .unique()
        .mandatory_attribute("name")
        .mandatory_attribute("email")
        .on_finalize(|node, context: &mut ManifestContext| {
            context.package.author = Author {
                name: node.require("name")?.to_string(),
                email: node.require("email")?.to_string(),
            };
            Ok(())
        })
        .declare();

    let compile_argument = module_list_entry(&mut builder, "argument", "arg", |m| {
        &mut m.compile_args
    });
    let compile = builder
        .tag("compile")
        .unique()
        .child(compile_argument, true)
        .declare();

    let include_dir = module_list_entry(&mut builder, "directory", "path", |m| {
        &mut m.include_dirs
    });
    let include = builder
        .tag("include")
        .unique()
        .child(include_dir, true)
        .declare();

    let library_dir = module_list_entry(&mut builder, "directory", "path", |m| {
        &mut m.library_dirs
    });
    let library = module_list_entry(&mut builder, "library", "name", |m| {
        &mut m.libraries
    });
    let libraries = builder
        .tag("libraries")
        .unique()
        .child(library_dir, false)
        .child(library, true)
        .declare();

    let link_argument = module_list_entry(&mut builder, "argument", "arg", |m| {
        &mut m.link_args
    });
    let link = builder
        .tag("link")
        .unique()
        .child(link_argument, true)
        .declare();

    let define = builder
        .tag("define")
        .mandatory_attribute("name")
        .optional_attribute("value")
        .on_finalize(|node, context: &mut ManifestContext| {
            let definition = MacroDefinition {
                name: node.require("name")?.to_string(),
                value: node.attribute("value")?.map(str::to_string),
            };
            context.module_for(node)?.define_macros.push(definition);
            Ok(())
        })
        .declare();
    let undefine = module_list_entry(&mut builder, "undefine", "name", |m| {
        &mut m.undef_macros
    });
    let macros = builder
        .tag("macros")
        .unique()
        .child(define, false)
        .child(undefine, false)
        .declare();

    let compilation = builder
        .tag("compilation")
        .unique()
        .child(include, false)
        .child(libraries, false)
        .child(macros, false)
        .child(compile, false)
        .child(link, false)
        .declare();

    let description = builder
        .tag("description")
        .unique()
        .mandatory_attribute("short")
        .on_finalize(|node, context: &mut ManifestContext| {
            context.package.description = Description {
                short: node.require("short")?.to_string(),
                long: node.text().trim().to_string(),
            };
            Ok(())
        })
        .declare();

    let site = builder
        .tag("site")
        .unique()
        .mandatory_attribute("url")
        .on_finalize(|node, context: &mut ManifestContext| {
            context.package.site = Some(node.require("url")?.to_string());
            Ok(())
        })
        .declare();

    let file = builder
        .tag("file")
        .mandatory_attribute("name")
        .on_finalize(|node, context: &mut ManifestContext| {
            let pattern = node.require("name")?;
            let matches = context.sources.expand(pattern).map_err(TagError::from)?;
            let module = context.module_for(node)?;
            for source in matches {
                module.add_source(source);
            }
            Ok(())
        })
        .declare();
    let sources = builder.tag("sources").unique().child(file, true).declare();

    let module = builder
        .tag("module")
        .mandatory_attribute("name")
        .optional_attribute("language")
        .child(compilation, false)
        .child(sources, false)
        .handler(ModuleHooks)
        .declare();

    let package = builder
        .tag("package")
        .mandatory_attribute("name")
        .default_attribute("version", "1.0")
        .child(author, true)
        .child(description, true)
        .child(module, true)
        .child(site, false)
        .on_finalize(|node, context: &mut ManifestContext| {
            context.package.name = node.require("name")?.to_string();
            context.package.version = node.require("version")?.to_string();
            Ok(())
        })
        .declare();

    let root = builder.tag("#document").child(package, true).declare();

    ManifestSchema {
        schema: builder.build(),
        root,
    }
}

/// A parsed manifest: the filled descriptor and the validated tree it came from
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: PackageDescriptor,
    pub tree: Tree,
    /// Directory the module source paths are relative to
    pub base_dir: PathBuf,
}

/// Read a manifest file; source patterns resolve against its directory.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    read_manifest_with(path, ParseOptions::default())
}

pub fn read_manifest_with(path: &Path, options: ParseOptions) -> Result<Manifest> {
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let manifest = manifest_schema();
    let mut context = ManifestContext::new(base_dir.clone());

    let tree = Parser::new(&manifest.schema)
        .with_options(options)
        .parse_file(path, manifest.root, &mut context)?;

    Ok(Manifest {
        package: context.into_package(),
        tree,
        base_dir,
    })
}

/// Read manifest markup held in memory; source patterns resolve against `base_dir`.
pub fn read_manifest_str(content: &str, base_dir: &Path) -> Result<Manifest> {
    let manifest = manifest_schema();
    let mut context = ManifestContext::new(base_dir);

    let tree = Parser::new(&manifest.schema).parse_str(content, manifest.root, &mut context)?;

    Ok(Manifest {
        package: context.into_package(),
        tree,
        base_dir: base_dir.to_path_buf(),
    })
}
