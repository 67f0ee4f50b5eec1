//! Output formatting for parsed manifests.

use atty;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::manifest::{Manifest, ModuleDescriptor, PackageDescriptor};
use crate::tree::NodeRef;

/// Formatter for parsed manifests
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render a manifest in the requested format
    pub fn render(&self, manifest: &Manifest, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Human => {
                let mut output = self.format_package(&manifest.package);
                if self.verbosity == VerbosityLevel::Debug {
                    output.push_str(&format!(
                        "\nDebug Information:\n  Nodes: {}\n",
                        manifest.tree.len()
                    ));
                }
                Ok(output)
            }
            OutputFormat::Json => self.format_json(&manifest.package),
            OutputFormat::Tree => self.format_tree(manifest.tree.root()),
        }
    }

    pub fn format_json(&self, package: &PackageDescriptor) -> serde_json::Result<String> {
        serde_json::to_string_pretty(package)
    }

    pub fn format_tree(&self, node: NodeRef<'_>) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&node)
    }

    pub fn format_package(&self, package: &PackageDescriptor) -> String {
        if self.verbosity == VerbosityLevel::Quiet {
            return String::new();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{} {} version {}\n",
            self.colorize("Package:", "1"),
            package.name,
            package.version
        ));
        output.push_str(&format!(
            "  Author:       {} <{}>\n",
            package.author.name, package.author.email
        ));
        output.push_str(&format!("  Description:  {}\n", package.description.short));
        if let Some(site) = &package.site {
            output.push_str(&format!("  Site:         {}\n", site));
        }
        if self.verbosity >= VerbosityLevel::Verbose && !package.description.long.is_empty() {
            output.push('\n');
            for line in package.description.long.lines() {
                output.push_str(&format!("  {}\n", line.trim()));
            }
        }

        output.push_str(&format!(
            "\n{} {}\n",
            self.colorize("Modules:", "1"),
            package.modules.len()
        ));
        for module in &package.modules {
            output.push_str(&self.format_module(module));
        }

        output
    }

    pub fn format_module(&self, module: &ModuleDescriptor) -> String {
        let sources = module.sources.len();
        let mut output = format!(
            "  {} ({}) - {} source file{}\n",
            self.colorize(&module.name, "32"),
            module.language.as_deref().unwrap_or("any language"),
            sources,
            if sources == 1 { "" } else { "s" }
        );

        if self.verbosity >= VerbosityLevel::Verbose {
            let defines: Vec<String> = module
                .define_macros
                .iter()
                .map(|define| match &define.value {
                    Some(value) => format!("{}={}", define.name, value),
                    None => define.name.clone(),
                })
                .collect();
            let sources: Vec<String> = module
                .sources
                .iter()
                .map(|source| source.display().to_string())
                .collect();

            for (label, values) in [
                ("Compile args", &module.compile_args),
                ("Include dirs", &module.include_dirs),
                ("Library dirs", &module.library_dirs),
                ("Libraries", &module.libraries),
                ("Link args", &module.link_args),
                ("Defines", &defines),
                ("Undefines", &module.undef_macros),
                ("Sources", &sources),
            ] {
                if !values.is_empty() {
                    output.push_str(&format!(
                        "    {:<13} {}\n",
                        format!("{}:", label),
                        values.join(" ")
                    ));
                }
            }
        }

        output
    }
}
