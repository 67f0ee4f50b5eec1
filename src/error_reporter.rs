use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{ManifestError, SourceError, TagError};

/// Error reporter with configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
}

impl ErrorReporter {
    /// Create a new error reporter with specified verbosity
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Report a manifest parse failure with appropriate verbosity
    pub fn report_parse_error(&self, error: &TagError) {
        eprintln!("{}", self.format_parse_error(error));
    }

    /// Report a configuration error
    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    pub fn format_parse_error(&self, error: &TagError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => self.format_error_brief(error),
            VerbosityLevel::Normal => format!("Error: {}", error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!(
                    "Configuration Error: {}\n{}",
                    error,
                    self.get_config_help(error)
                )
            }
            VerbosityLevel::Debug => {
                format!(
                    "Configuration Error: {}\nDebug: {:?}\n{}",
                    error,
                    error,
                    self.get_config_help(error)
                )
            }
        }
    }

    /// Format error for brief output (quiet mode)
    fn format_error_brief(&self, error: &TagError) -> String {
        match error {
            TagError::Source(SourceError::Syntax { position, .. }) => {
                format!("MALFORMED: byte {}", position)
            }
            TagError::Source(_) => format!("UNREADABLE: {}", error),
            _ => format!("INVALID: {}", error),
        }
    }

    /// Format error for verbose output
    fn format_error_verbose(&self, error: &TagError) -> String {
        let mut output = format!("Error: {}", error);
        if let Some(suggestion) = self.get_parse_help(error) {
            output.push_str("\nSuggestion: ");
            output.push_str(&suggestion);
        }
        output
    }

    /// Format error for debug output
    fn format_error_debug(&self, error: &TagError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    /// Helpful suggestion for a parse failure, when there is one
    fn get_parse_help(&self, error: &TagError) -> Option<String> {
        let help = match error {
            TagError::UnknownAttribute { element, .. } => {
                format!("Check the spelling; <{}> does not declare that attribute", element)
            }
            TagError::AttributeAlreadySet { .. } => {
                "Remove the repeated attribute".to_string()
            }
            TagError::MissingMandatoryAttributes { element, .. }
            | TagError::MissingMandatoryChildren { element, .. } => {
                format!("Add the missing items to <{}>", element)
            }
            TagError::DuplicateUniqueChild { child, .. } => {
                format!("Keep a single <{}> element", child)
            }
            TagError::UnexpectedElement { element, .. } => {
                format!("Move the element to a tag that allows it, or remove it from <{}>", element)
            }
            TagError::Source(SourceError::NotFound { path }) => {
                format!("Verify the manifest path is correct: {}", path.display())
            }
            TagError::Source(SourceError::Syntax { .. }) => {
                "Check the markup syntax: tags must be balanced and nested in a single root"
                    .to_string()
            }
            TagError::Manifest(ManifestError::NoMatchingSources { .. }) => {
                "Source patterns are resolved relative to the manifest directory".to_string()
            }
            TagError::Manifest(ManifestError::DuplicateModule { .. }) => {
                "Give every module a distinct name".to_string()
            }
            _ => return None,
        };
        Some(help)
    }

    /// Get helpful suggestions for configuration errors
    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::Io(_) => {
                "Check that the configuration file exists and is readable".to_string()
            }
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::UnsupportedFormat(_) => {
                "Use a .toml or .json configuration file".to_string()
            }
            ConfigError::Environment(_) => {
                "Fix or unset the TAGTREE_* environment variable".to_string()
            }
            ConfigError::Validation(_) => {
                "Resolve conflicting configuration values between file, environment, and CLI"
                    .to_string()
            }
        }
    }
}
