use agriboundary_core::error::{BoundaryError, Stage};
use console::style;
use std::fmt;

/// Enhanced error type with suggestions
pub struct CliError {
    pub message: String,
    pub stage: Option<Stage>,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(stage) = self.stage {
            eprintln!("{} {}", style("Failed during:").dim(), stage);
            eprintln!();
        }

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Error for a run that cannot authenticate
pub fn missing_credentials() -> CliError {
    CliError::new("No credentials for the compute service")
        .with_stage(Stage::Authentication)
        .with_context("A catalog URL was given but no service credential was found.")
        .with_suggestion("Pass --credentials key.json")
        .with_suggestion("Or set AGRIBOUNDARY_ACCESS_TOKEN")
        .with_suggestion("Or set AGRIBOUNDARY_PROJECT_ID and AGRIBOUNDARY_PRIVATE_KEY")
        .with_help("Run: agriboundary detect --help")
}

/// Error for a detect run with nowhere to get imagery from
pub fn no_catalog() -> CliError {
    CliError::new("No imagery source configured")
        .with_stage(Stage::Configuration)
        .with_suggestion("Pass --catalog https://compute.example.org")
        .with_suggestion("Or set catalog_url in agriboundary.toml")
        .with_suggestion("Or composite local scenes with --scenes manifest.json")
        .with_help("Run: agriboundary detect --help")
}

/// Pipeline error with its stage and remediation
pub fn from_boundary(error: &BoundaryError) -> CliError {
    let mut cli_error = CliError::new(error.to_string())
        .with_stage(error.stage())
        .with_suggestion(error.remediation());

    if error.is_fatal() {
        cli_error = cli_error.with_context("Nothing was processed: the session could not be started.");
    }

    match error {
        BoundaryError::GeometryParse { .. } | BoundaryError::UnsupportedFormat { .. } => {
            cli_error.with_help("Run: agriboundary aoi <FILE>")
        }
        BoundaryError::ConfigInvalid { .. } => cli_error.with_help("Run: agriboundary config"),
        _ => cli_error.with_help("Run: agriboundary detect --help"),
    }
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<CliError>() {
        Ok(cli_error) => return cli_error,
        Err(error) => error,
    };

    if let Some(boundary) = error.chain().find_map(|e| e.downcast_ref::<BoundaryError>()) {
        let mut cli_error = from_boundary(boundary);
        let outer = error.to_string();
        if outer != boundary.to_string() {
            cli_error = cli_error.with_context(outer);
        }
        return cli_error;
    }

    let message = error.to_string();
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check the file path and try again")
    } else if message.contains("permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check file permissions")
    } else {
        CliError::new(message)
    }
}
