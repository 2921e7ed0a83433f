//! Error types for adxctl
//!
//! Every failure ends the run with a cargo-style diagnostic on stderr and exit
//! status 1.

use adxctl_core::lifecycle::{Step, StepError};
use adxctl_core::{ConfigError, CoreError};
use colored::Colorize;
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: missing environment variable SUBSCRIPTION (or AZURE_SUBSCRIPTION_ID)
///
///   tip: export SUBSCRIPTION=<value>
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<String>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add a detail line below the error message.
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    pub fn tip(mut self, description: &str) -> Self {
        self.tips.push(description.to_string());
        self
    }

    /// Render without colors; used by tests and non-terminal output.
    pub fn render_plain(&self) -> String {
        let mut out = format!("error: {}\n", self.message);
        if let Some(detail) = &self.detail {
            out.push_str(&format!("  {}\n", detail));
        }
        for tip in &self.tips {
            out.push_str(&format!("\n  tip: {}\n", tip));
        }
        out
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for tip in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", tip);
        }
    }
}

/// Main error type for the adxctl binary
#[derive(Error, Debug)]
pub enum AdxCtlError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Could not set up the management client: {0}")]
    Client(#[source] CoreError),

    #[error("{0}")]
    Step(#[from] StepError),
}

pub type Result<T> = std::result::Result<T, AdxCtlError>;

impl AdxCtlError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            AdxCtlError::Config(ConfigError::MissingVar { name, .. }) => vec![
                format!("export {}=<value>", name),
                "Run 'adxctl --help' for the list of required variables".to_string(),
            ],
            AdxCtlError::Config(ConfigError::InvalidValue { name, .. }) => {
                vec![format!("Check the value of {}", name)]
            }
            AdxCtlError::Config(ConfigError::NoCredential { .. }) => vec![
                "Get a token with: az account get-access-token --query accessToken -o tsv"
                    .to_string(),
            ],
            AdxCtlError::Client(_) => vec![
                "Check AZURE_RESOURCE_MANAGER_ENDPOINT if it is set".to_string(),
            ],
            AdxCtlError::Step(err) => step_suggestions(err),
        }
    }

    /// Extra context printed under the message
    pub fn detail(&self) -> Option<String> {
        match self {
            AdxCtlError::Step(err) if err.step != Step::CreateCluster => Some(
                "Resources created earlier in this run were not removed.".to_string(),
            ),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> CliDiagnostic {
        let mut diag = CliDiagnostic::error(&self.to_string());
        if let Some(detail) = self.detail() {
            diag = diag.detail(&detail);
        }
        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion);
        }
        diag
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        self.diagnostic().print();
    }
}

fn step_suggestions(err: &StepError) -> Vec<String> {
    let source = &err.source;
    if source.is_unauthorized() {
        vec![
            "Check that the token is valid and not expired".to_string(),
            "Verify the identity has Contributor access to the resource group".to_string(),
        ]
    } else if source.is_timeout() {
        vec!["Raise the wait budget with --poll-timeout".to_string()]
    } else if source.is_conflict() && err.step == Step::CreateCluster {
        vec!["Cluster names are global; try a different CLUSTER_NAME_PREFIX".to_string()]
    } else if source.is_not_found() {
        vec!["Verify SUBSCRIPTION and RESOURCE_GROUP refer to existing resources".to_string()]
    } else if source.is_retryable() {
        vec!["Transient failure; retry polls with --retry-attempts".to_string()]
    } else {
        vec![]
    }
}
