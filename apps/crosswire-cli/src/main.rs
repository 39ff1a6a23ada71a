#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `crosswire` command-line front-end for the `crosswire_policy` resource.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use policy::domain::{self, PolicyResource};
use policy::{
    CrosswireConfig, CrosswireProvider, HttpPolicyClient, PolicyResourceModel, ProviderSettings,
};
use policy_sdk::{Diagnostics, PolicyApiClient};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

/// Manage Crosswire access policies from declarative resource files.
#[derive(Parser, Debug)]
#[command(name = "crosswire", version, about)]
struct Cli {
    /// API endpoint; falls back to `CROSSWIRE_API_HOST`, then the public service.
    #[arg(long, global = true)]
    host: Option<String>,

    /// API token; falls back to `CROSSWIRE_API_TOKEN`.
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the API token is accepted by the service.
    ValidateCredentials,

    /// Validate a resource file without contacting the service.
    Check {
        /// Resource file (`.yaml`, `.yml` or `.json`).
        file: PathBuf,
    },

    /// Create the policy described by a resource file and print its state.
    Create { file: PathBuf },

    /// Print the current state of a policy.
    Read {
        /// Policy id.
        id: String,
    },

    /// Import an existing policy by id and print its state.
    Import { id: String },

    /// Update a policy (not supported by the service).
    Update { file: PathBuf },

    /// Delete a policy (not supported by the service).
    Delete { file: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run one command; `Ok(false)` means it finished with error findings.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Command::ValidateCredentials => {
            let config = CrosswireConfig::resolve(&cli.settings())?;
            let success = HttpPolicyClient::new(&config).validate_credentials()?;
            println!("{}", serde_json::json!({ "success": success }));
            Ok(success)
        }
        Command::Check { file } => {
            let model = load_model(file)?;
            Ok(report(&domain::validate_config(&model)))
        }
        Command::Create { file } => {
            let model = load_model(file)?;
            let resource = configure(cli)?;
            let diags = resource.validate_config(&model);
            if !report(&diags) {
                return Ok(false);
            }
            match resource.create(&model) {
                Ok(state) => print_state(Some(&state)),
                Err(diags) => Ok(report(&diags)),
            }
        }
        Command::Read { id } => {
            let state = PolicyResourceModel {
                id: Some(id.clone()),
                ..PolicyResourceModel::default()
            };
            match configure(cli)?.read(&state) {
                Ok(state) => print_state(state.as_ref()),
                Err(diags) => Ok(report(&diags)),
            }
        }
        Command::Import { id } => match configure(cli)?.import_state(id) {
            Ok(state) => print_state(state.as_ref()),
            Err(diags) => Ok(report(&diags)),
        },
        Command::Update { file } => {
            let model = load_model(file)?;
            Ok(report(&configure(cli)?.update(&model)))
        }
        Command::Delete { file } => {
            let model = load_model(file)?;
            Ok(report(&configure(cli)?.delete(&model)))
        }
    }
}

impl Cli {
    fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            host: self.host.clone(),
            api_token: self
                .api_token
                .as_ref()
                .map(|token| SecretString::from(token.clone())),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn configure(cli: &Cli) -> Result<PolicyResource> {
    CrosswireProvider::new(env!("CARGO_PKG_VERSION"))
        .configure(&cli.settings())
        .map_err(|diags| {
            report(&diags);
            anyhow::anyhow!("provider configuration failed")
        })
}

/// Read a resource file; `.yaml`/`.yml` are YAML, anything else JSON.
fn load_model(path: &Path) -> Result<PolicyResourceModel> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_saphyr::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Print findings to stderr; returns `true` when none of them is an error.
fn report(diags: &Diagnostics) -> bool {
    for diagnostic in diags {
        eprintln!("{diagnostic}");
    }
    !diags.has_error()
}

fn print_state(state: Option<&PolicyResourceModel>) -> Result<bool> {
    if let Some(state) = state {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        eprintln!("policy not found");
    }
    Ok(true)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_map_to_settings() {
        let cli = Cli::parse_from([
            "crosswire",
            "check",
            "policy.yaml",
            "--host",
            "https://example.com",
            "--timeout-secs",
            "5",
        ]);
        let settings = cli.settings();
        assert_eq!(settings.host.as_deref(), Some("https://example.com"));
        assert!(settings.api_token.is_none());
        assert_eq!(settings.timeout_secs, Some(5));
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn loads_yaml_and_json_resource_files() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("policy.yaml");
        let mut yaml = fs::File::create(&yaml_path).unwrap();
        writeln!(
            yaml,
            "owner:\n  email_address: user@company.com\nname: admins\nentitlements:\n  - provider: CROSSWIRE\n    subject: CREATE\n    object: ENTITLEMENT\ncondition:\n  quantifier: ANY\nspecial_approver: SELF"
        )
        .unwrap();
        let model = load_model(&yaml_path).unwrap();
        assert_eq!(model.name, "admins");
        assert_eq!(model.special_approver.as_deref(), Some("SELF"));
        assert!(domain::validate_config(&model).is_empty());

        let json_path = dir.path().join("policy.json");
        fs::write(
            &json_path,
            r#"{"owner": {"email_address": "user@company.com"}, "name": "admins",
                "entitlements": [], "condition": {"quantifier": "ALL"}}"#,
        )
        .unwrap();
        let model = load_model(&json_path).unwrap();
        assert_eq!(domain::validate_config(&model).errors().count(), 2);
    }
}
