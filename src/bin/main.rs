use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Error};
use openapi_diff::{DiffOptions, Mode, SeverityRules};
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Strict,
    Lenient,
}

impl Preset {
    fn rules(self) -> SeverityRules {
        match self {
            Self::Default => SeverityRules::default(),
            Self::Strict => SeverityRules::strict(),
            Self::Lenient => SeverityRules::lenient(),
        }
    }
}

/// Compare an old and a new OpenAPI document, and print the differences
#[derive(Parser)]
#[clap(about, version)]
struct Args {
    /// The old document (JSON or YAML)
    #[arg(required_unless_present = "rules_schema")]
    lhs: Option<PathBuf>,
    /// The new document (JSON or YAML)
    #[arg(required_unless_present = "rules_schema")]
    rhs: Option<PathBuf>,
    /// Only list differences, without classifying them
    #[arg(long)]
    plain: bool,
    /// Built-in severity rules to start from
    #[arg(long, value_enum, default_value = "default")]
    preset: Preset,
    /// Severity rules (JSON or YAML) applied on top of the preset
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Print one JSON object per change instead of text
    #[arg(long)]
    json: bool,
    /// Exit with status 1 if any change is breaking
    #[arg(long)]
    fail_on_breaking: bool,
    /// Print the JSON schema of the severity rules file and exit
    #[arg(long)]
    rules_schema: bool,
}

/// JSON if the extension says so, YAML otherwise. YAML is a superset of JSON anyway.
fn read<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = if path.extension().map_or(false, |ext| ext == "json") {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    Ok(value)
}

fn main() -> Result<ExitCode, Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.rules_schema {
        let schema = schemars::schema_for!(SeverityRules);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(ExitCode::SUCCESS);
    }

    let (Some(lhs_path), Some(rhs_path)) = (args.lhs, args.rhs) else {
        anyhow::bail!("both documents are required");
    };

    let mut rules = args.preset.rules();
    if let Some(path) = &args.rules {
        let overrides: SeverityRules = read(path)?;
        rules.merge(&overrides);
    }
    rules.validate()?;

    let lhs: serde_json::Value = read(&lhs_path)?;
    let rhs: serde_json::Value = read(&rhs_path)?;
    debug!(lhs = %lhs_path.display(), rhs = %rhs_path.display(), "documents loaded");

    let mode = if args.plain {
        Mode::Plain
    } else {
        Mode::Classifying
    };
    let options = DiffOptions::new().mode(mode).rules(&rules);
    let result = openapi_diff::diff_with(&lhs, &rhs, &options)?;

    if args.json {
        for change in result.changes() {
            println!("{}", serde_json::to_string(change)?);
        }
    } else {
        print!("{}", result.render());
        if mode == Mode::Classifying {
            println!("{}", result.summary());
        }
    }

    if args.fail_on_breaking && result.has_breaking() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
