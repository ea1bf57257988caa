use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use schemaform_engine::{
    FileSchemaSource, FormDataStore, FormExport, FormSession, ImportStrategy, LoadOutcome, RenderOptions, SAMPLE_WORKFLOW, SchemaLoader,
    default_tree,
};
use schemaform_util::{FormsConfig, UnionStyle};
use serde_json::Value;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let mut config = FormsConfig::load().context("load config")?;
    if matches.get_flag("no-persist") {
        config.persist = false;
    }
    if let Some(style) = matches.get_one::<String>("union-style") {
        config.union_style = if style == "cards" { UnionStyle::Cards } else { UnionStyle::Dropdown };
    }

    match matches.subcommand() {
        Some(("workflows", sub)) => list_workflows(&config, sub).await,
        Some(("render", sub)) => render_form(&config, sub).await,
        Some(("defaults", sub)) => print_defaults(&config, sub).await,
        Some(("validate", sub)) => validate_data(&config, sub).await,
        Some(("export", sub)) => export_form(&config, sub).await,
        Some(("import", sub)) => import_form(&config, sub).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let workflow = Arg::new("workflow")
        .action(ArgAction::Set)
        .default_value(SAMPLE_WORKFLOW)
        .help("Workflow whose schema drives the form");
    let schema_file = Arg::new("schema-file")
        .long("schema-file")
        .short('s')
        .action(ArgAction::Set)
        .help("Read the schema from a JSON or YAML file instead of the API");
    let data = Arg::new("data")
        .long("data")
        .short('d')
        .action(ArgAction::Set)
        .help("JSON file with form data to load first");
    let output = Arg::new("output")
        .long("output")
        .short('o')
        .action(ArgAction::Set)
        .help("Write to this file instead of stdout");

    Command::new("schemaform")
        .about("Render and manage schema-driven forms")
        .arg(
            Arg::new("no-persist")
                .long("no-persist")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Do not read or write saved form data"),
        )
        .arg(
            Arg::new("union-style")
                .long("union-style")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(["dropdown", "cards"])
                .help("How union alternatives are presented"),
        )
        .subcommand(Command::new("workflows").about("List workflows the backend serves").arg(schema_file.clone()))
        .subcommand(
            Command::new("render")
                .about("Render a form as HTML")
                .arg(workflow.clone())
                .arg(schema_file.clone())
                .arg(data.clone())
                .arg(output.clone()),
        )
        .subcommand(
            Command::new("defaults")
                .about("Print the data an untouched form collects")
                .arg(workflow.clone())
                .arg(schema_file.clone()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check form data against the schema's constraints")
                .arg(workflow.clone())
                .arg(schema_file.clone())
                .arg(data.required(true)),
        )
        .subcommand(
            Command::new("export")
                .about("Export saved form data")
                .arg(workflow.clone())
                .arg(schema_file.clone())
                .arg(output),
        )
        .subcommand(
            Command::new("import")
                .about("Import form data into the saved store")
                .arg(workflow)
                .arg(schema_file)
                .arg(
                    Arg::new("file")
                        .long("file")
                        .short('f')
                        .required(true)
                        .action(ArgAction::Set)
                        .help("Export file or plain JSON data"),
                )
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .action(ArgAction::Set)
                        .value_parser(["replace", "merge"])
                        .default_value("replace"),
                ),
        )
}

/// Session reading schemas from `--schema-file` when given, else from the API.
fn build_session(config: &FormsConfig, matches: &ArgMatches) -> Result<FormSession> {
    let Some(path) = matches.get_one::<String>("schema-file") else {
        return FormSession::from_config(config);
    };
    let loader = SchemaLoader::new(Box::new(FileSchemaSource::new(path)), config.fetch_timeout());
    Ok(FormSession::new(loader, FormDataStore::from_config(config), RenderOptions::from(config)))
}

/// Builds the session and opens the form for the `workflow` argument.
async fn open_form(config: &FormsConfig, matches: &ArgMatches) -> Result<(FormSession, String)> {
    let workflow = matches
        .get_one::<String>("workflow")
        .cloned()
        .unwrap_or_else(|| SAMPLE_WORKFLOW.to_string());
    let mut session = build_session(config, matches)?;
    let outcome = session.open(&workflow).await?;
    match &outcome {
        LoadOutcome::Unavailable { reason } => bail!("schema for '{}' is unavailable: {}", workflow, reason),
        LoadOutcome::Fallback { reason, .. } => warn!(workflow = %workflow, reason = %reason, "showing the bundled sample form"),
        LoadOutcome::Cached(_) | LoadOutcome::Fetched(_) => {}
    }
    Ok((session, workflow))
}

async fn list_workflows(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    let session = build_session(config, matches)?;
    let workflows = session.workflows().await;
    if workflows.is_empty() {
        println!("No workflows available");
    }
    for workflow in workflows {
        println!("{}", workflow);
    }
    Ok(())
}

async fn render_form(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    let data = matches.get_one::<String>("data");
    let (mut session, workflow) = open_form(&transient(config, data.is_some()), matches).await?;
    if let Some(path) = data {
        session.import_data(&workflow, &read_json(path)?, ImportStrategy::Replace)?;
    }
    let html = session.render(&workflow)?.to_html();
    write_output(matches, &html)
}

async fn print_defaults(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    let (session, workflow) = open_form(config, matches).await?;
    let defaults = default_tree(&*session.document(&workflow)?)?;
    println!("{}", serde_json::to_string_pretty(&defaults.to_json())?);
    Ok(())
}

async fn validate_data(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    let (mut session, workflow) = open_form(&transient(config, true), matches).await?;
    let path = matches.get_one::<String>("data").context("--data is required")?;
    session.import_data(&workflow, &read_json(path)?, ImportStrategy::Replace)?;

    let violations = session.validate(&workflow)?;
    if violations.is_empty() {
        println!("valid");
        return Ok(());
    }
    for violation in &violations {
        println!("{} ({}): {}", violation.label, violation.path, violation.message);
    }
    bail!("{} constraint violation(s)", violations.len())
}

async fn export_form(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    let (session, workflow) = open_form(config, matches).await?;
    let export = session.export(&workflow)?;
    write_output(matches, &serde_json::to_string_pretty(&export)?)
}

async fn import_form(config: &FormsConfig, matches: &ArgMatches) -> Result<()> {
    if !config.persist {
        bail!("import writes to saved form data; drop --no-persist");
    }
    let (mut session, workflow) = open_form(config, matches).await?;
    let path = matches.get_one::<String>("file").context("--file is required")?;
    let strategy = matches
        .get_one::<String>("strategy")
        .map(|raw| raw.parse::<ImportStrategy>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    let raw = read_json(path)?;
    match serde_json::from_value::<FormExport>(raw.clone()) {
        Ok(export) => session.import(&workflow, &export, strategy)?,
        Err(_) => session.import_data(&workflow, &raw, strategy)?,
    }
    println!("imported {} into '{}'", path, workflow);
    Ok(())
}

/// `config` without persistence when `transient`, so loaded files never
/// overwrite saved form data.
fn transient(config: &FormsConfig, transient: bool) -> FormsConfig {
    FormsConfig {
        persist: config.persist && !transient,
        ..config.clone()
    }
}

fn read_json(path: &str) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse JSON in {}", path))
}

fn write_output(matches: &ArgMatches, content: &str) -> Result<()> {
    match matches.get_one::<String>("output") {
        Some(path) => std::fs::write(Path::new(path), content).with_context(|| format!("write {}", path)),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}
