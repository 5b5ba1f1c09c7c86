use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vretool_engine::{
    App, CatalogStager, JsonApp, LaunchOutcome, LocalExecutor, PublishedOutput, RequireConfirmedOutputs, ToolConfig, TracingMiddleware,
};
use vretool_tools::{NUMBER_FILE, PLAIN_TEXT, SumWorkflow, find_tool, tool_names};
use vretool_types::{Metadata, OneOrMany, OutputRoleMap};
use vretool_util::{Catalog, JsonCatalogStore, NewCatalogFile, catalog_user, expand_tilde};

fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run_documents(sub),
        Some(("demo", sub)) => run_demo(sub),
        Some(("tools", _)) => {
            for name in tool_names() {
                println!("{name}");
            }
            Ok(())
        }
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(log_filter()).try_init();
}

/// Filter from `RUST_LOG`, defaulting to `info`.
fn log_filter() -> EnvFilter {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    EnvFilter::new(directives)
}

fn build_cli() -> Command {
    Command::new("vretool")
        .about("Run VRE tools and workflows")
        .subcommand(
            Command::new("run")
                .about("Run a tool from config and input metadata documents")
                .arg(Arg::new("tool").long("tool").short('t').required(true).action(ArgAction::Set).help("Registered tool name"))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .action(ArgAction::Set)
                        .default_value("config.json")
                        .help("Path to config.json (or YAML)"),
                )
                .arg(
                    Arg::new("metadata")
                        .long("metadata")
                        .short('m')
                        .action(ArgAction::Set)
                        .default_value("input_metadata.json")
                        .help("Path to input_metadata.json"),
                )
                .arg(
                    Arg::new("results")
                        .long("results")
                        .short('r')
                        .action(ArgAction::Set)
                        .default_value("results.json")
                        .help("Where to write results.json"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Sum two incremented numbers through the file catalog")
                .arg(Arg::new("dir").long("dir").short('d').required(true).action(ArgAction::Set).help("Scratch directory for the demo files"))
                .arg(Arg::new("catalog").long("catalog").action(ArgAction::Set).help("Catalog file; defaults to VRETOOL_CATALOG_PATH")),
        )
        .subcommand(Command::new("tools").about("List registered tools"))
}

fn path_arg(matches: &ArgMatches, name: &str) -> Option<PathBuf> {
    matches.get_one::<String>(name).map(|value| expand_tilde(value))
}

fn run_documents(matches: &ArgMatches) -> Result<()> {
    let tool = matches.get_one::<String>("tool").context("--tool is required")?;
    let factory = find_tool(tool).with_context(|| format!("unknown tool '{tool}'; see `vretool tools`"))?;
    let config = path_arg(matches, "config").context("--config is required")?;
    let metadata = path_arg(matches, "metadata").context("--metadata is required")?;
    let results = path_arg(matches, "results").context("--results is required")?;

    let outcome = JsonApp::new().launch(factory, &config, &metadata, &results)?;
    print_outcome(&outcome)
}

fn run_demo(matches: &ArgMatches) -> Result<()> {
    let dir = path_arg(matches, "dir").context("--dir is required")?;
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let store = JsonCatalogStore::new(path_arg(matches, "catalog"))?;
    info!(catalog = %store.path().display(), "using catalog");
    let catalog: Arc<dyn Catalog> = Arc::new(store);
    let user = catalog_user();

    let mut input_ids = IndexMap::new();
    for (role, value) in [("input1", 5), ("input2", 9)] {
        let path = dir.join(format!("{role}.txt"));
        fs::write(&path, value.to_string()).with_context(|| format!("Failed to write {}", path.display()))?;
        let metadata = Metadata::new(NUMBER_FILE, PLAIN_TEXT);
        let id = catalog.set_file(&user, NewCatalogFile::from_metadata(&path, &metadata, &[]))?;
        input_ids.insert(role.to_string(), OneOrMany::One(id));
    }

    let outputs = OutputRoleMap::new().with("output", dir.join("sum.txt"), Metadata::new(NUMBER_FILE, PLAIN_TEXT));
    let mut app = App::new(CatalogStager::new(catalog, user), Arc::new(LocalExecutor))
        .with_middleware(TracingMiddleware)
        .with_middleware(RequireConfirmedOutputs);
    let outcome = app.launch(SumWorkflow::factory, &input_ids, outputs, ToolConfig::new())?;
    print_outcome(&outcome)
}

fn print_outcome(outcome: &LaunchOutcome) -> Result<()> {
    let published = |items: &[PublishedOutput]| -> Vec<serde_json::Value> {
        items
            .iter()
            .map(|item| serde_json::json!({"role": item.role, "path": item.path, "id": item.id}))
            .collect()
    };
    let summary = serde_json::json!({
        "outputs": published(&outcome.outputs),
        "intermediates": published(&outcome.intermediates),
        "failures": outcome.failures.len(),
        "unstage_errors": outcome.unstage_errors.iter().map(|failure| format!("{}: {:#}", failure.path.display(), failure.error)).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !outcome.is_fully_published() {
        anyhow::bail!("{} file(s) could not be published", outcome.unstage_errors.len());
    }
    Ok(())
}
