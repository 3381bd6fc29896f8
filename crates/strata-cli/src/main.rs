//! Strata - dependency-ordered schema revisions
//!
//! The `strata` command applies YAML revision files to a database in an order
//! consistent with their declared dependencies.
//!
//! ## Commands
//!
//! - `setup`: Create the revision tracking table
//! - `new-revision`: Scaffold a revision file
//! - `show-all-layers`: Print the dependency layers of every revision
//! - `show-revision-layers`: Print the dependency layers of one revision
//! - `apply-all`: Apply pending revisions after a single confirmation
//! - `apply-each`: Apply pending revisions, confirming each one

mod confirm;
mod render;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strata_core::apply::{
    ApplyEngine, ApplyReport, AutoApprove, ConfirmMode, Confirmer, RunContext,
};
use strata_core::graph::{compute_layers, revision_layers, RevisionGraph};
use strata_core::revision::{scaffold_revision, RevisionStore};
use strata_state::{MigrationTarget, ProfileSet, SqliteTarget, DEFAULT_ENVIRONMENT};
use tracing::{info, Level};

use crate::confirm::StdinConfirmer;
use crate::render::OutputFormat;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-ordered schema revisions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the database connection configuration
    #[arg(
        short,
        long,
        global = true,
        env = "STRATA_CONFIG",
        default_value = "db_configs.yaml"
    )]
    config: PathBuf,

    /// Directory holding revision files
    #[arg(
        short,
        long,
        global = true,
        env = "STRATA_REVISIONS",
        default_value = "./revisions"
    )]
    revisions: PathBuf,

    /// Environment in the configuration file to use
    #[arg(short, long, global = true, env = "STRATA_DB", default_value = DEFAULT_ENVIRONMENT)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the revision tracking table in the target database
    Setup,

    /// Create a new revision file with basic information
    NewRevision {
        /// Revision name (also the file name)
        name: String,

        /// Human-readable description
        #[arg(long)]
        description: Option<String>,

        /// Revisions the new one depends on
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Vec<String>,
    },

    /// Print the dependency layers for all revisions
    ShowAllLayers {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the dependency layers for one revision
    ShowRevisionLayers {
        /// Revision name
        name: String,
    },

    /// Apply all pending revisions, asking once before starting
    ApplyAll {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Apply pending revisions, asking before each one
    ApplyEach {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Where to find configuration and revisions.
struct Workspace {
    config: PathBuf,
    revisions: PathBuf,
    environment: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    strata_core::init_tracing(cli.json, level);

    let workspace = Workspace {
        config: cli.config,
        revisions: cli.revisions,
        environment: cli.db,
    };

    let result = match cli.command {
        Commands::Setup => cmd_setup(&workspace),
        Commands::NewRevision {
            name,
            description,
            depends_on,
        } => cmd_new_revision(&workspace, &name, description, depends_on),
        Commands::ShowAllLayers { format } => cmd_show_all_layers(&workspace, format),
        Commands::ShowRevisionLayers { name } => cmd_show_revision_layers(&workspace, &name),
        Commands::ApplyAll { yes, format } => {
            cmd_apply(&workspace, ConfirmMode::WholePlan, yes, format).await
        }
        Commands::ApplyEach { yes, format } => {
            cmd_apply(&workspace, ConfirmMode::EachRevision, yes, format).await
        }
    };

    match result {
        Ok(code) => render::exit_code(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            render::exit_code(render::error_exit_code(&err))
        }
    }
}

/// Resolve the selected environment and open it.
///
/// A profile with `connection_warning` set prints an advisory notice first.
fn open_target(workspace: &Workspace) -> Result<SqliteTarget> {
    let profiles = ProfileSet::load(&workspace.config)
        .with_context(|| format!("Failed to load {}", workspace.config.display()))?;
    let profile = profiles.get(&workspace.environment)?;

    if let Some(notice) = profile.warning_notice() {
        eprintln!("{notice}");
        strata_core::obs::emit_connection_warning(&profile.name, &notice);
    }

    let target = SqliteTarget::connect(profile)
        .with_context(|| format!("Failed to connect to {}", profile.display_url()))?;
    Ok(target)
}

fn load_graph(revisions: &Path) -> Result<RevisionGraph> {
    let store = RevisionStore::load_dir(revisions)
        .with_context(|| format!("Failed to load revisions from {}", revisions.display()))?;
    let graph = RevisionGraph::from_store(&store)?;
    Ok(graph)
}

fn cmd_setup(workspace: &Workspace) -> Result<u8> {
    let mut target = open_target(workspace)?;
    target.ensure_history()?;
    info!(target = %target.describe(), table = %target.history().table(), "setup complete");
    println!(
        "Tracking table {} is ready on {}",
        target.history().table(),
        target.describe()
    );
    Ok(render::EXIT_OK)
}

fn cmd_new_revision(
    workspace: &Workspace,
    name: &str,
    description: Option<String>,
    depends_on: Vec<String>,
) -> Result<u8> {
    let path = scaffold_revision(&workspace.revisions, name, depends_on, description)?;
    println!("Created {}", path.display());
    println!("Fill in sql_text before applying.");
    Ok(render::EXIT_OK)
}

fn cmd_show_all_layers(workspace: &Workspace, format: OutputFormat) -> Result<u8> {
    let graph = load_graph(&workspace.revisions)?;
    let mut target = open_target(workspace)?;
    let applied = target.applied_set()?;
    let layers = compute_layers(&graph);

    match format {
        OutputFormat::Text => print!(
            "{}",
            render::layers_text("Revision Dependency Layers", &layers, &applied)
        ),
        OutputFormat::Json => println!("{}", render::layers_json(&layers, &applied)?),
    }
    Ok(render::EXIT_OK)
}

fn cmd_show_revision_layers(workspace: &Workspace, name: &str) -> Result<u8> {
    let graph = load_graph(&workspace.revisions)?;
    let layers = revision_layers(&graph, name)?;
    print!(
        "{}",
        render::layers_text(
            &format!("Revision Dependency Layers for {name}"),
            &layers,
            &BTreeSet::new()
        )
    );
    Ok(render::EXIT_OK)
}

async fn cmd_apply(
    workspace: &Workspace,
    mode: ConfirmMode,
    yes: bool,
    format: OutputFormat,
) -> Result<u8> {
    let confirmer: Arc<dyn Confirmer> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinConfirmer::new())
    };
    apply_with(workspace, mode, confirmer, format).await
}

async fn apply_with(
    workspace: &Workspace,
    mode: ConfirmMode,
    confirmer: Arc<dyn Confirmer>,
    format: OutputFormat,
) -> Result<u8> {
    let (report, output) = run_apply(workspace, mode, confirmer, format).await?;
    print!("{output}");
    Ok(render::report_exit_code(&report))
}

/// Run the engine and render the plan and report in `format`.
///
/// The engine runs even when nothing is pending so history warnings are
/// still reported.
async fn run_apply(
    workspace: &Workspace,
    mode: ConfirmMode,
    confirmer: Arc<dyn Confirmer>,
    format: OutputFormat,
) -> Result<(ApplyReport, String)> {
    let graph = load_graph(&workspace.revisions)?;
    let mut target = open_target(workspace)?;

    let mut output = String::new();
    if format == OutputFormat::Text {
        let applied = target.applied_set()?;
        let pending = render::pending_layers(&compute_layers(&graph), &applied);
        if pending.is_empty() {
            output.push_str(&format!(
                "Nothing to apply: all {} revision(s) are applied\n",
                graph.len()
            ));
        } else {
            output.push_str(&render::layers_text(
                "Revision Dependency Layers",
                &pending,
                &BTreeSet::new(),
            ));
        }
    }

    let engine = ApplyEngine::new(confirmer, mode);
    let report = engine.run(RunContext::new(&graph, &mut target)).await?;

    match format {
        OutputFormat::Text => output.push_str(&render::report_text(&report)),
        OutputFormat::Json => {
            output.push_str(&serde_json::to_string_pretty(&report)?);
            output.push('\n');
        }
    }
    Ok((report, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::apply::{Decision, ScriptedConfirmer};
    use strata_state::StateError;

    struct Fixture {
        _dir: tempfile::TempDir,
        workspace: Workspace,
        db: PathBuf,
    }

    fn fixture(warning: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");
        let config = dir.path().join("db_configs.yaml");
        std::fs::write(
            &config,
            format!(
                "default:\n  dialect: sqlite\n  database: {}\n  connection_warning: {warning}\n",
                db.display()
            ),
        )
        .unwrap();
        let revisions = dir.path().join("revisions");
        std::fs::create_dir_all(&revisions).unwrap();
        std::fs::write(
            revisions.join("a.yaml"),
            "revision_name: A\nsql_text: CREATE TABLE a (id INTEGER);\n",
        )
        .unwrap();
        std::fs::write(
            revisions.join("b.yaml"),
            "revision_name: B\ndependencies: [A]\nsql_text: CREATE TABLE b (id INTEGER);\n",
        )
        .unwrap();
        Fixture {
            workspace: Workspace {
                config,
                revisions,
                environment: DEFAULT_ENVIRONMENT.to_string(),
            },
            db,
            _dir: dir,
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "strata",
            "apply-each",
            "--yes",
            "--db",
            "staging",
            "-r",
            "migrations",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.db, "staging");
        assert_eq!(cli.revisions, PathBuf::from("migrations"));
        assert!(matches!(
            cli.command,
            Commands::ApplyEach {
                yes: true,
                format: OutputFormat::Json
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_then_apply_all() {
        let fx = fixture(true);
        assert_eq!(cmd_setup(&fx.workspace).unwrap(), render::EXIT_OK);

        let code = apply_with(
            &fx.workspace,
            ConfirmMode::WholePlan,
            Arc::new(AutoApprove),
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(code, render::EXIT_OK);

        let mut target = SqliteTarget::open_path(&fx.db).unwrap();
        let applied: Vec<String> = target.applied_set().unwrap().into_iter().collect();
        assert_eq!(applied, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_decline_maps_to_declined_exit_code() {
        let fx = fixture(false);
        cmd_setup(&fx.workspace).unwrap();
        let confirmer = Arc::new(ScriptedConfirmer::new([Decision::Approve, Decision::Decline]));
        let code = apply_with(
            &fx.workspace,
            ConfirmMode::EachRevision,
            confirmer,
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert_eq!(code, render::EXIT_DECLINED);
    }

    #[tokio::test]
    async fn test_fully_applied_run_still_reports_drift() {
        let fx = fixture(false);
        cmd_setup(&fx.workspace).unwrap();
        apply_with(
            &fx.workspace,
            ConfirmMode::WholePlan,
            Arc::new(AutoApprove),
            OutputFormat::Json,
        )
        .await
        .unwrap();
        std::fs::write(
            fx.workspace.revisions.join("a.yaml"),
            "revision_name: A\nsql_text: CREATE TABLE a (id INTEGER, name TEXT);\n",
        )
        .unwrap();

        let confirmer = Arc::new(ScriptedConfirmer::default());
        let (report, output) = run_apply(
            &fx.workspace,
            ConfirmMode::EachRevision,
            confirmer.clone(),
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert!(confirmer.asked().is_empty());
        assert_eq!(render::report_exit_code(&report), render::EXIT_OK);
        assert_eq!(report.drift.len(), 1);
        assert!(output.contains("Nothing to apply: all 2 revision(s) are applied"));
        assert!(output.contains("warning: A changed after it was applied"));
    }

    #[tokio::test]
    async fn test_apply_without_setup_is_a_connectivity_failure() {
        let fx = fixture(false);
        let code = apply_with(
            &fx.workspace,
            ConfirmMode::EachRevision,
            Arc::new(AutoApprove),
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(code, render::EXIT_CONNECTIVITY);
    }

    #[test]
    fn test_unknown_environment_is_reported() {
        let mut fx = fixture(false);
        fx.workspace.environment = "prod".to_string();
        let err = cmd_setup(&fx.workspace).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StateError>(),
            Some(StateError::EnvironmentNotFound(name)) if name == "prod"
        ));
        assert_eq!(render::error_exit_code(&err), render::EXIT_CONNECTIVITY);
    }

    #[test]
    fn test_new_revision_then_show_layers() {
        let fx = fixture(false);
        cmd_new_revision(
            &fx.workspace,
            "C",
            Some("third".to_string()),
            vec!["B".to_string()],
        )
        .unwrap();
        assert!(fx.workspace.revisions.join("C.yaml").exists());

        // The scaffold has no sql_text yet, so loading rejects it.
        let err = cmd_show_revision_layers(&fx.workspace, "B").unwrap_err();
        assert_eq!(render::error_exit_code(&err), render::EXIT_STRUCTURAL);

        std::fs::remove_file(fx.workspace.revisions.join("C.yaml")).unwrap();
        assert_eq!(
            cmd_show_revision_layers(&fx.workspace, "B").unwrap(),
            render::EXIT_OK
        );
    }

    #[test]
    fn test_cycle_is_a_structural_failure() {
        let fx = fixture(false);
        std::fs::write(
            fx.workspace.revisions.join("a.yaml"),
            "revision_name: A\ndependencies: [B]\nsql_text: SELECT 1;\n",
        )
        .unwrap();
        let err = cmd_show_revision_layers(&fx.workspace, "B").unwrap_err();
        assert_eq!(render::error_exit_code(&err), render::EXIT_STRUCTURAL);
    }
}
