//! mrgit - query and drive several git working trees at once
//!
//! # Usage
//! ```bash
//! mrgit status ./ Packages/com.company.core      # Changed files per module
//! mrgit branches --all Packages/*                # Every reference, with presence
//! mrgit --json remotes .                         # Remotes as JSON
//! mrgit exec "fetch --prune" Packages/*          # Run in every module
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mrgit::audit::AuditLogger;
use mrgit::git::{MergeMode, merge_references};
use mrgit::{
    AppResult, CacheEntry, Config, Dispatcher, ErrorReporter, ErrorTranslator, GitExecutor,
    GitVersion, QueryKind, Workspace,
};

#[derive(Parser)]
#[command(name = "mrgit")]
#[command(about = "Query and drive several git working trees at once", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of ~/.config/mrgit/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show changed files of each module
    Status {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// List references every module has
    Branches {
        /// Include references only some modules have
        #[arg(long)]
        all: bool,

        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// List remotes of each module
    Remotes {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Run one git argument string in every module
    Exec {
        /// Arguments as one string, e.g. "commit -m 'message'"
        #[arg(value_name = "ARGS")]
        args: String,

        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
}

impl Commands {
    fn paths(&self) -> &[PathBuf] {
        match self {
            Commands::Status { paths }
            | Commands::Branches { paths, .. }
            | Commands::Remotes { paths }
            | Commands::Exec { paths, .. } => paths,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let friendly = ErrorTranslator::translate_app_error(&e);
            eprintln!("Error: {}", friendly.simple_message);
            if let Some(suggestion) = friendly.suggestion {
                eprintln!("{}", suggestion);
            }
            tracing::debug!(error = %friendly.raw_error, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default()?,
    };

    let version = GitVersion::validate(Path::new(&config.git.executable)).await?;
    tracing::info!(%version, executable = %config.git.executable, "using git");

    let mut dispatcher = Dispatcher::new(Arc::new(GitExecutor::from_config(&config)), Handle::current());
    if let Some(path) = config.audit_log_path() {
        match AuditLogger::with_path(&path) {
            Ok(logger) => dispatcher = dispatcher.with_audit(logger.with_rotation(config.audit_rotation())),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "audit log disabled"),
        }
    }
    let mut reporter = ErrorReporter::new(config.errors.history_capacity);

    let mut paths = cli.command.paths().to_vec();
    if paths.is_empty() {
        paths.push(std::env::current_dir()?);
    }
    let mut workspace = Workspace::discover(&paths, dispatcher)?;

    let ok = match cli.command {
        Commands::Status { .. } => status(&mut workspace, &mut reporter, cli.json).await?,
        Commands::Branches { all, .. } => {
            let mode = if all { MergeMode::Union } else { MergeMode::Intersection };
            branches(&mut workspace, &mut reporter, mode, cli.json).await?
        }
        Commands::Remotes { .. } => remotes(&mut workspace, &mut reporter, cli.json).await?,
        Commands::Exec { args, .. } => exec(&mut workspace, &mut reporter, &args, cli.json).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Poll `kind` on every module until no entry is pending
async fn settled(workspace: &mut Workspace, kind: QueryKind) -> Vec<CacheEntry> {
    loop {
        let entries: Vec<CacheEntry> = workspace
            .modules_mut()
            .iter_mut()
            .map(|m| m.get(kind))
            .collect();
        if entries.iter().all(|e| !e.is_pending()) {
            return entries;
        }
        workspace.idle().await;
    }
}

/// Print failed entries once; returns false if any failed
fn report_failures(workspace: &Workspace, reporter: &mut ErrorReporter, entries: &[CacheEntry]) -> bool {
    let mut ok = true;
    for (module, entry) in workspace.modules().iter().zip(entries) {
        if entry.error().is_none() {
            continue;
        }
        ok = false;
        if let Some(friendly) = reporter.report_entry(module.name(), entry) {
            eprintln!("{}: {}", module.name(), friendly.simple_message);
        }
    }
    ok
}

fn print_json(value: &serde_json::Value) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn status(workspace: &mut Workspace, reporter: &mut ErrorReporter, as_json: bool) -> AppResult<bool> {
    let branches = settled(workspace, QueryKind::CurrentBranch).await;
    let statuses = settled(workspace, QueryKind::Status).await;
    let ok = report_failures(workspace, reporter, &branches) & report_failures(workspace, reporter, &statuses);

    if as_json {
        let modules: Vec<_> = workspace
            .modules()
            .iter()
            .zip(branches.iter().zip(&statuses))
            .map(|(module, (branch, status))| {
                json!({
                    "module": module.name(),
                    "path": module.path(),
                    "branch": branch.current_branch().flatten(),
                    "files": status.status().map(|s| &s.files),
                })
            })
            .collect();
        print_json(&json!(modules))?;
        return Ok(ok);
    }

    for (module, (branch, status)) in workspace.modules().iter().zip(branches.iter().zip(&statuses)) {
        let branch = match branch.current_branch() {
            Some(Some(name)) => name.to_string(),
            Some(None) => "HEAD detached".to_string(),
            None => "?".to_string(),
        };
        println!("== {} ({})", module.short_name(), branch);

        let Some(status) = status.status() else { continue };
        if status.is_clean() {
            println!("   clean");
        }
        for file in &status.files {
            println!("   {}{} {}", file.index_state, file.worktree_state, file.full_path);
        }
    }
    Ok(ok)
}

async fn branches(
    workspace: &mut Workspace,
    reporter: &mut ErrorReporter,
    mode: MergeMode,
    as_json: bool,
) -> AppResult<bool> {
    // Presence reads the cached current branch
    let current = settled(workspace, QueryKind::CurrentBranch).await;
    let entries = settled(workspace, QueryKind::References).await;
    let ok = report_failures(workspace, reporter, &current) & report_failures(workspace, reporter, &entries);

    let lists: Vec<&[_]> = entries
        .iter()
        .filter_map(|e| e.references().map(|refs| refs.as_slice()))
        .collect();
    let merged = merge_references(&lists, mode);
    let module_count = workspace.len();

    if as_json {
        let references: Vec<_> = merged
            .iter()
            .map(|reference| {
                json!({
                    "reference": reference,
                    "presence": workspace.presence(reference),
                })
            })
            .collect();
        print_json(&json!(references))?;
        return Ok(ok);
    }

    for reference in &merged {
        let presence = workspace.presence(reference);
        let mut line = reference.qualified_name().to_string();
        if presence.is_partial(module_count) {
            line.push_str(&format!(
                "  [{}/{}: {}]",
                presence.present_in.len(),
                module_count,
                presence.present_in.join(", ")
            ));
        }
        if !presence.checked_out_in.is_empty() {
            line.push_str(&format!("  * {}", presence.checked_out_in.join(", ")));
        }
        println!("{}", line);
    }
    Ok(ok)
}

async fn remotes(workspace: &mut Workspace, reporter: &mut ErrorReporter, as_json: bool) -> AppResult<bool> {
    let entries = settled(workspace, QueryKind::Remotes).await;
    let ok = report_failures(workspace, reporter, &entries);

    if as_json {
        let modules: Vec<_> = workspace
            .modules()
            .iter()
            .zip(&entries)
            .map(|(module, entry)| {
                json!({
                    "module": module.name(),
                    "path": module.path(),
                    "remotes": entry.remotes(),
                })
            })
            .collect();
        print_json(&json!(modules))?;
        return Ok(ok);
    }

    for (module, entry) in workspace.modules().iter().zip(&entries) {
        println!("== {}", module.short_name());
        for remote in entry.remotes().into_iter().flat_map(|r| r.iter()) {
            println!("   {}\t{}", remote.alias, remote.url);
        }
    }
    Ok(ok)
}

async fn exec(
    workspace: &mut Workspace,
    reporter: &mut ErrorReporter,
    args: &str,
    as_json: bool,
) -> AppResult<bool> {
    let handles = workspace.run_all(args);
    workspace.idle().await;

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle) in &handles {
        results.push((path, handle.wait().await));
    }

    let mut ok = true;
    for (path, failure) in workspace.take_errors() {
        ok = false;
        let source = workspace
            .get(&path)
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if let Some(friendly) = reporter.report_command(&source, &failure) {
            eprintln!("{}: {}", source, friendly.simple_message);
            if let Some(suggestion) = friendly.suggestion {
                eprintln!("   {}", suggestion);
            }
        }
    }

    if as_json {
        let modules: Vec<_> = results
            .iter()
            .map(|(path, result)| match result {
                Ok(output) => json!({ "path": path, "output": output }),
                Err(e) => json!({ "path": path, "error": e.to_string() }),
            })
            .collect();
        print_json(&json!(modules))?;
        return Ok(ok);
    }

    for (path, result) in &results {
        let name = workspace.get(path).map(|m| m.short_name()).unwrap_or_default();
        println!("== {}", name);
        if let Ok(output) = result {
            print!("{}", output.stdout);
            if !output.success() {
                eprint!("{}", output.stderr);
            }
        }
    }
    Ok(ok)
}
