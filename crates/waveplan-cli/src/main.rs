//! waveplan CLI - Backlog Delivery Planner
//!
//! Command-line interface for validating, scheduling, allocating and
//! exchanging backlogs.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waveplan_core::{
    DeveloperRepository, MemoryStore, PlanError, Story, StoryRepository,
};
use waveplan_engine::{cycle, waves, Planner};
use waveplan_io::{export, import, ProjectFile};

#[derive(Parser)]
#[command(name = "waveplan")]
#[command(author, version, about = "Backlog delivery planner", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file: cycles, wave rules, dangling dependencies
    Check {
        /// Project file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Sort the backlog and compute dates (no developer assignment)
    Schedule {
        /// Project file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Roadmap start date (YYYY-MM-DD); configuration or today when absent
        #[arg(long)]
        start_date: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the updated project back to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: sort, compute dates and assign developers
    Allocate {
        /// Project file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Roadmap start date (YYYY-MM-DD); configuration or today when absent
        #[arg(long)]
        start_date: Option<String>,

        /// Random tie-break seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Per-wave iteration cap
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the updated project back to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a CSV backlog into a project file
    Import {
        /// CSV file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Existing project to merge into (fresh project when absent)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Where to write the merged project
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Export the backlog as a 13-column table (xlsx or csv by extension)
    Export {
        /// Project file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output table path (.xlsx or .csv)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Check { file } => cmd_check(&file),
        Commands::Schedule {
            file,
            start_date,
            format,
            output,
        } => cmd_schedule(&file, start_date.as_deref(), &format, output.as_deref()),
        Commands::Allocate {
            file,
            start_date,
            seed,
            max_iterations,
            format,
            output,
        } => cmd_allocate(
            &file,
            start_date.as_deref(),
            seed,
            max_iterations,
            &format,
            output.as_deref(),
        ),
        Commands::Import {
            file,
            project,
            output,
        } => cmd_import(&file, project.as_deref(), &output),
        Commands::Export { file, output } => cmd_export(&file, &output),
    }
}

fn load_project(path: &Path) -> Result<ProjectFile> {
    ProjectFile::load(path).with_context(|| format!("failed to load project '{}'", path.display()))
}

fn effective_start(project: &ProjectFile, flag: Option<&str>) -> Result<NaiveDate> {
    if let Some(raw) = flag {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid start date '{raw}', expected YYYY-MM-DD"));
    }
    Ok(project
        .configuration
        .roadmap_start_date
        .unwrap_or_else(|| Local::now().date_naive()))
}

// ============================================================================
// check
// ============================================================================

fn cmd_check(file: &Path) -> Result<()> {
    let project = load_project(file)?;
    let mut findings = 0;

    // Cycles
    let dependency_map: HashMap<String, Vec<String>> = project
        .stories
        .iter()
        .map(|s| (s.id.clone(), s.dependencies.clone()))
        .collect();
    match cycle::find_cycle(&dependency_map) {
        Ok(()) => {}
        Err(PlanError::CyclicDependency(path)) => {
            findings += 1;
            println!("error: cyclic dependency: {}", path.join(" -> "));
        }
        Err(other) => bail!(other),
    }

    // Wave rules and dangling references
    let by_id: HashMap<&str, &Story> = project
        .stories
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect();
    for story in &project.stories {
        for dep_id in &story.dependencies {
            match by_id.get(dep_id.as_str()) {
                None => {
                    findings += 1;
                    println!(
                        "warning: story '{}' depends on unknown id '{}' (it will be left out of the sort)",
                        story.id, dep_id
                    );
                }
                Some(dependency) => {
                    if let Err(err) = waves::validate(story, dependency) {
                        findings += 1;
                        println!("error: {err}");
                    }
                }
            }
        }
    }

    if findings == 0 {
        println!(
            "ok: {} stories, {} developers, {} features",
            project.stories.len(),
            project.developers.len(),
            project.features.len()
        );
        Ok(())
    } else {
        bail!("{findings} finding(s)");
    }
}

// ============================================================================
// schedule / allocate
// ============================================================================

fn print_backlog(stories: &[Story]) {
    let mut sorted: Vec<&Story> = stories.iter().collect();
    sorted.sort_by_key(|s| s.priority);

    println!(
        "{:<4} {:<10} {:<30} {:>4} {:>5} {:>12} {:>12} {:<12}",
        "Prio", "ID", "Nome", "Onda", "SP", "Início", "Fim", "Desenvolvedor"
    );
    for story in sorted {
        println!(
            "{:<4} {:<10} {:<30} {:>4} {:>5} {:>12} {:>12} {:<12}",
            story.priority,
            story.id,
            story.name.chars().take(30).collect::<String>(),
            story.wave,
            story
                .story_point
                .map(|sp| sp.value().to_string())
                .unwrap_or_default(),
            story
                .start_date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            story
                .end_date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            story.developer_id.as_deref().unwrap_or(""),
        );
    }
}

fn write_output(project: &ProjectFile, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        project
            .save(path)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        println!("project written to {}", path.display());
    }
    Ok(())
}

fn cmd_schedule(
    file: &Path,
    start_date: Option<&str>,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut project = load_project(file)?;
    let start = effective_start(&project, start_date)?;

    Planner::new(project.configuration.clone())
        .schedule(&mut project.stories, start)
        .context("scheduling failed")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&project.stories)?),
        _ => print_backlog(&project.stories),
    }
    write_output(&project, output)
}

fn cmd_allocate(
    file: &Path,
    start_date: Option<&str>,
    seed: Option<u64>,
    max_iterations: Option<u32>,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut project = load_project(file)?;
    let start = effective_start(&project, start_date)?;

    let mut planner = Planner::new(project.configuration.clone());
    if let Some(seed) = seed {
        planner = planner.with_seed(seed);
    }
    if let Some(cap) = max_iterations {
        planner = planner.with_max_iterations(cap);
    }

    // One read up front, one atomic batch write at the end; the planner
    // works purely on the in-memory set in between.
    let mut store = MemoryStore::with_data(
        project.stories.clone(),
        project.developers.clone(),
        project.features.clone(),
        project.configuration.clone(),
    )
    .context("failed to stage the project")?;
    let mut stories = StoryRepository::find_all(&store)?;
    let developers = DeveloperRepository::find_all(&store)?;

    let outcome = planner
        .plan(&mut stories, &developers, start)
        .context("allocation failed")?;

    let touched: Vec<Story> = stories
        .iter()
        .filter(|s| outcome.modified.contains(&s.id))
        .cloned()
        .collect();
    store.save_batch(touched).context("failed to persist the plan")?;
    project.stories = StoryRepository::find_all(&store)?;

    match format {
        "json" => {
            let report = serde_json::json!({
                "allocated": outcome.allocated,
                "warnings": &outcome.warnings,
                "metrics": &outcome.metrics,
                "stories": &project.stories,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_backlog(&project.stories);
            println!();
            println!("{} story(ies) allocated", outcome.allocated);
            for warning in &outcome.warnings {
                println!("warning: {warning}");
            }
            println!("{}", outcome.metrics);
        }
    }
    write_output(&project, output)
}

// ============================================================================
// import / export
// ============================================================================

fn cmd_import(file: &Path, project: Option<&Path>, output: &Path) -> Result<()> {
    let mut target = match project {
        Some(path) => load_project(path)?,
        None => ProjectFile::default(),
    };

    let outcome = import::import_csv(file, &target.story_ids())
        .with_context(|| format!("failed to import '{}'", file.display()))?;
    target
        .merge_import(&outcome)
        .context("failed to merge imported stories")?;
    target
        .save(output)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    let stats = &outcome.stats;
    println!(
        "{} row(s) processed, {} imported, {} duplicate(s) skipped, {} invalid skipped, {} dependency reference(s) dropped",
        stats.total_processed,
        stats.total_imported,
        stats.skipped_duplicates,
        stats.skipped_invalid,
        stats.dependencies_dropped
    );
    for warning in &stats.warnings {
        println!("warning: {warning}");
    }
    println!("project written to {}", output.display());
    Ok(())
}

fn cmd_export(file: &Path, output: &Path) -> Result<()> {
    let project = load_project(file)?;

    match output.extension().and_then(|e| e.to_str()) {
        Some("xlsx") => export::write_xlsx(
            output,
            &project.stories,
            &project.features,
            &project.developers,
        )?,
        Some("csv") => export::write_csv(
            output,
            &project.stories,
            &project.features,
            &project.developers,
        )?,
        other => bail!("unsupported export extension {other:?}, use .xlsx or .csv"),
    }

    println!(
        "{} story(ies) exported to {}",
        project.stories.len(),
        output.display()
    );
    Ok(())
}
