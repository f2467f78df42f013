use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use robomigrate::ai::{AiTransformer, OpenAiCompatibleClient};
use robomigrate::config::Config;
use robomigrate::logging::init_tracing;
use robomigrate::model::{AiSettings, MigrationRequest, OperationKind, TransformMode, TransformTier, WorkflowPhase};
use robomigrate::repo::LocalGitRepository;
use robomigrate::workflow::{MigrationResponse, Workflow};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperationArg {
    Migration,
    Transformation,
    Both,
}

impl From<OperationArg> for OperationKind {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Migration => OperationKind::Migration,
            OperationArg::Transformation => OperationKind::Transformation,
            OperationArg::Both => OperationKind::MigrationAndTransformation,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Manual,
    Enhanced,
    Hybrid,
}

impl From<ModeArg> for TransformMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Manual => TransformMode::Manual,
            ModeArg::Enhanced => TransformMode::Enhanced,
            ModeArg::Hybrid => TransformMode::Hybrid,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "robomigrate",
    about = "Migrate Cucumber/Selenium Java test suites to Robot Framework",
    version
)]
struct Args {
    /// Path to the git repository (defaults to current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Config file (defaults to ./robomigrate.toml, then the user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Branch holding the source tests
    #[arg(long, default_value = "main")]
    source_branch: String,

    /// Branch receiving the output (generated when omitted)
    #[arg(long)]
    target_branch: Option<String>,

    #[arg(long, value_enum, default_value_t = OperationArg::Migration)]
    operation: OperationArg,

    #[arg(long, value_enum, default_value_t = ModeArg::Enhanced)]
    mode: ModeArg,

    /// Re-processing depth for already-migrated files (1-3)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    tier: u8,

    /// Re-run the tier even on files that already carry it
    #[arg(long)]
    force: bool,

    /// Offer each file to the AI completion service first
    #[arg(long)]
    ai: bool,

    /// AI model identifier
    #[arg(long)]
    model: Option<String>,

    /// Files per commit
    #[arg(long)]
    batch_size: Option<usize>,

    /// Transform everything but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Open a pull request when done
    #[arg(long)]
    create_pr: bool,

    /// Directory to search for sources (repeatable; auto-detect when omitted)
    #[arg(long = "source-path")]
    source_paths: Vec<String>,

    /// Print the full response as JSON
    #[arg(long)]
    json: bool,
}

fn build_request(args: &Args, config: &Config, ai_enabled: bool) -> MigrationRequest {
    MigrationRequest {
        operation: args.operation.into(),
        source_branch: args.source_branch.clone(),
        target_branch: args.target_branch.clone(),
        source_paths: args.source_paths.clone(),
        role_paths: config.role_paths(),
        target_root: config.paths.target_root.clone(),
        mode: args.mode.into(),
        tier: TransformTier::from_number(args.tier).unwrap_or_default(),
        force: args.force,
        ai: AiSettings {
            enabled: ai_enabled,
            provider: config.ai.provider.clone(),
            model: args.model.clone().unwrap_or_else(|| config.ai.model.clone()),
            region: config.ai.region.clone(),
        },
        batch_size: args.batch_size.unwrap_or(config.commit.batch_size),
        dry_run: args.dry_run,
        create_pr: args.create_pr,
    }
}

fn print_summary(response: &MigrationResponse) {
    let s = &response.summary;
    println!();
    match response.state.phase {
        WorkflowPhase::Completed => println!("  + Migration complete"),
        _ => println!(
            "  x Migration failed [{}]: {}",
            response.error_code.map(|c| c.as_str()).unwrap_or("E_INTERNAL"),
            response.error.as_deref().unwrap_or("unknown error")
        ),
    }
    if let Some(branch) = &response.branch {
        println!("    Branch:        {}", branch);
    }
    println!("    Discovered:    {}", s.discovered);
    println!("    Transformed:   {} ({} placeholders, {} unchanged)", s.transformed, s.degraded, s.unchanged);
    println!("    Committed:     {} in {} batch(es)", s.committed, s.batches);
    if s.read_failures + s.transform_failures + s.commit_failures > 0 {
        println!(
            "    Failures:      {} read, {} transform, {} commit",
            s.read_failures, s.transform_failures, s.commit_failures
        );
    }
    if s.validation_failures > 0 {
        println!("    Validation:    {} file(s) with issues", s.validation_failures);
    }
    if response.ai_usage.enabled {
        println!(
            "    AI:            {} produced, {} fell back, {} tokens, ${:.4}",
            response.ai_usage.produced(),
            response.ai_usage.fallbacks(),
            response.ai_usage.prompt_tokens + response.ai_usage.completion_tokens,
            response.ai_usage.total_cost
        );
    }
    if let Some(url) = &response.pr_url {
        println!("    Pull request:  {}", url);
    }
    for result in response.results.iter().filter(|r| !r.is_success()) {
        println!(
            "    - {}: {}",
            result.source_file,
            result.error.as_deref().unwrap_or("failed")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();
    let config = Config::load(args.config.as_deref());

    let repo_path = args
        .repo
        .canonicalize()
        .with_context(|| format!("repository path {} does not exist", args.repo.display()))?;
    let facade = LocalGitRepository::open(&repo_path).context("failed to open git repository")?;

    let wants_ai = args.ai || config.ai.enabled;
    let mut ai = None;
    if wants_ai {
        match config.api_key() {
            Some(key) => {
                let client = match &config.ai.base_url {
                    Some(url) => OpenAiCompatibleClient::new(url.clone(), key),
                    None => OpenAiCompatibleClient::openrouter(key),
                };
                let mut options = config.ai_options();
                if let Some(model) = &args.model {
                    options.model = model.clone();
                }
                ai = Some(Arc::new(AiTransformer::new(Arc::new(client), options)));
            }
            None => eprintln!(
                "  Warning: AI requested but neither ROBOMIGRATE_AI_API_KEY nor OPENROUTER_API_KEY is set; continuing without AI."
            ),
        }
    }

    let request = build_request(&args, &config, ai.is_some());
    let mut workflow = Workflow::new(&facade)
        .with_library(config.library.clone())
        .with_source_roots(config.paths.source_roots.clone())
        .with_read_policy(config.read_policy())
        .with_commit_policy(config.commit_policy());
    if let Some(ai) = ai {
        workflow = workflow.with_ai(ai);
    }

    let quiet = args.json;
    let observer = move |message: &str, _phase: WorkflowPhase, percent: Option<u8>| {
        if !quiet {
            match percent {
                Some(p) => eprintln!("  [{:>3}%] {}", p, message),
                None => eprintln!("         {}", message),
            }
        }
    };
    let response = workflow.run(&request, &observer).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_summary(&response);
    }

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
