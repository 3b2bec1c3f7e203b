mod display;
mod tui_app;
mod tui_events;
mod tui_ui;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agentfit_core::hardware::parse_memory_size;
use agentfit_core::monitor::MIN_POLL_INTERVAL;
use agentfit_core::{
    Config, DynamicSystemInfo, EvaluationParameters, MemoryMonitor, MemoryOverrides,
    MemoryReading, ModelCatalog, ModelCompatibility, StaticSystemInfo, evaluate, rank_by_headroom,
};

use crate::tui_app::StatusFilter;

#[derive(Parser)]
#[command(name = "agentfit")]
#[command(about = "Check which local LLMs fit in your free RAM when running parallel agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Number of agents running the model in parallel (rounded, clamped to 1-10)
    #[arg(short, long, global = true, value_name = "N", allow_hyphen_values = true)]
    agents: Option<f64>,

    /// Context length in tokens used for sizing.
    /// Falls back to AGENTFIT_CONTEXT_LENGTH, then the config file.
    #[arg(long, global = true, value_name = "TOKENS", value_parser = clap::value_parser!(u32).range(1..))]
    context: Option<u32>,

    /// Override detected free RAM (e.g. "18.4G", "512M", "1.5T").
    /// Pins the figure; live polling no longer changes it.
    #[arg(long, global = true, value_name = "SIZE")]
    free_memory: Option<String>,

    /// Override detected total RAM
    #[arg(long, global = true, value_name = "SIZE")]
    total_memory: Option<String>,

    /// Use fixed demo readings (36 GB M3 Pro, 18.4 GB free) instead of probing
    #[arg(long, global = true)]
    demo: bool,

    /// Model catalog JSON to use instead of the built-in one
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Output results as JSON (for tool integration)
    #[arg(long, global = true)]
    json: bool,

    /// Use classic CLI table output instead of TUI
    #[arg(long)]
    cli: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show system hardware and current memory
    System,

    /// List all models in the catalog
    List,

    /// Evaluate every model against current free RAM
    Check {
        /// Show only models with this status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,

        /// Limit number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Order by status then headroom instead of catalog order
        #[arg(long)]
        sort: bool,
    },

    /// Show sizing details for one model
    Info {
        /// Model id, name or partial name
        model: String,
    },

    /// Re-evaluate on every memory sample
    Watch {
        /// Poll interval in milliseconds (default from config, minimum 250)
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,

        /// Stop after this many samples
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },
}

/// Everything resolved from flags, environment and the config file.
struct Settings {
    catalog: ModelCatalog,
    params: EvaluationParameters,
    overrides: MemoryOverrides,
    poll_interval: Duration,
    /// Set by `--demo`, or by `detect` when the host reports no RAM.
    demo: bool,
}

impl Settings {
    fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let config = Config::load().context("failed to read config file")?;

        let catalog = match cli.catalog.as_ref().or(config.catalog_path.as_ref()) {
            Some(path) => ModelCatalog::load(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?,
            None => ModelCatalog::new(),
        };

        let params = EvaluationParameters::new(
            config.resolve_parallel_agents(cli.agents),
            config.resolve_context_length(cli.context),
        );
        tracing::debug!(
            agents = params.clamped_agents(),
            context_length = params.context_length,
            models = catalog.len(),
            "resolved settings"
        );

        let overrides = MemoryOverrides {
            total_ram_bytes: parse_size_flag("--total-memory", cli.total_memory.as_deref()),
            free_ram_bytes: parse_size_flag("--free-memory", cli.free_memory.as_deref()),
        };
        if !overrides.is_empty() {
            tracing::debug!(?overrides, "memory overrides in effect");
        }

        Ok(Settings {
            catalog,
            params,
            overrides,
            poll_interval: config.poll_interval(),
            demo: cli.demo,
        })
    }

    /// Static and first dynamic reading, or the demo pair.
    fn detect(&mut self) -> (StaticSystemInfo, DynamicSystemInfo) {
        if self.demo {
            return (StaticSystemInfo::demo(), DynamicSystemInfo::demo());
        }
        let system = StaticSystemInfo::detect();
        if self.fall_back_to_demo(&system) {
            return (StaticSystemInfo::demo(), DynamicSystemInfo::demo());
        }
        (system, DynamicSystemInfo::detect())
    }

    /// Switch to demo readings for the rest of the run when the host reports
    /// no installed RAM and `--total-memory` does not stand in for it.
    fn fall_back_to_demo(&mut self, system: &StaticSystemInfo) -> bool {
        if !system.is_unavailable() || self.overrides.total_ram_bytes.is_some() {
            return false;
        }
        tracing::warn!("could not detect installed RAM, using demo readings");
        eprintln!("Warning: could not detect installed RAM, showing demo readings.");
        self.demo = true;
        true
    }

    fn memory(&self, system: &StaticSystemInfo, dynamic: &DynamicSystemInfo) -> MemoryReading {
        self.overrides.apply(MemoryReading::from_info(system, dynamic))
    }

    fn spawn_monitor(&self, interval: Duration) -> MemoryMonitor {
        if self.demo {
            MemoryMonitor::spawn_with(interval, DynamicSystemInfo::demo)
        } else {
            MemoryMonitor::spawn(interval)
        }
    }
}

fn parse_size_flag(flag: &str, value: Option<&str>) -> Option<u64> {
    let raw = value?;
    let parsed = parse_memory_size(raw);
    if parsed.is_none() {
        eprintln!(
            "Warning: could not parse {} value '{}'. Expected format: 16G, 512M, 1.5T",
            flag, raw
        );
    }
    parsed
}

fn init_logging(verbose: bool, dashboard: bool) {
    // Log lines would tear the alternate screen.
    if dashboard && !verbose {
        return;
    }
    let filter = if verbose {
        EnvFilter::new("agentfit=debug,agentfit_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct CheckOptions {
    status: Option<StatusFilter>,
    limit: Option<usize>,
    sort: bool,
}

fn select_results(
    mut results: Vec<ModelCompatibility>,
    options: &CheckOptions,
) -> Vec<ModelCompatibility> {
    if let Some(filter) = options.status {
        results.retain(|r| filter.matches(r.status));
    }
    if options.sort {
        results = rank_by_headroom(results);
    }
    if let Some(n) = options.limit {
        results.truncate(n);
    }
    results
}

fn run_system(settings: &mut Settings, json: bool) -> anyhow::Result<()> {
    let (system, dynamic) = settings.detect();
    let memory = settings.memory(&system, &dynamic);
    if json {
        display::display_json_system(&system, &dynamic, &memory)
    } else {
        display::display_system(&system, &dynamic, &memory);
        Ok(())
    }
}

fn run_check(settings: &mut Settings, options: &CheckOptions, json: bool) -> anyhow::Result<()> {
    let (system, dynamic) = settings.detect();
    let memory = settings.memory(&system, &dynamic);

    let results = evaluate(settings.catalog.models(), &memory, &settings.params);
    let results = select_results(results, options);

    if json {
        display::display_json_results(&system, &dynamic, &memory, &settings.params, &results, true)
    } else {
        display::display_system(&system, &dynamic, &memory);
        display::display_compatibility(&results, &settings.params);
        Ok(())
    }
}

fn run_info(settings: &mut Settings, query: &str, json: bool) -> anyhow::Result<()> {
    let model = match settings.catalog.get(query) {
        Some(model) => model.clone(),
        None => {
            let matches = settings.catalog.find_model(query);
            match matches.as_slice() {
                [] => bail!("no model found matching '{query}'"),
                [model] => (*model).clone(),
                many => {
                    println!("\nMultiple models found. Please be more specific:");
                    for m in many {
                        println!("  - {} ({})", m.name, m.id);
                    }
                    return Ok(());
                }
            }
        }
    };

    let (system, dynamic) = settings.detect();
    let memory = settings.memory(&system, &dynamic);
    let result = agentfit_core::evaluate_model(&model, &memory, &settings.params);

    if json {
        display::display_json_results(
            &system,
            &dynamic,
            &memory,
            &settings.params,
            std::slice::from_ref(&result),
            true,
        )
    } else {
        display::display_model_detail(&result, &memory, &settings.params);
        Ok(())
    }
}

fn run_watch(
    settings: &mut Settings,
    interval: Option<Duration>,
    count: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let (system, _) = settings.detect();
    let monitor = settings.spawn_monitor(interval.unwrap_or(settings.poll_interval));
    let wait = monitor.interval() + Duration::from_secs(10);

    let mut seen = 0usize;
    while count.is_none_or(|n| seen < n) {
        let Some(dynamic) = monitor.wait_next(wait) else {
            bail!("memory monitor stopped responding");
        };
        let memory = settings.memory(&system, &dynamic);
        let results = evaluate(settings.catalog.models(), &memory, &settings.params);

        if json {
            display::display_json_results(
                &system,
                &dynamic,
                &memory,
                &settings.params,
                &results,
                false,
            )?;
        } else {
            println!(
                "\n[{}] {} free of {}",
                dynamic
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S"),
                agentfit_core::format::format_bytes(memory.free_ram_bytes as f64),
                agentfit_core::format::format_bytes(memory.total_ram_bytes as f64),
            );
            display::display_compatibility(&results, &settings.params);
        }
        seen += 1;
    }
    Ok(())
}

fn run_tui(mut settings: Settings) -> anyhow::Result<()> {
    let (system, dynamic) = settings.detect();
    let monitor = settings.spawn_monitor(settings.poll_interval);
    let mut app = tui_app::App::new(
        settings.catalog,
        system,
        dynamic,
        settings.overrides,
        settings.params,
    )
    .with_monitor(monitor)
    .with_demo(settings.demo);

    // Setup terminal
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal even if the loop failed
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut tui_app::App,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| {
            tui_ui::draw(frame, app);
        })?;

        tui_events::handle_events(app)?;

        if app.should_quit {
            return Ok(());
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let dashboard = cli.command.is_none() && !cli.cli;
    init_logging(cli.verbose, dashboard);

    let mut settings = Settings::resolve(&cli)?;

    match cli.command {
        Some(Commands::System) => run_system(&mut settings, cli.json),

        Some(Commands::List) => {
            if cli.json {
                display::display_json_catalog(settings.catalog.models())
            } else {
                display::display_catalog(&settings.catalog);
                Ok(())
            }
        }

        Some(Commands::Check {
            status,
            limit,
            sort,
        }) => run_check(
            &mut settings,
            &CheckOptions {
                status,
                limit,
                sort,
            },
            cli.json,
        ),

        Some(Commands::Info { model }) => run_info(&mut settings, &model, cli.json),

        Some(Commands::Watch { interval, count }) => {
            let interval = interval.map(|ms| Duration::from_millis(ms).max(MIN_POLL_INTERVAL));
            run_watch(&mut settings, interval, count, cli.json)
        }

        // --cli without a subcommand prints the plain check table
        None if cli.cli => run_check(
            &mut settings,
            &CheckOptions {
                status: None,
                limit: None,
                sort: false,
            },
            cli.json,
        ),

        None => run_tui(settings),
    }
}
