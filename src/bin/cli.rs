//! Binary entry point for the walkrank CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkrank::{
    cli::{load_edges, CliError, EdgeImportConfig, ImportSummary},
    salsa::{RecommendationResult, SalsaEngine, ScoreNormalization, WalkMode},
    storage::{BipartiteGraph, GraphOptions, GraphStats},
};

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "walkrank",
    version,
    about = "Load an edge stream and run SALSA recommendations over it",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "WALKRANK_CONFIG",
        value_name = "FILE",
        help = "TOML file with [graph] and [salsa] tables"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LoadArgs {
    #[arg(value_name = "EDGES", help = "CSV file with left,right[,type][,timestamp] columns")]
    edges: PathBuf,

    #[arg(long, default_value = "left", help = "Left node id column name")]
    left_column: String,

    #[arg(long, default_value = "right", help = "Right node id column name")]
    right_column: String,

    #[arg(long, default_value = "type", help = "Edge type column name")]
    type_column: String,

    #[arg(long, default_value = "timestamp", help = "Timestamp column name")]
    timestamp_column: String,

    #[arg(long, default_value_t = 0, help = "Edge type for rows without one")]
    default_type: u8,

    #[arg(long, help = "Count edges the graph rejects instead of failing")]
    skip_rejected: bool,

    #[arg(long, help = "Repack sealed segments after loading")]
    optimize: bool,
}

#[derive(Args, Debug)]
struct RecommendCmd {
    #[command(flatten)]
    load: LoadArgs,

    #[arg(long, help = "Left node to recommend for")]
    query: u64,

    #[arg(long = "seed", value_name = "ID:WEIGHT", help = "Additional weighted left seed")]
    seeds: Vec<String>,

    #[arg(long, value_name = "ID", help = "Right node to leave out of the results")]
    exclude: Vec<u64>,

    #[arg(long, help = "Half-steps per walk (required unless set in the config)")]
    walk_length: Option<usize>,

    #[arg(long, help = "Reset probability of a left step")]
    reset_probability: Option<f64>,

    #[arg(long, help = "Share of initial mass on the query node")]
    query_weight: Option<f64>,

    #[arg(long, help = "Walk budget")]
    walks: Option<usize>,

    #[arg(long, help = "Number of results")]
    results: Option<usize>,

    #[arg(long = "proof-type", value_name = "TYPE", help = "Edge type counted as social proof")]
    proof_types: Vec<u8>,

    #[arg(long, value_name = "SEED", help = "Simulate discrete walkers with this RNG seed")]
    sampled: Option<u64>,

    #[arg(long, help = "Normalize scores by degree")]
    cosine: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load edges and print ranked recommendations for one query node.
    Recommend(RecommendCmd),
    /// Load edges and print window occupancy.
    Stats(LoadArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RecommendReport {
    query: u64,
    import: ImportSummary,
    results: Vec<RecommendationResult>,
}

#[derive(Serialize)]
struct StatsReport {
    import: ImportSummary,
    segments: usize,
    sealed_segments: usize,
    optimized_segments: usize,
    edges: usize,
    left_nodes: usize,
    right_nodes: usize,
    time_range: Option<(i64, i64)>,
    reserved_entries: usize,
    wasted_entries: usize,
}

impl StatsReport {
    fn new(import: ImportSummary, stats: GraphStats) -> Self {
        Self {
            import,
            segments: stats.segments,
            sealed_segments: stats.sealed_segments,
            optimized_segments: stats.optimized_segments,
            edges: stats.edges,
            left_nodes: stats.left_nodes,
            right_nodes: stats.right_nodes,
            time_range: stats.time_range,
            reserved_entries: stats.pools.reserved_entries,
            wasted_entries: stats.pools.wasted_entries(),
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    install_tracing_subscriber(&cli.log);
    let config = CliConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::Message(err.to_string()))?;

    match cli.command {
        Command::Recommend(cmd) => {
            let (graph, import) = load_graph(&config, &cmd.load)?;
            let request = build_request(&config, &cmd)?;
            let engine = SalsaEngine::for_graph(&graph);
            let results = engine.recommend(&graph.snapshot(), &request)?;
            let report = RecommendReport {
                query: cmd.query,
                import,
                results,
            };
            emit(cli.format, &report, || print_recommend_text(&report))?;
        }
        Command::Stats(load) => {
            let (graph, import) = load_graph(&config, &load)?;
            let report = StatsReport::new(import, graph.stats());
            emit(cli.format, &report, || print_stats_text(&report))?;
        }
    }
    Ok(())
}

fn install_tracing_subscriber(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_graph(
    config: &CliConfig,
    args: &LoadArgs,
) -> Result<(BipartiteGraph, ImportSummary), CliError> {
    let graph = BipartiteGraph::new(GraphOptions::from_limits(config.graph.clone()))?;
    let import_cfg = EdgeImportConfig {
        path: args.edges.clone(),
        left_column: args.left_column.clone(),
        right_column: args.right_column.clone(),
        type_column: Some(args.type_column.clone()),
        timestamp_column: Some(args.timestamp_column.clone()),
        default_type: args.default_type,
        skip_rejected: args.skip_rejected,
    };
    let summary = load_edges(&graph, &import_cfg)?;
    if args.optimize {
        graph.seal_current();
        graph.optimize_sealed()?;
    }
    Ok((graph, summary))
}

fn build_request(
    config: &CliConfig,
    cmd: &RecommendCmd,
) -> Result<walkrank::salsa::SalsaRequest, CliError> {
    let mut builder = config.salsa.request(cmd.query);
    for raw in &cmd.seeds {
        let (id, weight) = parse_seed(raw)?;
        builder = builder.seed(id, weight);
    }
    builder = builder.exclude(cmd.exclude.iter().copied());
    if let Some(length) = cmd.walk_length {
        builder = builder.max_random_walk_length(length);
    }
    if let Some(p) = cmd.reset_probability {
        builder = builder.reset_probability(p);
    }
    if let Some(fraction) = cmd.query_weight {
        builder = builder.query_node_weight_fraction(fraction);
    }
    if let Some(walks) = cmd.walks {
        builder = builder.num_random_walks(walks);
    }
    if let Some(results) = cmd.results {
        builder = builder.max_num_results(results);
    }
    if !cmd.proof_types.is_empty() {
        builder = builder.social_proof_type_mask(cmd.proof_types.iter().copied());
    }
    if let Some(seed) = cmd.sampled {
        builder = builder.walk_mode(WalkMode::Sampled { seed });
    }
    if cmd.cosine {
        builder = builder.normalization(ScoreNormalization::Cosine);
    }
    Ok(builder.build()?)
}

fn parse_seed(raw: &str) -> Result<(u64, f64), String> {
    let (id, weight) = match raw.split_once(':') {
        Some((id, weight)) => (id, weight),
        None => (raw, "1"),
    };
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid seed id in '{raw}'"))?;
    let weight = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid seed weight in '{raw}'"))?;
    Ok((id, weight))
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), CliError>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_recommend_text(report: &RecommendReport) {
    println!(
        "Loaded {} edges ({} rejected)",
        report.import.edges_imported, report.import.edges_rejected
    );
    if report.results.is_empty() {
        println!("No recommendations for {}", report.query);
        return;
    }
    println!("Recommendations for {}:", report.query);
    for (rank, result) in report.results.iter().enumerate() {
        let proof: Vec<String> = result
            .social_proof
            .iter()
            .map(|(ty, seeds)| {
                let seeds: Vec<String> = seeds.iter().map(u64::to_string).collect();
                format!("{ty}:[{}]", seeds.join(","))
            })
            .collect();
        println!(
            "  {:>3}. {} score={:.6} proof={}",
            rank + 1,
            result.node,
            result.score,
            proof.join(" ")
        );
    }
}

fn print_stats_text(report: &StatsReport) {
    println!(
        "Import: rows={} imported={} rejected={}",
        report.import.rows, report.import.edges_imported, report.import.edges_rejected
    );
    println!(
        "Segments: total={} sealed={} optimized={}",
        report.segments, report.sealed_segments, report.optimized_segments
    );
    println!(
        "Graph: edges={} left_nodes={} right_nodes={}",
        report.edges, report.left_nodes, report.right_nodes
    );
    match report.time_range {
        Some((oldest, newest)) => println!("Time range: {oldest}..={newest}"),
        None => println!("Time range: empty"),
    }
    println!(
        "Pools: reserved_entries={} wasted_entries={}",
        report.reserved_entries, report.wasted_entries
    );
}
