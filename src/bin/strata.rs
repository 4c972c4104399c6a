//! Binary entry point for the `strata` graph tool.
#![forbid(unsafe_code)]

#[path = "strata/config.rs"]
mod config;

use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use strata::{
    cli::{load_edge_list, write_edge_list, CliError, EdgeListConfig},
    net::{
        recv_kv_msg, send_kv_msg, KvStoreMsg, MessageKind, Receiver, Sender, SocketReceiver,
        SocketSender, Tensor,
    },
    ops::partition_with_halo,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

const DEFAULT_NUM_PARTS: u64 = 2;
const DEFAULT_NUM_HOPS: usize = 1;

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Inspect, partition and exchange graph data",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "STRATA_CONFIG",
        value_name = "FILE",
        help = "Config file (defaults to <config dir>/strata/config.toml)"
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

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct EdgeListArgs {
    #[arg(value_name = "EDGES", help = "CSV edge list with a header row")]
    path: PathBuf,

    #[arg(long, default_value = "src", help = "Edge source column name")]
    src_column: String,

    #[arg(long, default_value = "dst", help = "Edge destination column name")]
    dst_column: String,

    #[arg(long, help = "Vertex count (defaults to the largest id plus one)")]
    num_vertices: Option<u64>,
}

impl EdgeListArgs {
    fn to_config(&self) -> EdgeListConfig {
        EdgeListConfig {
            path: self.path.clone(),
            src_column: self.src_column.clone(),
            dst_column: self.dst_column.clone(),
            num_vertices: self.num_vertices,
        }
    }
}

#[derive(Args, Debug)]
struct PartitionCmd {
    #[command(flatten)]
    input: EdgeListArgs,

    #[arg(long, help = "Number of partitions")]
    parts: Option<u64>,

    #[arg(long, help = "Halo depth in hops")]
    hops: Option<usize>,

    #[arg(long, value_name = "DIR", help = "Write each partition's edges as CSV")]
    out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeCmd {
    #[arg(long, value_name = "socket://HOST:PORT", help = "Address to listen on")]
    bind: String,

    #[arg(long, default_value_t = 1, help = "Number of senders to wait for")]
    senders: usize,
}

#[derive(Args, Debug)]
struct PushCmd {
    #[arg(long, value_name = "socket://HOST:PORT", help = "Receiver address")]
    to: String,

    #[arg(long, help = "Parameter name")]
    name: String,

    #[arg(long, value_name = "ID,ID", help = "Comma-separated row ids")]
    ids: String,

    #[arg(long, value_name = "X,X", help = "Comma-separated values, row-major")]
    values: String,

    #[arg(long, default_value_t = 0, help = "Rank reported in the header")]
    rank: i32,

    #[arg(long, default_value_t = 0, help = "Logical sender id")]
    sender_id: i32,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Report vertex, edge and degree statistics")]
    Stats(EdgeListArgs),

    #[command(about = "Split a graph into halo partitions")]
    Partition(PartitionCmd),

    #[command(about = "Receive key/value messages until every sender finishes")]
    Serve(ServeCmd),

    #[command(about = "Send one push message")]
    Push(PushCmd),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    num_vertices: u64,
    num_edges: u64,
    multigraph: bool,
    max_in_degree: u64,
    max_out_degree: u64,
    isolated_vertices: u64,
}

#[derive(Debug, Serialize)]
struct PartReport {
    part: usize,
    inner_nodes: usize,
    halo_nodes: usize,
    edges: u64,
    inner_edges: usize,
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct KvReport {
    sender: i32,
    kind: String,
    rank: i32,
    name: Option<String>,
    ids: Vec<i64>,
    values: Vec<f32>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strata=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let cfg = CliConfig::load(cli.config.clone())?;
    debug!(config = ?cfg.path(), "cli.config.loaded");

    match cli.command {
        Command::Stats(args) => {
            let report = stats(&args)?;
            emit(cli.format, &report, || print_stats_text(&report))?;
        }
        Command::Partition(cmd) => {
            let parts = cmd.parts.or(cfg.num_parts()).unwrap_or(DEFAULT_NUM_PARTS);
            let hops = cmd.hops.or(cfg.num_hops()).unwrap_or(DEFAULT_NUM_HOPS);
            let reports = partition(&cmd, parts, hops)?;
            emit(cli.format, &reports, || print_partition_text(&reports))?;
        }
        Command::Serve(cmd) => serve(&cmd, &cfg, cli.format)?,
        Command::Push(cmd) => push(&cmd, &cfg)?,
    }
    Ok(())
}

fn stats(args: &EdgeListArgs) -> Result<StatsReport, CliError> {
    let graph = load_edge_list(&args.to_config())?.to_graph()?;
    let vids: Vec<u64> = (0..graph.num_vertices()).collect();
    let in_deg = graph.in_degrees(&vids)?;
    let out_deg = graph.out_degrees(&vids)?;
    let isolated = in_deg
        .iter()
        .zip(&out_deg)
        .filter(|&(&i, &o)| i == 0 && o == 0)
        .count();
    Ok(StatsReport {
        num_vertices: graph.num_vertices(),
        num_edges: graph.num_edges(),
        multigraph: graph.is_multigraph(),
        max_in_degree: in_deg.iter().copied().max().unwrap_or(0),
        max_out_degree: out_deg.iter().copied().max().unwrap_or(0),
        isolated_vertices: isolated as u64,
    })
}

fn partition(cmd: &PartitionCmd, parts: u64, hops: usize) -> Result<Vec<PartReport>, CliError> {
    if parts == 0 {
        return Err(CliError::Message("--parts must be at least 1".into()));
    }
    let graph = load_edge_list(&cmd.input.to_config())?.to_graph()?;
    let n = graph.num_vertices();
    let parts = parts.min(n.max(1));
    // Contiguous id ranges, one per part.
    let node_parts: Vec<u64> = (0..n).map(|v| v * parts / n.max(1)).collect();
    let halos = partition_with_halo(&graph, &node_parts, hops)?;
    if let Some(dir) = &cmd.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut reports = Vec::with_capacity(halos.len());
    for (part, halo) in halos.iter().enumerate() {
        let sub = &halo.subgraph;
        let output = match &cmd.out_dir {
            Some(dir) => {
                let local = sub.graph.edges(true);
                let src: Vec<u64> = local.src.iter().map(|&v| sub.induced_vertices[v as usize]).collect();
                let dst: Vec<u64> = local.dst.iter().map(|&v| sub.induced_vertices[v as usize]).collect();
                let path = dir.join(format!("part-{part}.csv"));
                write_edge_list(&path, &src, &dst)?;
                Some(path)
            }
            None => None,
        };
        reports.push(PartReport {
            part,
            inner_nodes: halo.num_inner_nodes(),
            halo_nodes: halo.num_halo_nodes(),
            edges: sub.graph.num_edges(),
            inner_edges: halo.inner_edges.iter().filter(|&&inner| inner).count(),
            output,
        });
    }
    info!(parts = reports.len(), hops, "cli.partition.done");
    Ok(reports)
}

fn serve(cmd: &ServeCmd, cfg: &CliConfig, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    let mut receiver = SocketReceiver::new(cfg.comm());
    receiver.wait(&cmd.bind, cmd.senders)?;
    let mut remaining: BTreeSet<i32> = receiver.sender_ids().into_iter().collect();
    while !remaining.is_empty() {
        let (msg, sender) = recv_kv_msg(&receiver)?;
        if msg.kind == MessageKind::Final {
            remaining.remove(&sender);
            debug!(sender, left = remaining.len(), "cli.serve.sender_done");
            continue;
        }
        let report = KvReport {
            sender,
            kind: format!("{:?}", msg.kind),
            rank: msg.rank,
            name: msg.name.clone(),
            ids: msg.id.as_ref().map(Tensor::to_i64_vec).transpose()?.unwrap_or_default(),
            values: msg.data.as_ref().map(Tensor::to_f32_vec).transpose()?.unwrap_or_default(),
        };
        emit(format, &report, || print_kv_text(&report))?;
    }
    receiver.finalize()?;
    Ok(())
}

fn push(cmd: &PushCmd, cfg: &CliConfig) -> Result<(), Box<dyn Error>> {
    let ids: Vec<u64> = parse_list(&cmd.ids, "--ids")?;
    let values: Vec<f32> = parse_list(&cmd.values, "--values")?;
    if ids.is_empty() || values.len() % ids.len() != 0 {
        return Err(CliError::Message(format!(
            "{} values cannot be split evenly across {} ids",
            values.len(),
            ids.len()
        ))
        .into());
    }
    let width = (values.len() / ids.len()) as i64;
    let id = Tensor::from_ids(&ids)?;
    let data = Tensor::from_f32(vec![ids.len() as i64, width], &values)?;
    let msg = KvStoreMsg::push(cmd.rank, cmd.name.clone(), id, data);

    let mut sender = SocketSender::new(cmd.sender_id, cfg.comm());
    sender.add_receiver(&cmd.to, 0)?;
    sender.connect()?;
    send_kv_msg(&sender, 0, &msg)?;
    send_kv_msg(&sender, 0, &KvStoreMsg::final_msg(cmd.rank))?;
    sender.finalize()?;
    info!(to = %cmd.to, name = %cmd.name, rows = ids.len(), "cli.push.sent");
    Ok(())
}

fn parse_list<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<Vec<T>, CliError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| CliError::Message(format!("{flag}: cannot parse '{s}'")))
        })
        .collect()
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
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

fn print_stats_text(report: &StatsReport) {
    println!(
        "vertices={} edges={} multigraph={}",
        report.num_vertices, report.num_edges, report.multigraph
    );
    println!(
        "max_in_degree={} max_out_degree={} isolated={}",
        report.max_in_degree, report.max_out_degree, report.isolated_vertices
    );
}

fn print_partition_text(reports: &[PartReport]) {
    for r in reports {
        print!(
            "part {}: inner_nodes={} halo_nodes={} edges={} inner_edges={}",
            r.part, r.inner_nodes, r.halo_nodes, r.edges, r.inner_edges
        );
        match &r.output {
            Some(path) => println!(" -> {}", path.display()),
            None => println!(),
        }
    }
}

fn print_kv_text(report: &KvReport) {
    println!(
        "from={} kind={} rank={} name={} ids={:?} values={:?}",
        report.sender,
        report.kind,
        report.rank,
        report.name.as_deref().unwrap_or("-"),
        report.ids,
        report.values
    );
}
