use bgpfuzz_core::config::{FuzzConfig, TransportKind};
use bgpfuzz_core::feedback::{Feedback, UniqueResponseFeedback};
use bgpfuzz_core::log::init_logger;
use bgpfuzz_core::mutation::{MutationRecord, Mutator, WeightedFieldMutator};
use bgpfuzz_core::oracle::{Oracle, SessionOracle};
use bgpfuzz_core::transport::{FileTransport, RecordingTransport, TcpTransport, Transport};
use bgpfuzz_core::tree::FieldTree;

use clap::Parser;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use slog::{Logger, debug, info, o};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// BGP speaker to fuzz, `ip:port`. Selects the tcp transport.
    #[clap(long)]
    target: Option<SocketAddr>,
    #[clap(short, long)]
    iterations: Option<u64>,
    #[clap(short, long)]
    seed: Option<u64>,
    /// Build and mutate cases without sending them anywhere.
    #[clap(long)]
    dry_run: bool,
}

fn load_config(cli: &Cli) -> Result<FuzzConfig, anyhow::Error> {
    let mut config = match &cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}");
            FuzzConfig::load_from_file(config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("bgpfuzz.toml");
            if default_config_path.exists() {
                println!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                FuzzConfig::load_from_file(&default_config_path)?
            } else {
                println!(
                    "No config file specified and default 'bgpfuzz.toml' not found, using built-in defaults."
                );
                FuzzConfig::default()
            }
        }
    };

    if let Some(iterations) = cli.iterations {
        config.fuzzer.max_iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        config.fuzzer.seed = Some(seed);
    }
    if let Some(target) = cli.target {
        config.transport.kind = TransportKind::Tcp;
        config.transport.address = Some(target);
    }
    if cli.dry_run {
        config.transport.kind = TransportKind::DryRun;
    }
    Ok(config)
}

fn build_transport(
    config: &FuzzConfig,
    log: &Logger,
) -> Result<Box<dyn Transport>, anyhow::Error> {
    let transport: Box<dyn Transport> = match config.transport.kind {
        TransportKind::Tcp => {
            let address = config
                .transport
                .address
                .ok_or_else(|| anyhow::anyhow!("tcp transport requires an address"))?;
            let timeout = Duration::from_millis(config.transport.timeout_ms);
            let tcp_log = log.new(o!("target" => address.to_string()));
            let mut tcp = TcpTransport::new(address, timeout, tcp_log);
            if config.session.handshake {
                tcp = tcp.with_preamble(config.session.open.session_preamble(log.clone())?);
            }
            Box::new(tcp)
        }
        TransportKind::File => Box::new(FileTransport::new(&config.transport.output_dir)?),
        TransportKind::DryRun => Box::new(RecordingTransport::default()),
    };
    Ok(transport)
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let log = init_logger();
    let config = load_config(&cli)?;
    println!("Effective configuration: {config:#?}");

    let seed = config.fuzzer.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    });
    info!(log, "seeding random source"; "seed" => seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut template = FieldTree::new(log.new(o!("tree" => "template")));
    let root = config.message.build(&mut template)?;

    let mut transport = build_transport(&config, &log)?;
    let oracle: Box<dyn Oracle> =
        Box::new(SessionOracle::new(config.session.report_notifications));
    let mut feedback: Box<dyn Feedback> = Box::new(UniqueResponseFeedback::new());
    let mut mutator: Box<dyn Mutator<ChaCha8Rng>> =
        Box::new(WeightedFieldMutator::new(config.fuzzer.leaves_only));

    let max_iterations = config.fuzzer.max_iterations;
    println!(
        "Starting fuzz loop for {} iterations on a {:?} seed message...",
        max_iterations,
        config.message.message_type()
    );
    let start_time = Instant::now();
    let mut executions: u64 = 0;
    let mut interesting_found: u64 = 0;
    let mut solutions_found: u64 = 0;

    for i in 0..max_iterations {
        let mut case = template.clone();
        let mut records: Vec<MutationRecord> =
            Vec::with_capacity(config.fuzzer.mutations_per_case);
        for _ in 0..config.fuzzer.mutations_per_case {
            match mutator.mutate(&mut case, root, &mut rng) {
                Ok(record) => records.push(record),
                Err(e) => debug!(log, "mutation failed"; "error" => %e),
            }
        }

        let input = case.encode(root)?;
        let status = transport.send(&input);
        executions += 1;

        let interesting = feedback.is_interesting(&input, &status);
        if interesting {
            interesting_found += 1;
            let mutations: Vec<&str> = records.iter().map(|r| r.name).collect();
            debug!(log, "new target reaction";
                "iteration" => i,
                "status" => status.class(),
                "mutations" => ?mutations,
            );
        }

        if let Some(bug_report) = oracle.examine(&input, &status) {
            solutions_found += 1;
            info!(log, "finding";
                "severity" => bug_report.severity,
                "description" => &bug_report.description,
                "hash" => &bug_report.input_hash,
            );
            println!("{}", bug_report.to_json_line()?);
        }

        for record in &records {
            // Nodes created while mutating this case do not exist in the template.
            if !template.contains(record.node) {
                continue;
            }
            template.reward_with_rate(
                record.node,
                record.operator,
                interesting,
                config.fuzzer.learning_rate,
            )?;
        }

        if i > 0 && i % (max_iterations / 100).max(1) == 0 {
            let elapsed = start_time.elapsed().as_secs_f32();
            let exec_per_sec = if elapsed > 0.0 {
                executions as f32 / elapsed
            } else {
                0.0
            };
            eprint!(
                "\rIter: {}/{}, Interesting: {}, Findings: {}, Execs/sec: {:.2}   ",
                i, max_iterations, interesting_found, solutions_found, exec_per_sec
            );
            std::io::stderr().flush()?;
        }
    }
    let elapsed_total = start_time.elapsed();
    eprintln!("\nFuzz loop finished in {elapsed_total:.2?}.");
    eprintln!(
        "Total Executions: {executions}, Interesting: {interesting_found}, Findings: {solutions_found}"
    );

    Ok(())
}
