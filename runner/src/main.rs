//! Driver shell for the scheduler simulator.
//!
//! Parses the command line, builds the requested kernel, runs the workload
//! and prints the run summary. Optionally writes the per-process execution
//! profile as CSV.

use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::process;

use clap::{Arg, Command};
use regex::Regex;

use simulator::{trace, Kernel, Simulation};

fn main() {
    let matches = Command::new("simulate")
        .about("Discrete-event simulation of a single-CPU scheduler")
        .arg(
            Arg::new("workload")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Workload file describing I/O devices and timed program launches"),
        )
        .arg(
            Arg::new("kernel")
                .short('k')
                .long("kernel")
                .default_value("FCFS")
                .value_parser(valid_kernel_spec)
                .help("Scheduling kernel: FCFS, SJF, or RR<slice> (e.g. RR4)"),
        )
        .arg(
            Arg::new("syscall-cost")
                .long("syscall-cost")
                .default_value("1")
                .value_parser(clap::value_parser!(u64))
                .help("Time units taken by a system call"),
        )
        .arg(
            Arg::new("switch-cost")
                .long("switch-cost")
                .default_value("3")
                .value_parser(clap::value_parser!(u64))
                .help("Time units taken by a context switch"),
        )
        .arg(
            Arg::new("trace-level")
                .short('t')
                .long("trace-level")
                .default_value("0")
                .value_parser(clap::value_parser!(u32).range(0..=31))
                .help("Bitmask of trace output to print (0 silences all)"),
        )
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the per-process execution profile to this CSV file"),
        )
        .get_matches();

    let workload = matches.get_one::<PathBuf>("workload").unwrap();
    let spec = matches.get_one::<String>("kernel").unwrap();
    let syscall_cost = *matches.get_one::<u64>("syscall-cost").unwrap();
    let switch_cost = *matches.get_one::<u64>("switch-cost").unwrap();
    let trace_level = *matches.get_one::<u32>("trace-level").unwrap();
    let profile = matches.get_one::<PathBuf>("profile");

    trace::set_trace_level(trace_level);

    let kernel = match build_kernel(spec) {
        Ok(kernel) => kernel,
        Err(message) => {
            eprintln!("{message}");
            process::exit(1);
        }
    };

    let mut simulation = Simulation::new(kernel, syscall_cost, switch_cost);
    if let Err(err) = simulation.build_workload(workload) {
        eprintln!("{err}");
        process::exit(1);
    }
    if let Err(err) = simulation.run() {
        eprintln!("{err}");
        process::exit(1);
    }

    let machine = simulation.machine();
    println!("Done");
    println!("{}", machine.clock());
    println!("Context switches: {}", machine.cpu().context_switches());
    let user = machine.clock().user_time() as f64;
    let system = machine.clock().system_time() as f64;
    let utilization = if system > 0.0 { user / system * 100.0 } else { 0.0 };
    println!("CPU utilization: {utilization:.2}");

    if let Some(path) = profile {
        if let Err(err) = write_profile(machine.profiler(), path) {
            eprintln!("unable to write CSV file \"{}\": {err}", path.display());
            process::exit(1);
        }
    }
}

/// Validates a kernel specification of the form FCFS, SJF or RR<slice>.
fn valid_kernel_spec(value: &str) -> Result<String, String> {
    let re = Regex::new(r"^(FCFS|SJF|RR[1-9][0-9]*)$").unwrap();
    if re.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "invalid kernel specification: {value}. Must be FCFS, SJF, or RR<slice>."
        ))
    }
}

fn build_kernel(spec: &str) -> Result<Kernel, String> {
    match spec {
        "FCFS" => Ok(simulator::fcfs()),
        "SJF" => Ok(simulator::sjf()),
        _ => {
            let slice = spec["RR".len()..]
                .parse::<u64>()
                .ok()
                .and_then(NonZeroU64::new)
                .ok_or_else(|| format!("invalid slice time in kernel specification: {spec}"))?;
            Ok(simulator::round_robin(slice))
        }
    }
}

fn write_profile(profiler: &simulator::Profiler, path: &PathBuf) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    profiler.write_csv(&mut out)
}
