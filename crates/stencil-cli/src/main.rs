use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use stencil_sched::{Bindings, Options};

/// stencilc: schedule stencil equations into loop nests
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input problem file (JSON)
    input: PathBuf,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep every cluster in its own loop nest
    #[arg(long)]
    no_fusion: bool,

    /// Never tag loops as vectorizable
    #[arg(long)]
    no_vectorize: bool,

    /// Stride for conditional dimensions declared without factor or condition
    #[arg(long, default_value_t = 1)]
    default_factor: i64,

    /// Dump the parsed program to stderr before scheduling
    #[arg(long)]
    emit_program: bool,

    /// Also print the executed equation instances
    #[arg(long)]
    trace: bool,

    /// Parameter or scalar value for --trace, as name=value
    #[arg(long = "bind", value_name = "NAME=VALUE", value_parser = parse_binding)]
    bindings: Vec<(String, i64)>,
}

fn parse_binding(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid binding '{s}', expected name=value"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value '{value}' for '{name}'"))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read problem file.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    // 2. Parse to IR.
    let program = stencil_parser::parse(&source)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("problem parse failed")?;

    if cli.emit_program {
        eprintln!("{}", stencil_ir::dump_program(&program));
    }

    // 3. Schedule.
    let options = Options {
        default_factor: cli.default_factor,
        fusion: !cli.no_fusion,
        vectorize: !cli.no_vectorize,
    };
    let tree = stencil_sched::schedule(&program, &options)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("scheduling failed")?;
    let mut text = tree.dump(&program.dimensions);

    // 4. Optionally trace.
    if cli.trace {
        let bindings: Bindings = cli.bindings.into_iter().collect();
        let events = stencil_sched::trace(&tree, &program.dimensions, &bindings)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err("trace failed")?;
        text.push_str("\nTrace:\n");
        for event in &events {
            let point: Vec<String> = event
                .point
                .iter()
                .map(|(name, v)| format!("{name}={v}"))
                .collect();
            let index: Vec<String> = event.index.iter().map(i64::to_string).collect();
            text.push_str(&format!(
                "  e{} @ {}: {}[{}]\n",
                event.equation,
                point.join(" "),
                event.tensor,
                index.join(", ")
            ));
        }
    } else if !cli.bindings.is_empty() {
        log::warn!("--bind has no effect without --trace");
    }

    // 5. Write output.
    match &cli.output {
        Some(path) => std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }

    Ok(())
}
