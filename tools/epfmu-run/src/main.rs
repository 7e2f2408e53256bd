// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! epfmu-run - drive an unpacked EnergyPlus FMU from the command line
//!
//! Acts as a minimal co-simulation master: instantiates the FMU, holds the
//! inputs given with `--input` constant for the whole run, steps from start
//! to stop and prints every output at every communication point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use epfmu::{
    AdapterConfig, Causality, FmiVersion, Instance, InstanceContext, InstantiateRequest,
    MemorySink, ModelDescription, Status,
};
use serde::Serialize;

/// Run an EnergyPlus FMU without a master
#[derive(Parser, Debug)]
#[command(name = "epfmu-run")]
#[command(version)]
#[command(about = "Run an unpacked EnergyPlus FMU and print its outputs")]
struct Args {
    /// Folder holding modelDescription.xml and resources/
    fmu: PathBuf,

    /// Instance name (also names the output folder)
    #[arg(short, long, default_value = "epfmu-run")]
    name: String,

    /// Constant input, as value reference and value: `1=21.5`
    #[arg(short, long = "input", value_parser = parse_input)]
    inputs: Vec<(u32, f64)>,

    /// Start time in seconds
    #[arg(long, default_value = "0")]
    start: f64,

    /// Stop time in seconds (start plus whole days)
    #[arg(long, default_value = "86400")]
    stop: f64,

    /// Adapter configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation executable, overrides the configuration
    #[arg(long)]
    energyplus: Option<String>,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn parse_input(text: &str) -> Result<(u32, f64), String> {
    let (vr, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected VR=VALUE, got '{}'", text))?;
    let vr = vr
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad value reference '{}': {}", vr, e))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad value '{}': {}", value, e))?;
    Ok((vr, value))
}

#[derive(Debug, Serialize)]
struct Row {
    time: f64,
    values: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct Report {
    model: String,
    fmi_version: String,
    step_size: f64,
    outputs: Vec<String>,
    rows: Vec<Row>,
    notices: Vec<String>,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok(report) if args.json => print_json(&report),
        Ok(report) => print_table(&report),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Args) -> Result<AdapterConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AdapterConfig::from_yaml_str(&std::fs::read_to_string(path)?)?,
        None => AdapterConfig::from_env(),
    };
    if let Some(program) = &args.energyplus {
        config = config.with_simulation_program(program.clone());
    }
    config.validate()?;
    Ok(config)
}

fn resource_location(fmu: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let fmu = fmu.canonicalize()?;
    Ok(format!("file://{}", fmu.join("resources").display()))
}

fn run(args: &Args) -> Result<Report, Box<dyn std::error::Error>> {
    let model = ModelDescription::load(&args.fmu.join("modelDescription.xml"))?;
    let version = FmiVersion::from_attribute(&model.fmi_version)
        .ok_or_else(|| format!("unsupported fmiVersion '{}'", model.fmi_version))?;

    let inputs: HashMap<u32, f64> = args.inputs.iter().copied().collect();
    for vr in inputs.keys() {
        if !model
            .variables_with(Causality::Input)
            .any(|v| v.value_reference == *vr)
        {
            return Err(format!("value reference {} is not an input of {}", vr, model.model_identifier).into());
        }
    }
    let input_refs: Vec<u32> = model
        .variables_with(Causality::Input)
        .map(|v| v.value_reference)
        .collect();
    let input_values: Vec<f64> = input_refs
        .iter()
        .map(|vr| inputs.get(vr).copied().unwrap_or(0.0))
        .collect();
    let (output_refs, output_names): (Vec<u32>, Vec<String>) = model
        .variables_with(Causality::Output)
        .map(|v| (v.value_reference, v.name.clone()))
        .unzip();

    let sink = Arc::new(MemorySink::new());
    let ctx = InstanceContext::native(load_config(args)?, sink.clone());
    let location = resource_location(&args.fmu)?;
    let request = InstantiateRequest {
        name: &args.name,
        token: &model.guid,
        resource_location: &location,
        version,
        visible: false,
        logging_on: false,
    };

    let mut instance = Instance::instantiate(&request, ctx)?;
    let rows = simulate(&mut instance, args, &input_refs, &input_values, &output_refs);
    let closed = instance.terminate().and_then(|_| instance.free());
    let rows = rows?;
    closed?;

    Ok(Report {
        model: model.model_identifier.clone(),
        fmi_version: model.fmi_version.clone(),
        step_size: instance.step_size(),
        outputs: output_names,
        rows,
        notices: sink
            .records()
            .into_iter()
            .filter(|(status, _)| *status != Status::Ok)
            .map(|(status, message)| format!("{}: {}", status, message))
            .collect(),
    })
}

fn simulate(
    instance: &mut Instance,
    args: &Args,
    input_refs: &[u32],
    input_values: &[f64],
    output_refs: &[u32],
) -> epfmu::Result<Vec<Row>> {
    instance.setup_experiment(None, args.start, args.stop, true)?;
    instance.enter_initialization_mode()?;
    instance.exit_initialization_mode()?;

    let step = instance.step_size();
    let steps = ((args.stop - args.start) / step).round() as u64;
    log::info!("running {} steps of {} s", steps, step);

    let mut rows = Vec::with_capacity(steps as usize);
    let mut values = vec![0.0; output_refs.len()];
    for k in 0..steps {
        let time = args.start + k as f64 * step;
        instance.set_real(input_refs, input_values)?;
        instance.do_step(time, step, true)?;
        instance.get_real(output_refs, &mut values)?;
        rows.push(Row {
            time: time + step,
            values: values.clone(),
        });
    }
    Ok(rows)
}

fn print_table(report: &Report) {
    println!();
    println!("{}", format!("=== {} (FMI {}) ===", report.model, report.fmi_version).bold());
    println!("  {} {} s", "Step size:".cyan(), report.step_size);
    println!("  {} {}", "Points:".cyan(), report.rows.len());
    println!();

    let mut header = format!("{:>12}", "time");
    for name in &report.outputs {
        header.push_str(&format!(" {:>16}", name));
    }
    println!("{}", header.bold());
    for row in &report.rows {
        let mut line = format!("{:>12.1}", row.time);
        for value in &row.values {
            line.push_str(&format!(" {:>16.6}", value));
        }
        println!("{}", line);
    }

    if !report.notices.is_empty() {
        println!();
        println!("{}", "--- Notices ---".dimmed());
        for notice in &report.notices {
            println!("  {}", notice.yellow());
        }
    }
    println!();
}

fn print_json(report: &Report) {
    match serde_json::to_string_pretty(report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
    }
}
