use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, trace, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use flock_engine::{FlockConfig, FlockSimulation, MetricsSnapshot, OutputFormat};

/// Headless runner for the flocking simulation.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the number of ticks from the config
    #[arg(short, long)]
    ticks: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Flock Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let config = FlockConfig::load(&args.config)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = FlockSimulation::new(config).context("Invalid simulation configuration")?;
    debug!("Simulation Parameters: {:#?}", sim.params());

    // --- Simulation Loop ---
    let total_ticks = args.ticks.unwrap_or(sim.config().run.ticks);
    let mut record_interval = sim.config().run.record_interval;
    if record_interval == 0 {
        warn!("Record interval is 0. Recording every tick.");
        record_interval = 1;
    }
    info!("Recording snapshot every {} ticks.", record_interval);
    info!("Starting simulation loop for {} ticks...", total_ticks);

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;

    // --- Initial Snapshot (tick 0) ---
    sim.record_snapshot();

    for tick in 0..total_ticks {
        let step_start_time = Instant::now();
        sim.step();
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_tick = (tick + 1) % record_interval == 0;
        let is_last_tick = tick + 1 == total_ticks;

        if is_record_tick || is_last_tick {
            sim.record_snapshot();
        }

        if should_print_status || is_last_tick {
            info!(
                "Tick [{}/{}] (t={:.2}) | Polarization: {:.3} | Mean Speed: {:.3} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                tick + 1,
                total_ticks,
                sim.time(),
                sim.polarization(),
                sim.mean_speed(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;
        } else {
            trace!(
                "Tick [{}/{}] completed in {:.2} ms",
                tick + 1,
                total_ticks,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    let output = &sim.config().output;
    if output.save_metrics {
        save_metrics(sim.recorded_snapshots(), &output.base_filename, output.format)?;
    } else {
        info!("Skipping saving metrics as per config.");
    }

    if output.save_final_agents {
        save_final_agents(&sim, &output.base_filename)?;
    } else {
        info!("Skipping saving final agents as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_metrics(snapshots: &[MetricsSnapshot], base_filename: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let filename = format!("{}_metrics.json", base_filename);
            let json_string = serde_json::to_string(snapshots).context("Failed to serialize metrics to JSON")?;
            let mut file = File::create(&filename).with_context(|| format!("Failed to create '{}'", filename))?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("Failed to write '{}'", filename))?;
            info!("{} snapshots saved to {}", snapshots.len(), filename);
        }
        OutputFormat::Bincode => {
            let filename = format!("{}_metrics.bin", base_filename);
            let file = File::create(&filename).with_context(|| format!("Failed to create '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)
                .context("Failed to serialize metrics to bincode")?;
            info!("{} snapshots saved to {} (binary format)", snapshots.len(), filename);
        }
        OutputFormat::Messagepack => {
            let filename = format!("{}_metrics.msgpack", base_filename);
            let file = File::create(&filename).with_context(|| format!("Failed to create '{}'", filename))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, snapshots).context("Failed to serialize metrics to MessagePack")?;
            writer.flush()?;
            info!("{} snapshots saved to {} (MessagePack format)", snapshots.len(), filename);
        }
    }
    Ok(())
}

fn save_final_agents(sim: &FlockSimulation, base_filename: &str) -> Result<()> {
    let filename = format!("{}_final_agents.csv", base_filename);
    let mut writer = csv::Writer::from_path(&filename).with_context(|| format!("Failed to create '{}'", filename))?;
    writer.write_record(["x", "y", "vx", "vy", "kind", "leader", "energy"])?;
    for agent in sim.agents() {
        writer.write_record(&[
            format!("{:.4}", agent.position.x),
            format!("{:.4}", agent.position.y),
            format!("{:.4}", agent.velocity.x),
            format!("{:.4}", agent.velocity.y),
            format!("{:?}", agent.kind),
            agent.is_leader.to_string(),
            format!("{:.4}", agent.energy),
        ])?;
    }
    writer.flush()?;
    info!("Final agents saved to {}", filename);
    Ok(())
}
