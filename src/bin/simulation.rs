//! Motor Simulation
//!
//! Generates physically plausible readings of an industrial motor that wears,
//! fails and gets repaired, for feeding the EdgePHM edge node. Each cycle runs
//! through three phases:
//!
//! - **Normal**: slow random-walk wear; failure probability grows with it
//! - **Fault**: one of four fault types drives the channels until repair time
//!   (overheating, overcurrent, excess vibration, torque loss)
//! - **Repair**: channels converge back to nominal, then Normal again
//!
//! # Usage
//! ```bash
//! # Pipe into the edge node
//! ./simulation --ticks 3000 --speed 0 | ./edge-phm --stdin
//!
//! # Live mode: append to the file the edge node tails, one reading per second
//! ./simulation --format csv --output live_readings.csv
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

// ============================================================================
// Motor Constants
// ============================================================================

/// Nominal current (A)
const NOMINAL_CURRENT: f64 = 5.0;
/// Nominal winding temperature (°C)
const NOMINAL_TEMPERATURE: f64 = 35.0;
/// Nominal vibration (mm/s)
const NOMINAL_VIBRATION: f64 = 0.5;
/// Nominal speed (rpm)
const NOMINAL_RPM: f64 = 1500.0;

/// Physical saturation during a fault
const MAX_TEMPERATURE: f64 = 100.0;
const MAX_CURRENT: f64 = 8.0;
const MAX_VIBRATION: f64 = 2.0;
const MIN_RPM: f64 = 400.0;

/// Fraction of the remaining gap to nominal closed per repair tick
const REPAIR_CONVERGENCE: f64 = 0.15;

/// Base per-tick failure probability and its ceiling
const BASE_FAILURE_PROBABILITY: f64 = 0.0008;
const MAX_FAILURE_PROBABILITY: f64 = 0.08;

/// Ticks a fault lasts before repair starts: [min, max)
const FAULT_DURATION_TICKS: std::ops::Range<u64> = 80..150;

const CSV_HEADER: &str = "timestamp,tick,current,temperature,vibration,rpm,phase,fault,drift_score";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Industrial motor simulation with faults and repairs for EdgePHM")]
#[command(version)]
struct Args {
    /// Number of readings to generate (runs until interrupted if omitted)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Readings per second (0 = as fast as possible)
    #[arg(short, long, default_value_t = 1.0)]
    speed: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Append to this file instead of writing to stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress phase log (only output readings)
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    Overheating,
    Overcurrent,
    ExcessVibration,
    TorqueLoss,
}

impl FaultKind {
    const ALL: [FaultKind; 4] = [
        FaultKind::Overheating,
        FaultKind::Overcurrent,
        FaultKind::ExcessVibration,
        FaultKind::TorqueLoss,
    ];

    fn name(&self) -> &'static str {
        match self {
            FaultKind::Overheating => "overheating",
            FaultKind::Overcurrent => "overcurrent",
            FaultKind::ExcessVibration => "excess_vibration",
            FaultKind::TorqueLoss => "torque_loss",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Normal,
    Fault { kind: FaultKind, repair_at: u64 },
    Repair,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Normal => "normal",
            Phase::Fault { .. } => "fault",
            Phase::Repair => "repair",
        }
    }

    fn fault_name(&self) -> &'static str {
        match self {
            Phase::Fault { kind, .. } => kind.name(),
            _ => "none",
        }
    }
}

// ============================================================================
// Simulation State
// ============================================================================

/// One emitted reading. `tick`, `current`, `temperature` and `vibration` are
/// what the edge node consumes; the rest is ground truth for analysis.
#[derive(Debug, Clone, Serialize)]
struct MotorSample {
    timestamp: String,
    tick: u64,
    current: f64,
    temperature: f64,
    vibration: f64,
    rpm: f64,
    phase: &'static str,
    fault: &'static str,
    drift_score: f64,
}

impl MotorSample {
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{:.3},{:.3},{:.3},{:.2},{},{},{:.3}",
            self.timestamp,
            self.tick,
            self.current,
            self.temperature,
            self.vibration,
            self.rpm,
            self.phase,
            self.fault,
            self.drift_score
        )
    }
}

struct MotorSimulation {
    rng: StdRng,
    tick: u64,
    phase: Phase,
    current: f64,
    temperature: f64,
    vibration: f64,
    rpm: f64,
    /// Degree of anomaly, 0 (healthy) to 1 (faulted)
    drift_score: f64,
    faults: u64,
    repairs: u64,
}

impl MotorSimulation {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            tick: 0,
            phase: Phase::Normal,
            current: NOMINAL_CURRENT,
            temperature: NOMINAL_TEMPERATURE,
            vibration: NOMINAL_VIBRATION,
            rpm: NOMINAL_RPM,
            drift_score: 0.0,
            faults: 0,
            repairs: 0,
        }
    }

    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev) {
            Ok(n) => n.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    /// Advance one tick. Returns the previous phase when it changed.
    fn step(&mut self) -> Option<Phase> {
        let before = self.phase;
        match self.phase {
            Phase::Normal => self.step_normal(),
            Phase::Fault { kind, repair_at } => self.step_fault(kind, repair_at),
            Phase::Repair => self.step_repair(),
        }
        (std::mem::discriminant(&before) != std::mem::discriminant(&self.phase)).then_some(before)
    }

    fn step_normal(&mut self) {
        self.current += self.gauss(0.002, 0.02);
        self.temperature += self.gauss(0.01, 0.05);
        self.vibration += self.gauss(0.001, 0.005);
        self.rpm += self.gauss(0.0, 3.0);

        // Wear shows up as slow heating
        self.drift_score =
            ((self.temperature - NOMINAL_TEMPERATURE) / NOMINAL_TEMPERATURE).clamp(0.0, 1.0);

        let probability = (BASE_FAILURE_PROBABILITY * (1.0 + self.drift_score.powi(2)))
            .min(MAX_FAILURE_PROBABILITY);
        if self.rng.gen::<f64>() < probability {
            let kind = FaultKind::ALL[self.rng.gen_range(0..FaultKind::ALL.len())];
            let repair_at = self.tick + self.rng.gen_range(FAULT_DURATION_TICKS);
            self.phase = Phase::Fault { kind, repair_at };
            self.faults += 1;
        }
    }

    fn step_fault(&mut self, kind: FaultKind, repair_at: u64) {
        match kind {
            FaultKind::Overheating => {
                self.temperature += self.gauss(0.25, 0.2);
                self.current += self.gauss(0.05, 0.08);
                self.rpm -= self.gauss(3.0, 2.0);
            }
            FaultKind::Overcurrent => {
                self.current += self.gauss(0.35, 0.15);
                self.temperature += self.gauss(0.05, 0.08);
                self.rpm -= self.gauss(4.0, 3.0);
            }
            FaultKind::ExcessVibration => {
                self.vibration += self.gauss(0.06, 0.02);
                self.current += self.gauss(0.02, 0.02);
                self.rpm -= self.gauss(8.0, 4.0);
            }
            FaultKind::TorqueLoss => {
                self.rpm -= self.gauss(10.0, 4.0);
                self.current += self.gauss(0.05, 0.05);
                self.vibration += self.gauss(0.01, 0.01);
            }
        }

        self.temperature = self.temperature.min(MAX_TEMPERATURE);
        self.current = self.current.min(MAX_CURRENT);
        self.vibration = self.vibration.min(MAX_VIBRATION);
        self.rpm = self.rpm.max(MIN_RPM);
        self.drift_score = 1.0;

        if self.tick >= repair_at {
            self.phase = Phase::Repair;
        }
    }

    fn step_repair(&mut self) {
        self.current += (NOMINAL_CURRENT - self.current) * REPAIR_CONVERGENCE + self.gauss(0.0, 0.02);
        self.temperature +=
            (NOMINAL_TEMPERATURE - self.temperature) * REPAIR_CONVERGENCE + self.gauss(0.0, 0.1);
        self.vibration +=
            (NOMINAL_VIBRATION - self.vibration) * REPAIR_CONVERGENCE + self.gauss(0.0, 0.01);
        self.rpm += (NOMINAL_RPM - self.rpm) * REPAIR_CONVERGENCE + self.gauss(0.0, 5.0);

        self.drift_score = (self.drift_score - 0.05).max(0.0);

        if (self.current - NOMINAL_CURRENT).abs() < 0.1
            && (self.temperature - NOMINAL_TEMPERATURE).abs() < 1.0
            && (self.vibration - NOMINAL_VIBRATION).abs() < 0.05
        {
            self.phase = Phase::Normal;
            self.drift_score = 0.0;
            self.repairs += 1;
        }
    }

    fn sample(&self) -> MotorSample {
        MotorSample {
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            tick: self.tick,
            current: self.current,
            temperature: self.temperature,
            vibration: self.vibration,
            rpm: self.rpm,
            phase: self.phase.name(),
            fault: self.phase.fault_name(),
            drift_score: self.drift_score,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn log_event(tick: u64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[tick {:>6}] {}", tick, message);
    }
}

fn open_output(args: &Args) -> io::Result<Box<dyn Write>> {
    match &args.output {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let is_new = file.metadata()?.len() == 0;
            let mut writer: Box<dyn Write> = Box::new(io::BufWriter::new(file));
            if is_new && args.format == OutputFormat::Csv {
                writeln!(writer, "{}", CSV_HEADER)?;
            }
            Ok(writer)
        }
        None => {
            let mut writer: Box<dyn Write> = Box::new(io::stdout().lock());
            if args.format == OutputFormat::Csv {
                writeln!(writer, "{}", CSV_HEADER)?;
            }
            Ok(writer)
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut sim = MotorSimulation::new(args.seed);
    let interval = (args.speed > 0.0).then(|| Duration::from_secs_f64(1.0 / args.speed));

    log_event(0, &"=".repeat(60), args.quiet);
    log_event(0, "MOTOR SIMULATION", args.quiet);
    log_event(
        0,
        &format!(
            "  Nominal: {NOMINAL_CURRENT} A | {NOMINAL_TEMPERATURE} °C | {NOMINAL_VIBRATION} mm/s | {NOMINAL_RPM} rpm"
        ),
        args.quiet,
    );
    match args.ticks {
        Some(n) => log_event(0, &format!("  Readings: {n}"), args.quiet),
        None => log_event(0, "  Readings: continuous", args.quiet),
    }
    if let Some(seed) = args.seed {
        log_event(0, &format!("  Random seed: {seed}"), args.quiet);
    }
    log_event(0, &"=".repeat(60), args.quiet);

    let mut out = open_output(&args)?;
    let start_time = Instant::now();

    while args.ticks.map_or(true, |n| sim.tick < n) {
        let loop_start = Instant::now();

        if let Some(previous) = sim.step() {
            let message = match sim.phase {
                Phase::Fault { kind, repair_at } => format!(
                    ">>> FAULT: {} (repair at tick {repair_at})",
                    kind.name()
                ),
                Phase::Repair => ">>> REPAIR started".to_string(),
                Phase::Normal => format!(">>> NORMAL again (after {})", previous.name()),
            };
            log_event(sim.tick, &message, args.quiet);
        }

        let sample = sim.sample();
        match args.format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&sample)?)?,
            OutputFormat::Csv => writeln!(out, "{}", sample.to_csv_row())?,
        }
        out.flush()?;

        sim.tick += 1;

        if let Some(interval) = interval {
            let elapsed = loop_start.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    out.flush()?;
    drop(out);

    log_event(sim.tick, &"=".repeat(60), args.quiet);
    log_event(sim.tick, "SIMULATION COMPLETE", args.quiet);
    log_event(sim.tick, &format!("Readings: {}", sim.tick), args.quiet);
    log_event(sim.tick, &format!("Faults: {} | Repairs: {}", sim.faults, sim.repairs), args.quiet);
    log_event(
        sim.tick,
        &format!("Real time: {:.1}s", start_time.elapsed().as_secs_f64()),
        args.quiet,
    );

    Ok(())
}
