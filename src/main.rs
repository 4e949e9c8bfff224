//! `actix` command-line tool: browse, evaluate, export and fit activations.

use actix::config::ActivationConfig;
use actix::curve::Curve;
use actix::fit::{fit, sample_inputs, FitOptions};
use actix::functional::Activation;
use actix::registry::ActivationKind;
use actix::serialization::save_activation;
use clap::{Parser, Subcommand, ValueEnum};
use ndarray::{Array1, ArrayD};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Parametric and static activation functions", long_about = None)]
struct Args {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every activation and its parameters
    List,
    /// Evaluate an activation and its derivative at the given points
    Eval {
        name: String,
        #[arg(required = true, allow_negative_numbers = true)]
        x: Vec<f32>,
        /// Parameter override, e.g. `--param alpha=0.5`
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f32)>,
        /// Read parameters from a JSON config instead
        #[arg(long, conflicts_with = "params")]
        config: Option<PathBuf>,
    },
    /// Sample a curve and print it as CSV or JSON
    Curve {
        name: String,
        #[arg(long, default_value_t = -5.0, allow_negative_numbers = true)]
        from: f32,
        #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
        to: f32,
        #[arg(long, default_value_t = 201)]
        steps: usize,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f32)>,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fit a parametric activation to the curve of another one
    Fit {
        name: String,
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = 500)]
        epochs: usize,
        #[arg(long, default_value_t = 0.05)]
        lr: f32,
        #[arg(long, default_value_t = 0.9)]
        momentum: f32,
        #[arg(long, default_value_t = 256)]
        samples: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Save the fitted parameters (.json config or .safetensors)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Plot activations in a window
    #[cfg(feature = "viewer")]
    Show {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long, default_value_t = -5.0, allow_negative_numbers = true)]
        from: f32,
        #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
        to: f32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn parse_param(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value.trim().parse::<f32>().map_err(|e| format!("bad value for '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn build_config(name: &str, params: &[(String, f32)]) -> Result<ActivationConfig, Box<dyn std::error::Error>> {
    let mut config = ActivationConfig::new(name.parse::<ActivationKind>()?);
    for (param, value) in params {
        config.set_param(param, *value)?;
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Command::List => {
            for &kind in ActivationKind::ALL {
                let params: Vec<String> =
                    kind.parameters().iter().map(|p| format!("{}={}", p.name, p.default)).collect();
                if params.is_empty() {
                    println!("{:<42} {}", kind.display_name(), kind.name());
                } else {
                    println!("{:<42} {} [{}]", kind.display_name(), kind.name(), params.join(", "));
                }
            }
        }
        Command::Eval { name, x, params, config } => {
            let config = match config {
                Some(path) => ActivationConfig::load(path)?,
                None => build_config(&name, &params)?,
            };
            let act = Activation::from_config(&config)?;
            let x: ArrayD<f32> = Array1::from(x).into_dyn();
            let (y, dy) = (act.forward(&x), act.derivative(&x));
            println!("{:>12} {:>14} {:>14}", "x", "f(x)", "f'(x)");
            for ((x, y), dy) in x.iter().zip(y.iter()).zip(dy.iter()) {
                println!("{x:>12.4} {y:>14.6} {dy:>14.6}");
            }
        }
        Command::Curve { name, from, to, steps, format, params, output } => {
            let act = Activation::from_config(&build_config(&name, &params)?)?;
            let curve = Curve::sample(&act, from, to, steps)?;
            let text = match format {
                Format::Csv => curve.to_csv(),
                Format::Json => curve.to_json()?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    tracing::info!(path = %path.display(), points = curve.len(), "curve written");
                }
                None => print!("{text}"),
            }
        }
        Command::Fit { name, target, epochs, lr, momentum, samples, seed, output } => {
            let start = ActivationConfig::new(name.parse()?);
            let target = Activation::new(target.parse()?);
            let xs = sample_inputs(samples, -4.0, 4.0, seed)?;
            let targets = target.forward(&xs);

            let options = FitOptions { epochs, learning_rate: lr, momentum, log_every: (epochs / 10).max(1) };
            let started = Instant::now();
            let report = fit(&start, &xs, &targets, &options)?;
            tracing::info!(elapsed = ?started.elapsed(), "done");

            println!("loss: {:.6} -> {:.6}", report.initial_loss, report.final_loss);
            println!("{}", report.config.to_json_string()?);
            if let Some(path) = output {
                if path.extension().is_some_and(|ext| ext == "safetensors") {
                    save_activation(&path, &report.config)?;
                } else {
                    report.config.save(&path)?;
                }
            }
        }
        #[cfg(feature = "viewer")]
        Command::Show { names, from, to } => {
            let curves = names
                .iter()
                .map(|name| {
                    let act = Activation::new(name.parse()?);
                    Curve::sample(&act, from, to, 400)
                })
                .collect::<actix::error::Result<Vec<_>>>()?;
            actix::viewer::show(curves)?;
        }
    }
    Ok(())
}
