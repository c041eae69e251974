use clap::{ArgAction, Parser};
use quaternion_averaging::prelude::*;
use rotations::prelude::*;
use serde::Deserialize;
use std::{fs::File, io::Read, path::PathBuf, process::ExitCode};
use thiserror::Error;
use tracing::{info, Level};

#[derive(Debug, Error)]
enum CliErrors {
    #[error("{0}")]
    Averaging(#[from] AveragingErrors),
    #[error("{0}")]
    Config(#[from] ConfigErrors),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("row {0} has no weight, --weighted needs a weight on every row")]
    MissingWeight(usize),
}

/// Averages the unit quaternions in a CSV file.
#[derive(Debug, Parser)]
#[command(name = "qavg", version)]
struct Args {
    /// CSV file with a header row and columns x, y, z, w and optionally weight
    input: PathBuf,

    /// Weight each quaternion by the weight column
    #[arg(short, long)]
    weighted: bool,

    /// RON file with averaging settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective settings as RON before averaging
    #[arg(long)]
    show_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Deserialize)]
struct Record {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
    weight: Option<f64>,
}

/// Reads quaternion rows and their optional weights.
fn read_records<R: Read>(reader: R) -> Result<(Vec<Quaternion>, Vec<Option<f64>>), CliErrors> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut quaternions = Vec::new();
    let mut weights = Vec::new();
    for record in reader.deserialize() {
        let record: Record = record?;
        quaternions.push(Quaternion::new(record.x, record.y, record.z, record.w));
        weights.push(record.weight);
    }
    Ok((quaternions, weights))
}

fn required_weights(weights: &[Option<f64>]) -> Result<Vec<f64>, CliErrors> {
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| w.ok_or(CliErrors::MissingWeight(i)))
        .collect()
}

fn run(args: &Args) -> Result<UnitQuaternion, CliErrors> {
    let config = match &args.config {
        Some(path) => AveragingConfig::from_file(path)?,
        None => AveragingConfig::default(),
    };
    let averager = QuaternionAverager::new(config)?;
    if args.show_config {
        println!("{}", averager.config().to_ron_string()?);
    }

    let (quaternions, weights) = read_records(File::open(&args.input)?)?;
    info!(n = quaternions.len(), input = %args.input.display(), "read quaternions");

    let average = if args.weighted {
        let weights = required_weights(&weights)?;
        averager.weighted_average(&quaternions, &weights)?
    } else {
        averager.average(&quaternions)?
    };
    Ok(average)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(q) => {
            println!("Average Quaternion:");
            println!("  x: {}", q.0.x);
            println!("  y: {}", q.0.y);
            println!("  z: {}", q.0.z);
            println!("  w: {}", q.0.w);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("qavg: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTED: &str = "x, y, z, w, weight
-0.3061862, -0.1767767, -0.3061862, -0.8838835, 2
0.5915064, 0.1584936, 0.591506, 0.5245191, 1
";

    #[test]
    fn test_read_records_with_weights() {
        let (quaternions, weights) = read_records(WEIGHTED.as_bytes()).unwrap();
        assert_eq!(quaternions.len(), 2);
        assert_eq!(quaternions[0].w, -0.8838835);
        assert_eq!(weights, vec![Some(2.0), Some(1.0)]);

        let q = weighted_average(&quaternions, &required_weights(&weights).unwrap()).unwrap();
        assert!((q.0.x - 0.4111).abs() < 1e-4);
        assert!((q.0.w - 0.7943).abs() < 1e-4);
    }

    #[test]
    fn test_read_records_without_weight_column() {
        let csv = "x,y,z,w\n0,0,0,1\n1,0,0,0\n";
        let (quaternions, weights) = read_records(csv.as_bytes()).unwrap();
        assert_eq!(quaternions[1], Quaternion::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(weights, vec![None, None]);
        assert!(matches!(
            required_weights(&weights),
            Err(CliErrors::MissingWeight(0))
        ));
    }

    #[test]
    fn test_read_records_bad_row() {
        let csv = "x,y,z,w\n0,0,zero,1\n";
        assert!(matches!(read_records(csv.as_bytes()), Err(CliErrors::Csv(_))));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["qavg", "poses.csv", "--weighted", "-vv"]).unwrap();
        assert_eq!(args.input, PathBuf::from("poses.csv"));
        assert!(args.weighted);
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());
        assert!(!args.show_config);

        let args = Args::try_parse_from(["qavg", "poses.csv", "--show-config"]).unwrap();
        assert!(args.show_config);
    }
}
