use crate::config::StoreConfig;
use crate::observation_model::{PointId, Sequence};
use crate::store::ObservationStore;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

const USAGE: &str =
    "usage: shopfloor-store --config <path> [--input <path>] [--at <seq>] [--sample <from>:<count>]";

/// Parsed command line of the replay binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayArgs {
    pub config: String,
    pub input: Option<String>,
    pub at: Option<Sequence>,
    pub sample: Option<(Sequence, usize)>,
}

impl ReplayArgs {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut parsed = ReplayArgs::default();
        let mut config = None;
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match flag.as_str() {
                "--config" => config = Some(value()?),
                "--input" => parsed.input = Some(value()?),
                "--at" => {
                    let raw = value()?;
                    parsed.at = Some(
                        raw.parse()
                            .with_context(|| format!("--at must be a sequence number, got '{raw}'"))?,
                    );
                }
                "--sample" => parsed.sample = Some(parse_sample(&value()?)?),
                other => bail!("unknown argument '{other}'\n{USAGE}"),
            }
        }
        parsed.config = config.ok_or_else(|| anyhow!("--config is required\n{USAGE}"))?;
        Ok(parsed)
    }
}

fn parse_sample(raw: &str) -> Result<(Sequence, usize)> {
    let (from, count) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("--sample expects <from>:<count>, got '{raw}'"))?;
    let from: Sequence = from
        .parse()
        .with_context(|| format!("invalid sample start '{from}'"))?;
    let count: usize = count
        .parse()
        .with_context(|| format!("invalid sample count '{count}'"))?;
    Ok((from, count))
}

/// Replays observation lines into a store and prints its state as JSON.
pub fn run() -> Result<()> {
    let args = ReplayArgs::parse(env::args().skip(1))?;
    let config = StoreConfig::load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config))?;
    let store = ObservationStore::open(config)?;

    let ingested = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {path}"))?;
            ingest_lines(&store, BufReader::new(file))?
        }
        None => ingest_lines(&store, io::stdin().lock())?,
    };
    if ingested == 0 {
        eprintln!("warning: no observation lines ingested");
    }

    let report = render_report(&store, &args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Ingests `timestamp|point_id|payload` lines, skipping blanks and `#` comments.
/// Returns the number of lines ingested.
pub fn ingest_lines<R: BufRead>(store: &ObservationStore, reader: R) -> Result<usize> {
    let mut ingested = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, '|');
        let (Some(timestamp), Some(point_id), Some(payload)) =
            (fields.next(), fields.next(), fields.next())
        else {
            bail!("line {}: expected timestamp|point_id|payload", index + 1);
        };
        store
            .ingest(&PointId::from(point_id.trim()), timestamp.trim(), payload)
            .with_context(|| format!("line {}", index + 1))?;
        ingested += 1;
    }
    Ok(ingested)
}

/// Builds the JSON document the binary prints.
pub fn render_report(store: &ObservationStore, args: &ReplayArgs) -> Result<Value> {
    let state = match args.at {
        Some(sequence) => store.current_at(sequence)?,
        None => store.current_all(),
    };
    let mut report = json!({
        "header": store.sequence_info(),
        "current": state,
        "telemetry": store.telemetry(),
    });
    if let Some((from, count)) = args.sample {
        report["sample"] = serde_json::to_value(store.range(from, count))?;
    }
    Ok(report)
}
