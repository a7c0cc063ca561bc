use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use common_base::rating::Rating;
use ratingpack_store::format::FormatFlags;
use ratingpack_store::RatingPacker;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    /// delimited text file with one `user,item,value[,timestamp]` rating per line
    #[clap(long)]
    pub input: String,

    #[clap(long)]
    pub output: String,

    #[clap(long, default_value = ",")]
    pub delimiter: String,

    /// store timestamps and order the records by them
    #[clap(long)]
    pub timestamps: bool,
}

fn parse_line(line: &str, delimiter: &str, timestamps: bool) -> anyhow::Result<Rating> {
    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if fields.len() < 3 {
        bail!("expected at least 3 fields, found {}", fields.len());
    }

    let user = fields[0].parse::<u64>().context("invalid user id")?;
    let item = fields[1].parse::<u64>().context("invalid item id")?;
    let value = fields[2].parse::<f64>().context("invalid value")?;

    match fields.get(3) {
        Some(ts) if !ts.is_empty() => {
            let ts = ts.parse::<u64>().context("invalid timestamp")?;
            Ok(Rating::with_timestamp(user, item, value, ts))
        }
        _ if timestamps => Err(anyhow!("missing timestamp")),
        _ => Ok(Rating::new(user, item, value)),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    info!("config: {:?}", config);
    if config.delimiter.is_empty() {
        bail!("delimiter MUST not be empty");
    }

    let flags = if config.timestamps {
        FormatFlags::TIMESTAMPS
    } else {
        FormatFlags::empty()
    };

    let input = File::open(&config.input).with_context(|| format!("open {}", config.input))?;
    let mut packer = RatingPacker::open(&config.output, flags)?;

    for (i, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let rating = parse_line(&line, &config.delimiter, config.timestamps)
            .with_context(|| format!("{}:{}", config.input, i + 1))?;
        packer.write_rating(&rating)?;
    }

    let count = packer.rating_count();
    packer.close()?;
    info!("wrote {} ratings to {}", count, config.output);

    Ok(())
}
