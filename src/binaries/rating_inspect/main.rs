use anyhow::bail;
use clap::Parser;
use ratingpack_store::PackedRatingStore;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    #[clap(long)]
    pub path: String,

    /// print the ratings of this user
    #[clap(long)]
    pub user: Option<u64>,

    /// print the ratings of this item
    #[clap(long)]
    pub item: Option<u64>,

    /// only show ratings before this timestamp
    #[clap(long)]
    pub before: Option<u64>,

    /// check record order and index consistency while opening
    #[clap(long)]
    pub verify: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    info!("config: {:?}", config);
    if config.path.is_empty() {
        bail!("path MUST not be empty");
    }

    let options = ratingpack_store::ReadOptions {
        verify: config.verify,
    };
    let mut store = PackedRatingStore::open_with(&config.path, options)?;
    println!("{}", store.describe());

    if let Some(ts) = config.before {
        store = store.create_windowed_view(ts)?;
        println!("window: {} records before {}", store.len(), ts);
    }

    println!(
        "records: {}, users: {}, items: {}",
        store.len(),
        store.user_ids().len(),
        store.item_ids().len()
    );

    if let Some(user) = config.user {
        match store.events_for_user(user) {
            Some(history) => {
                for r in history.iter() {
                    println!("{}", r);
                }
            }
            None => println!("user {} not found", user),
        }
    }

    if let Some(item) = config.item {
        match store.events_for_item(item) {
            Some(events) => {
                for r in events.iter() {
                    println!("{}", r);
                }
            }
            None => println!("item {} not found", item),
        }
    }

    Ok(())
}
