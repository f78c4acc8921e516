use std::env;
use std::str::FromStr;
use std::sync::Arc;

use household_survey_core::domains::core::kv_store::{KeyValueStore, SqliteKeyValueStore, HOUSEHOLDS_KEY};
use household_survey_core::domains::household::repository::{HouseholdRepository, KvHouseholdRepository};
use household_survey_core::domains::sync::status_journal::StatusJournal;
use household_survey_core::types::format_timestamp;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Usage: debug_queue [sqlite-url]
/// Falls back to HSC_DATABASE_URL (a `.env` file is read if present).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    println!("Household Queue Debug Tool");
    println!("==========================");

    let database_url = match env::args().nth(1).or_else(|| env::var("HSC_DATABASE_URL").ok()) {
        Some(url) => url,
        None => {
            eprintln!("No database given. Pass a sqlite URL or set HSC_DATABASE_URL.");
            std::process::exit(1);
        }
    };
    println!("Database: {}", database_url);

    let options = SqliteConnectOptions::from_str(&database_url)?.read_only(true);
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;

    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(pool));
    let raw_size = store.get(HOUSEHOLDS_KEY).await?.map_or(0, |b| b.len());
    let repo = KvHouseholdRepository::new(store.clone());
    let journal = StatusJournal::open(store).await;

    print_queue(&repo, raw_size).await;
    print_sync_status(&journal).await;

    println!("\nDone.");
    Ok(())
}

async fn print_queue(repo: &KvHouseholdRepository, raw_size: usize) {
    println!("\nQUEUED HOUSEHOLDS");
    println!("-----------------");
    println!("Stored blob: {} bytes", raw_size);

    let loaded = repo.list_valid().await;
    if let Some(err) = &loaded.load_error {
        println!("Load error: {}", err);
    }
    println!("Valid records: {}", loaded.records.len());

    for record in &loaded.records {
        let when = record
            .timestamp
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<24} {:<10} / {:<16} score {:>2} ({})  {}",
            record.id,
            record.head_details.name,
            record.sub_location,
            record.village,
            record.poverty_score,
            record.vulnerability().as_str(),
            when
        );
    }
}

async fn print_sync_status(journal: &StatusJournal) {
    println!("\nLAST SYNC");
    println!("---------");
    let view = journal.view().await;
    match (view.message, view.category) {
        (Some(message), Some(category)) => println!("[{:?}] {}", category, message),
        _ => println!("No sync has been recorded."),
    }
}
