/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error;

use aws_config::BehaviorVersion;
use aws_dynamodb_admin::browser::{PageRequest, TableBrowser};
use aws_dynamodb_admin::config::{BatchSize, PagingConfig};
use aws_dynamodb_admin::expression::FilterCriterion;
use aws_dynamodb_admin::key::Cursor;
use aws_dynamodb_admin::types::{AccessMode, ScalarType, Selection};
use clap::{CommandFactory, Parser};

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "browse")]
#[command(about = "Prints one page of a DynamoDB table, or lists tables when no table is given.")]
pub struct Args {
    /// Table to browse
    table: Option<String>,

    /// `scan` or `query`
    #[arg(long, default_value = "scan")]
    mode: AccessMode,

    /// Secondary index to read instead of the table
    #[arg(long, default_value = "table")]
    index: String,

    /// Filter criteria as JSON, e.g. `[{"attribute":"year","operator":"=","value":"2013","type":"N"}]`
    #[arg(long)]
    filters: Option<String>,

    /// Items per page
    #[arg(long, default_value_t = 25)]
    page_size: usize,

    /// Items evaluated per physical call; defaults to the page size within 100..=1000
    #[arg(long)]
    batch_size: Option<i32>,

    /// Cursor printed by a previous run
    #[arg(long)]
    start: Option<String>,

    /// Custom endpoint, e.g. `http://localhost:8000` for DynamoDB local
    #[arg(long)]
    endpoint_url: Option<String>,
}

fn invalid_arg(message: &str) -> ! {
    Args::command()
        .error(clap::error::ErrorKind::InvalidValue, message)
        .exit()
}

fn setup_tracing_subscriber() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt::fmt().with_env_filter(filter).init();
}

fn render(value: &aws_sdk_dynamodb::types::AttributeValue) -> String {
    ScalarType::of(value)
        .and_then(|scalar_type| scalar_type.render(value))
        .unwrap_or_else(|| format!("{value:?}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing_subscriber();
    let args = Args::parse();

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint_url) = &args.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    let sdk_config = loader.load().await;

    let batch_size = args.batch_size.map_or(BatchSize::Auto, BatchSize::Explicit);
    let browser = TableBrowser::builder()
        .sdk_config(sdk_config)
        .paging(
            PagingConfig::builder()
                .default_page_size(args.page_size)
                .physical_batch_size(batch_size)
                .build(),
        )
        .build();

    let Some(table) = args.table.clone() else {
        for name in browser.list_all_tables().await? {
            println!("{name}");
        }
        return Ok(());
    };

    let filters: Vec<FilterCriterion> = match &args.filters {
        Some(json) => serde_json::from_str(json)
            .unwrap_or_else(|e| invalid_arg(&format!("invalid filters: {e}"))),
        None => Vec::new(),
    };
    let start = match &args.start {
        Some(encoded) => {
            Some(Cursor::decode(encoded).unwrap_or_else(|e| invalid_arg(&e.to_string())))
        }
        None => None,
    };

    let page = browser
        .browse(
            PageRequest::new(table, args.mode)
                .selection(Selection::parse(&args.index))
                .filters(filters)
                .start(start),
        )
        .await?;

    println!("{}", page.columns().join("\t"));
    for item in page.items() {
        let row: Vec<String> = page
            .columns()
            .iter()
            .map(|column| item.item().get(column).map(render).unwrap_or_default())
            .collect();
        println!("{}\t[{}]", row.join("\t"), item.key_token());
    }
    match page.next_cursor() {
        Some(cursor) => println!("next page: --start {}", cursor.encode()),
        None => println!("end of table"),
    }
    Ok(())
}
