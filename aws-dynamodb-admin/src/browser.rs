/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeSet;

use aws_sdk_dynamodb::config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_types::SdkConfig;
use tracing::Instrument;

use crate::config::PagingConfig;
use crate::error::{Error, ValidationError};
use crate::expression::{compile, FilterCriterion, Operator};
use crate::key::{compose_key, decode_token, encode_token, Cursor, StructuredKey};
use crate::page::{fetch_page, PhysicalQuery};
use crate::schema::{KeySchema, TableSchema};
use crate::store::DynamoApi;
use crate::types::{AccessMode, Item, Selection};

/// Fluent style builder for [`TableBrowser`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    client: Option<Client>,
    sdk_config: Option<SdkConfig>,
    paging: PagingConfig,
}

impl Builder {
    /// Use an existing DynamoDB client. Takes precedence over [`Builder::sdk_config`].
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the configuration used to construct the DynamoDB client
    pub fn sdk_config(mut self, config: SdkConfig) -> Self {
        self.sdk_config = Some(config);
        self
    }

    /// Paging behavior. Default is [`PagingConfig::default`].
    pub fn paging(mut self, paging: PagingConfig) -> Self {
        self.paging = paging;
        self
    }

    /// Consumes the builder and constructs a [`TableBrowser`]
    pub fn build(self) -> TableBrowser {
        self.into()
    }
}

impl From<Builder> for TableBrowser {
    fn from(value: Builder) -> Self {
        let api = value.client.unwrap_or_else(|| {
            let sdk_config = value.sdk_config.unwrap_or_else(|| {
                SdkConfig::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .build()
            });
            Client::new(&sdk_config)
        });
        Self {
            api,
            paging: value.paging,
        }
    }
}

/// Browse and edit DynamoDB tables one logical page at a time.
///
/// Each call describes the table first, so key schemas are never stale.
#[derive(Debug, Clone)]
pub struct TableBrowser<A = Client> {
    api: A,
    paging: PagingConfig,
}

impl TableBrowser {
    /// Create a new [`Builder`]
    pub fn builder() -> Builder {
        Builder::default()
    }
}

impl<A: DynamoApi> TableBrowser<A> {
    /// Browse through any [`DynamoApi`] implementation
    pub fn from_api(api: A, paging: PagingConfig) -> Self {
        Self { api, paging }
    }

    /// The underlying store
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Paging behavior in effect
    pub fn paging(&self) -> &PagingConfig {
        &self.paging
    }

    /// Describe `table`
    pub async fn describe(&self, table: &str) -> Result<TableSchema, Error> {
        self.api.describe(table).await
    }

    /// Fetch one logical page of `request.table`, each item annotated with its key token
    pub async fn browse(&self, request: PageRequest) -> Result<BrowsePage, Error> {
        let span = tracing::debug_span!("browse", table = %request.table);
        self.browse_inner(request).instrument(span).await
    }

    async fn browse_inner(&self, request: PageRequest) -> Result<BrowsePage, Error> {
        let PageRequest {
            table,
            selection,
            filters,
            start,
            page_size,
            mode,
        } = request;
        let schema = self.api.describe(&table).await?;

        let cursor_attributes = schema.cursor_attributes(&selection)?;
        let active = match mode {
            AccessMode::Scan => None,
            AccessMode::Query => Some(schema.key_schema_for(&selection)?),
        };
        let expressions = compile(&filters, active)?;
        if let Some(active) = active {
            require_hash_condition(&filters, active)?;
        }
        tracing::trace!(
            key_condition = ?expressions.key_condition_expression(),
            filter = ?expressions.filter_expression(),
            "compiled filters"
        );

        let mut query = PhysicalQuery::new(table, mode, expressions, cursor_attributes)
            .index(selection.index_name().map(str::to_owned))
            .start(start);
        if let Some(page_size) = page_size {
            query = query.page_size(page_size);
        }
        let (items, next_cursor) = fetch_page(&self.api, query, &self.paging)
            .await?
            .into_parts();

        let columns = columns(schema.key_schema(), &items);
        let items = items
            .into_iter()
            .map(|item| {
                let key = compose_key(&item, schema.key_schema())?;
                Ok(BrowseItem {
                    key_token: encode_token(&key),
                    item,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(BrowsePage {
            items,
            next_cursor,
            columns,
        })
    }

    /// Look up the item addressed by `token`
    pub async fn get_item(&self, table: &str, token: &str) -> Result<Option<Item>, Error> {
        let schema = self.api.describe(table).await?;
        let key = decode_token(token, schema.key_schema())?;
        self.api.get(table, key.into_key_map()).await
    }

    /// Delete the item addressed by `token`
    pub async fn delete_item(&self, table: &str, token: &str) -> Result<(), Error> {
        let schema = self.api.describe(table).await?;
        let key = decode_token(token, schema.key_schema())?;
        tracing::debug!(table, token, "deleting item");
        self.api.delete(table, key.into_key_map()).await
    }

    /// Create or replace `item`, returning its primary key.
    ///
    /// Fails without calling the store if `item` lacks a key attribute.
    pub async fn put_item(&self, table: &str, item: Item) -> Result<StructuredKey, Error> {
        let schema = self.api.describe(table).await?;
        let key = compose_key(&item, schema.key_schema())?;
        self.api.put(table, item).await?;
        Ok(key)
    }

    /// A blank item holding only the key attributes of `table`, ready to be filled in
    pub async fn new_item_template(&self, table: &str) -> Result<Item, Error> {
        let schema = self.api.describe(table).await?;
        Ok(schema
            .key_schema()
            .attributes()
            .map(|attribute| {
                (
                    attribute.name().to_owned(),
                    attribute.scalar_type().empty_value(),
                )
            })
            .collect())
    }

    /// Every table name, following `LastEvaluatedTableName` until the listing is exhausted
    pub async fn list_all_tables(&self) -> Result<Vec<String>, Error> {
        let max_round_trips = self.paging.max_round_trips();
        let mut names = Vec::new();
        let mut start = None;
        for _ in 0..max_round_trips {
            let (page, last) = self.api.list_table_names(start.take()).await?.into_parts();
            names.extend(page);
            match last {
                Some(last) => start = Some(last),
                None => return Ok(names),
            }
        }
        Err(Error::RoundTripLimit {
            round_trips: max_round_trips,
            accumulated: names.len(),
        })
    }
}

fn require_hash_condition(
    filters: &[FilterCriterion],
    active: &KeySchema,
) -> Result<(), ValidationError> {
    let hash = active.hash().name();
    if filters
        .iter()
        .any(|filter| filter.attribute() == hash && filter.operator() == Operator::Eq)
    {
        Ok(())
    } else {
        Err(ValidationError::MissingKeyCondition {
            attribute: hash.to_owned(),
        })
    }
}

/// Key attributes in schema order, then every other attribute seen on the page by name
fn columns(key_schema: &KeySchema, items: &[Item]) -> Vec<String> {
    let keys: Vec<String> = key_schema
        .attributes()
        .map(|attribute| attribute.name().to_owned())
        .collect();
    let others: BTreeSet<&String> = items
        .iter()
        .flat_map(|item| item.keys())
        .filter(|name| !keys.contains(name))
        .collect();
    let others: Vec<String> = others.into_iter().cloned().collect();
    keys.into_iter().chain(others).collect()
}

/// Parameters of one browse call
#[derive(Debug, Clone)]
pub struct PageRequest {
    table: String,
    selection: Selection,
    filters: Vec<FilterCriterion>,
    start: Option<Cursor>,
    page_size: Option<usize>,
    mode: AccessMode,
}

impl PageRequest {
    /// Read `table` with the given access mode
    pub fn new(table: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            table: table.into(),
            selection: Selection::Table,
            filters: Vec::new(),
            start: None,
            page_size: None,
            mode,
        }
    }

    /// Scan `table`; every criterion is applied as a filter
    pub fn scan(table: impl Into<String>) -> Self {
        Self::new(table, AccessMode::Scan)
    }

    /// Query `table`; criteria on the selected key schema narrow the key range
    pub fn query(table: impl Into<String>) -> Self {
        Self::new(table, AccessMode::Query)
    }

    /// Read the table itself or one of its secondary indexes. Default is [`Selection::Table`].
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Append a criterion
    pub fn filter(mut self, criterion: FilterCriterion) -> Self {
        self.filters.push(criterion);
        self
    }

    /// Append criteria, in order
    pub fn filters(mut self, criteria: impl IntoIterator<Item = FilterCriterion>) -> Self {
        self.filters.extend(criteria);
        self
    }

    /// Resume after `cursor`
    pub fn start(mut self, cursor: Option<Cursor>) -> Self {
        self.start = cursor;
        self
    }

    /// Number of items in the page
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// An item and the token that addresses it
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseItem {
    key_token: String,
    item: Item,
}

impl BrowseItem {
    /// Item token, usable with [`TableBrowser::get_item`] and [`TableBrowser::delete_item`]
    pub fn key_token(&self) -> &str {
        &self.key_token
    }

    /// The item
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Consume, returning the item
    pub fn into_item(self) -> Item {
        self.item
    }
}

/// One page of browse results
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePage {
    items: Vec<BrowseItem>,
    next_cursor: Option<Cursor>,
    columns: Vec<String>,
}

impl BrowsePage {
    /// Items in store order
    pub fn items(&self) -> &[BrowseItem] {
        &self.items
    }

    /// Where the next page starts, `None` once the collection is exhausted
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Column headings: key attributes first, then the rest sorted by name
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}
