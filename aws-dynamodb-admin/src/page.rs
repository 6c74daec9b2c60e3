/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::config::PagingConfig;
use crate::error::Error;
use crate::expression::ExpressionSet;
use crate::key::{compose_cursor, Cursor};
use crate::schema::AttributeSchema;
use crate::store::{DynamoApi, FetchRequest};
use crate::types::{AccessMode, Item};

/// A compiled read against one table or index, ready to be paged
#[derive(Debug, Clone)]
pub struct PhysicalQuery {
    table: String,
    index: Option<String>,
    mode: AccessMode,
    expressions: ExpressionSet,
    start: Option<Cursor>,
    page_size: Option<usize>,
    cursor_attributes: Vec<AttributeSchema>,
}

impl PhysicalQuery {
    /// Create a query against `table`.
    ///
    /// `cursor_attributes` are the attributes a continuation key needs: the table key, plus the
    /// index key when reading an index.
    /// See [`TableSchema::cursor_attributes`](crate::schema::TableSchema::cursor_attributes).
    pub fn new(
        table: impl Into<String>,
        mode: AccessMode,
        expressions: ExpressionSet,
        cursor_attributes: Vec<AttributeSchema>,
    ) -> Self {
        Self {
            table: table.into(),
            index: None,
            mode,
            expressions,
            start: None,
            page_size: None,
            cursor_attributes,
        }
    }

    /// Read a secondary index instead of the table
    pub fn index(mut self, index: Option<String>) -> Self {
        self.index = index;
        self
    }

    /// Resume after `cursor`
    pub fn start(mut self, cursor: Option<Cursor>) -> Self {
        self.start = cursor;
        self
    }

    /// Number of items in the logical page. Defaults to the configured page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One logical page of items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    items: Vec<Item>,
    next_cursor: Option<Cursor>,
}

impl PageResult {
    pub(crate) fn new(items: Vec<Item>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    /// Items in store order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Where the next page starts, `None` once the collection is exhausted
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Consume the page
    pub fn into_parts(self) -> (Vec<Item>, Option<Cursor>) {
        (self.items, self.next_cursor)
    }
}

/// Fetch exactly one logical page, issuing as many physical calls as needed.
///
/// DynamoDB applies filter expressions after its per-call `Limit`, so a physical call can return
/// anywhere between zero and `Limit` matches. Physical calls are chained on `LastEvaluatedKey`
/// until the page is full or the collection is exhausted. When the last call overshoots the
/// page, the surplus is dropped and the next cursor is the key of the last item kept, since the
/// store's own boundary lies beyond the dropped items.
///
/// A page size of zero issues no calls and echoes the start cursor. Any failed call aborts the
/// page without returning the items gathered so far. No more than
/// [`PagingConfig::max_round_trips`] calls are made; running out fails with
/// [`Error::RoundTripLimit`].
pub async fn fetch_page<A: DynamoApi>(
    api: &A,
    query: PhysicalQuery,
    config: &PagingConfig,
) -> Result<PageResult, Error> {
    let page_size = query
        .page_size
        .unwrap_or_else(|| config.default_page_size());
    let span = tracing::debug_span!(
        "fetch-page",
        table = %query.table,
        index = ?query.index,
        operation = query.mode.operation(),
        page_size
    );
    aggregate(api, query, page_size, config)
        .instrument(span)
        .await
}

async fn aggregate<A: DynamoApi>(
    api: &A,
    query: PhysicalQuery,
    page_size: usize,
    config: &PagingConfig,
) -> Result<PageResult, Error> {
    let PhysicalQuery {
        table,
        index,
        mode,
        expressions,
        start,
        cursor_attributes,
        ..
    } = query;

    if page_size == 0 {
        return Ok(PageResult::new(Vec::new(), start));
    }

    let limit = config.physical_batch_size().resolve(page_size);
    let mut items: Vec<Item> = Vec::new();
    let mut cursor = start.filter(|cursor| !cursor.is_empty());
    let mut round_trips = 0;

    let continuation = loop {
        if round_trips == config.max_round_trips() {
            return Err(Error::RoundTripLimit {
                round_trips,
                accumulated: items.len(),
            });
        }
        round_trips += 1;

        let request = FetchRequest::new(
            table.clone(),
            index.clone(),
            mode,
            expressions.clone(),
            cursor.take(),
            limit,
        );
        let (batch, last_evaluated_key) = api.fetch(request).await?.into_parts();
        let returned = batch.len();
        items.extend(batch);
        tracing::debug!(
            round_trip = round_trips,
            returned,
            accumulated = items.len(),
            continuation = last_evaluated_key.is_some(),
            "physical page received"
        );

        match last_evaluated_key {
            Some(next) if items.len() < page_size => cursor = Some(next),
            last => break last,
        }
    };

    if items.len() > page_size {
        tracing::trace!(
            "dropping {} surplus items past page size {page_size}",
            items.len() - page_size
        );
        items.truncate(page_size);
        let next_cursor = match items.last() {
            Some(last_kept) => Some(compose_cursor(last_kept, &cursor_attributes)?),
            None => None,
        };
        return Ok(PageResult::new(items, next_cursor));
    }

    Ok(PageResult::new(items, continuation))
}
