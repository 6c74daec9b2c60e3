/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use aws_dynamodb_admin::error::{ConfigurationError, Error, TransportError};
use aws_dynamodb_admin::key::{compose_key, Cursor};
use aws_dynamodb_admin::schema::{AttributeSchema, IndexKind, IndexSchema, KeySchema, TableSchema};
use aws_dynamodb_admin::store::{DynamoApi, FetchOutput, FetchRequest, TablePage};
use aws_dynamodb_admin::types::{Item, ScalarType};
use aws_sdk_dynamodb::types::AttributeValue;

type Predicate = Box<dyn Fn(&Item) -> bool + Send + Sync>;

/// `movies`: hash `year` (N), range `title` (S), global index `by-genre` on (`genre`, `year`)
pub fn movies_schema() -> TableSchema {
    TableSchema::new(
        "movies",
        vec![
            AttributeSchema::new("year", ScalarType::Number),
            AttributeSchema::new("title", ScalarType::String),
            AttributeSchema::new("genre", ScalarType::String),
        ],
        KeySchema::composite(
            AttributeSchema::new("year", ScalarType::Number),
            AttributeSchema::new("title", ScalarType::String),
        ),
    )
    .unwrap()
    .with_index(IndexSchema::new(
        "by-genre",
        IndexKind::Global,
        KeySchema::composite(
            AttributeSchema::new("genre", ScalarType::String),
            AttributeSchema::new("year", ScalarType::Number),
        ),
    ))
    .unwrap()
}

pub fn movie(year: u32, title: &str, genre: &str) -> Item {
    [
        ("year".to_owned(), AttributeValue::N(year.to_string())),
        ("title".to_owned(), AttributeValue::S(title.to_owned())),
        ("genre".to_owned(), AttributeValue::S(genre.to_owned())),
    ]
    .into_iter()
    .collect()
}

pub fn title(item: &Item) -> &str {
    match item.get("title") {
        Some(AttributeValue::S(title)) => title,
        other => panic!("item has no title: {other:?}"),
    }
}

/// In-memory table that evaluates `Limit` items per call in insertion order, like a scan.
///
/// Filter expressions are not interpreted; `matching` decides which evaluated items are returned.
pub struct MemoryStore {
    schema: TableSchema,
    items: Mutex<Vec<Item>>,
    matches: Predicate,
    fail_on_fetch: Option<usize>,
    fetches: Mutex<Vec<FetchRequest>>,
    describes: Mutex<usize>,
    tables: Vec<String>,
    tables_per_page: usize,
    list_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(schema: TableSchema, items: Vec<Item>) -> Self {
        Self {
            schema,
            items: Mutex::new(items),
            matches: Box::new(|_| true),
            fail_on_fetch: None,
            fetches: Mutex::new(Vec::new()),
            describes: Mutex::new(0),
            tables: Vec::new(),
            tables_per_page: 100,
            list_calls: Mutex::new(0),
        }
    }

    pub fn matching(mut self, predicate: impl Fn(&Item) -> bool + Send + Sync + 'static) -> Self {
        self.matches = Box::new(predicate);
        self
    }

    /// Fail the `n`th fetch call, counting from one
    pub fn failing_on_fetch(mut self, n: usize) -> Self {
        self.fail_on_fetch = Some(n);
        self
    }

    pub fn with_tables(mut self, tables: &[&str], per_page: usize) -> Self {
        self.tables = tables.iter().map(|t| t.to_string()).collect();
        self.tables_per_page = per_page;
        self
    }

    pub fn fetches(&self) -> Vec<FetchRequest> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn items(&self) -> Vec<Item> {
        self.items.lock().unwrap().clone()
    }

    fn check_table(&self, table: &str) -> Result<(), Error> {
        if table == self.schema.name() {
            Ok(())
        } else {
            Err(ConfigurationError::TableNotFound(table.to_owned()).into())
        }
    }

    fn position(items: &[Item], key: &HashMap<String, AttributeValue>) -> Option<usize> {
        items
            .iter()
            .position(|item| key.iter().all(|(name, value)| item.get(name) == Some(value)))
    }
}

impl DynamoApi for MemoryStore {
    async fn describe(&self, table: &str) -> Result<TableSchema, Error> {
        *self.describes.lock().unwrap() += 1;
        self.check_table(table)?;
        Ok(self.schema.clone())
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutput, Error> {
        let call = {
            let mut fetches = self.fetches.lock().unwrap();
            fetches.push(request.clone());
            fetches.len()
        };
        if self.fail_on_fetch == Some(call) {
            return Err(TransportError::new(request.mode().operation(), "injected failure").into());
        }
        self.check_table(request.table())?;

        let items = self.items.lock().unwrap();
        let from = match request.start() {
            Some(start) => Self::position(&items, &start.to_key_map()).map_or(0, |p| p + 1),
            None => 0,
        };
        let to = std::cmp::min(from + request.limit() as usize, items.len());
        let evaluated = &items[from..to];
        let matched = evaluated
            .iter()
            .filter(|item| (self.matches)(*item))
            .cloned()
            .collect();
        let last_evaluated_key = match evaluated.last() {
            Some(last) if to < items.len() => Some(Cursor::from(
                compose_key(last, self.schema.key_schema()).unwrap(),
            )),
            _ => None,
        };
        Ok(FetchOutput::new(matched, last_evaluated_key))
    }

    async fn get(
        &self,
        table: &str,
        key: HashMap<String, AttributeValue>,
    ) -> Result<Option<Item>, Error> {
        self.check_table(table)?;
        let items = self.items.lock().unwrap();
        Ok(Self::position(&items, &key).map(|p| items[p].clone()))
    }

    async fn put(&self, table: &str, item: Item) -> Result<(), Error> {
        self.check_table(table)?;
        let key = compose_key(&item, self.schema.key_schema())
            .unwrap()
            .into_key_map();
        let mut items = self.items.lock().unwrap();
        match Self::position(&items, &key) {
            Some(p) => items[p] = item,
            None => items.push(item),
        }
        Ok(())
    }

    async fn delete(&self, table: &str, key: HashMap<String, AttributeValue>) -> Result<(), Error> {
        self.check_table(table)?;
        let mut items = self.items.lock().unwrap();
        if let Some(p) = Self::position(&items, &key) {
            items.remove(p);
        }
        Ok(())
    }

    async fn list_table_names(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<TablePage, Error> {
        *self.list_calls.lock().unwrap() += 1;
        let from = match exclusive_start_table_name {
            Some(name) => self
                .tables
                .iter()
                .position(|t| *t == name)
                .map_or(0, |p| p + 1),
            None => 0,
        };
        let to = std::cmp::min(from + self.tables_per_page, self.tables.len());
        let names = self.tables[from..to].to_vec();
        let last = (to < self.tables.len()).then(|| self.tables[to - 1].clone());
        Ok(TablePage::new(names, last))
    }
}
