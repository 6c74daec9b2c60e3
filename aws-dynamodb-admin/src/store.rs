/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::future::Future;

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use crate::error::{transport, ConfigurationError, Error};
use crate::expression::ExpressionSet;
use crate::key::Cursor;
use crate::schema::TableSchema;
use crate::types::{AccessMode, Item};

/// One physical scan or query call
#[derive(Debug, Clone)]
pub struct FetchRequest {
    table: String,
    index: Option<String>,
    mode: AccessMode,
    expressions: ExpressionSet,
    start: Option<Cursor>,
    limit: i32,
}

impl FetchRequest {
    pub(crate) fn new(
        table: String,
        index: Option<String>,
        mode: AccessMode,
        expressions: ExpressionSet,
        start: Option<Cursor>,
        limit: i32,
    ) -> Self {
        Self {
            table,
            index,
            mode,
            expressions,
            start,
            limit,
        }
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Secondary index name, `None` to read the table itself
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Scan or query
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Compiled key condition and filter expressions
    pub fn expressions(&self) -> &ExpressionSet {
        &self.expressions
    }

    /// `ExclusiveStartKey`; `None` starts at the beginning
    pub fn start(&self) -> Option<&Cursor> {
        self.start.as_ref()
    }

    /// Maximum number of items the store evaluates for this call
    pub fn limit(&self) -> i32 {
        self.limit
    }
}

/// Result of one physical scan or query call
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    items: Vec<Item>,
    last_evaluated_key: Option<Cursor>,
}

impl FetchOutput {
    /// Create a new output
    pub fn new(items: Vec<Item>, last_evaluated_key: Option<Cursor>) -> Self {
        Self {
            items,
            last_evaluated_key,
        }
    }

    /// Matching items in store order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The store's continuation, `None` once the traversal is exhausted
    pub fn last_evaluated_key(&self) -> Option<&Cursor> {
        self.last_evaluated_key.as_ref()
    }

    /// Consume the output
    pub fn into_parts(self) -> (Vec<Item>, Option<Cursor>) {
        (self.items, self.last_evaluated_key)
    }
}

/// One page of table names
#[derive(Debug, Clone, Default)]
pub struct TablePage {
    names: Vec<String>,
    last_evaluated_table_name: Option<String>,
}

impl TablePage {
    /// Create a new page
    pub fn new(names: Vec<String>, last_evaluated_table_name: Option<String>) -> Self {
        Self {
            names,
            last_evaluated_table_name,
        }
    }

    /// Consume the page
    pub fn into_parts(self) -> (Vec<String>, Option<String>) {
        (self.names, self.last_evaluated_table_name)
    }
}

/// The physical DynamoDB operations used by this crate.
///
/// Implemented for [`aws_sdk_dynamodb::Client`]. Failures of the underlying call surface as
/// [`Error::Transport`].
pub trait DynamoApi: Send + Sync {
    /// `DescribeTable`, resolved into a [`TableSchema`]
    fn describe(&self, table: &str) -> impl Future<Output = Result<TableSchema, Error>> + Send;

    /// A single `Scan` or `Query` call
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<FetchOutput, Error>> + Send;

    /// `GetItem`
    fn get(
        &self,
        table: &str,
        key: HashMap<String, AttributeValue>,
    ) -> impl Future<Output = Result<Option<Item>, Error>> + Send;

    /// `PutItem`
    fn put(&self, table: &str, item: Item) -> impl Future<Output = Result<(), Error>> + Send;

    /// `DeleteItem`
    fn delete(
        &self,
        table: &str,
        key: HashMap<String, AttributeValue>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// A single `ListTables` call
    fn list_table_names(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> impl Future<Output = Result<TablePage, Error>> + Send;
}

impl DynamoApi for Client {
    async fn describe(&self, table: &str) -> Result<TableSchema, Error> {
        let description = self
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(transport("DescribeTable"))?
            .table
            .ok_or_else(|| ConfigurationError::TableNotFound(table.to_owned()))?;
        Ok(TableSchema::try_from(&description)?)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutput, Error> {
        let FetchRequest {
            table,
            index,
            mode,
            expressions,
            start,
            limit,
        } = request;
        let exclusive_start_key = start
            .filter(|cursor| !cursor.is_empty())
            .map(Cursor::into_key_map);

        let (items, last_evaluated_key) = match mode {
            AccessMode::Scan => {
                let output = self
                    .scan()
                    .table_name(table)
                    .set_index_name(index)
                    .set_filter_expression(expressions.filter_expression())
                    .set_expression_attribute_names(expressions.expression_attribute_names())
                    .set_expression_attribute_values(expressions.expression_attribute_values())
                    .set_exclusive_start_key(exclusive_start_key)
                    .limit(limit)
                    .send()
                    .await
                    .map_err(transport("Scan"))?;
                (output.items, output.last_evaluated_key)
            }
            AccessMode::Query => {
                let output = self
                    .query()
                    .table_name(table)
                    .set_index_name(index)
                    .set_key_condition_expression(expressions.key_condition_expression())
                    .set_filter_expression(expressions.filter_expression())
                    .set_expression_attribute_names(expressions.expression_attribute_names())
                    .set_expression_attribute_values(expressions.expression_attribute_values())
                    .set_exclusive_start_key(exclusive_start_key)
                    .limit(limit)
                    .send()
                    .await
                    .map_err(transport("Query"))?;
                (output.items, output.last_evaluated_key)
            }
        };

        let last_evaluated_key = last_evaluated_key
            .filter(|key| !key.is_empty())
            .map(Cursor::from_key_map)
            .transpose()?;
        Ok(FetchOutput::new(
            items.unwrap_or_default(),
            last_evaluated_key,
        ))
    }

    async fn get(
        &self,
        table: &str,
        key: HashMap<String, AttributeValue>,
    ) -> Result<Option<Item>, Error> {
        let output = self
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(transport("GetItem"))?;
        Ok(output.item)
    }

    async fn put(&self, table: &str, item: Item) -> Result<(), Error> {
        self.put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(transport("PutItem"))?;
        Ok(())
    }

    async fn delete(&self, table: &str, key: HashMap<String, AttributeValue>) -> Result<(), Error> {
        self.delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(transport("DeleteItem"))?;
        Ok(())
    }

    async fn list_table_names(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<TablePage, Error> {
        let output = self
            .list_tables()
            .set_exclusive_start_table_name(exclusive_start_table_name)
            .send()
            .await
            .map_err(transport("ListTables"))?;
        Ok(TablePage::new(
            output.table_names.unwrap_or_default(),
            output.last_evaluated_table_name,
        ))
    }
}
