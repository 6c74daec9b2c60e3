/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */

//! Building blocks for browsing and editing Amazon DynamoDB tables.
//!
//! The crate covers the parts of a table browser that can silently corrupt results when done
//! naively:
//!
//! - [`expression`] compiles ordered, per-attribute filter criteria into a key condition
//!   expression and a filter expression, rejecting placements DynamoDB would refuse.
//! - [`page`] stitches DynamoDB's own filter-reduced physical pages into a single logical page
//!   of the requested size, with a cursor that resumes exactly where the page ended.
//! - [`key`] extracts primary keys from items and encodes them as URL-safe item tokens and
//!   JSON cursors.
//!
//! [`browser::TableBrowser`] composes these on top of an [`aws_sdk_dynamodb::Client`].
//!
//! # Example
//!
//! ```no_run
//! use aws_dynamodb_admin::browser::{PageRequest, TableBrowser};
//! use aws_dynamodb_admin::expression::{FilterCriterion, Operator};
//! use aws_dynamodb_admin::types::ScalarType;
//!
//! # async fn docs(client: aws_sdk_dynamodb::Client) -> Result<(), aws_dynamodb_admin::error::Error> {
//! let browser = TableBrowser::builder().client(client).build();
//! let page = browser
//!     .browse(
//!         PageRequest::query("movies")
//!             .filter(FilterCriterion::new("year", Operator::Eq, "2013", ScalarType::Number))
//!             .filter(FilterCriterion::new("title", Operator::BeginsWith, "R", ScalarType::String))
//!             .page_size(10),
//!     )
//!     .await?;
//! for item in page.items() {
//!     println!("{} => {:?}", item.key_token(), item.item());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

/// High level entry point for browsing a table
pub mod browser;

/// Paging configuration
pub mod config;

/// Error types emitted by `aws-dynamodb-admin`
pub mod error;

/// Compilation of filter criteria into DynamoDB expressions
pub mod expression;

/// Primary key extraction, item tokens and cursors
pub mod key;

/// Aggregation of physical pages into logical pages
pub mod page;

/// Table and index key schemas
pub mod schema;

/// The physical DynamoDB operations this crate depends on
pub mod store;

/// Shared scalar and selection types
pub mod types;
