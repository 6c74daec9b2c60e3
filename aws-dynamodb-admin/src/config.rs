/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;

/// Page size used when a request does not specify one
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Default ceiling on physical calls issued for one logical page
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 100;

/// Lower bound on the `Limit` sent with each physical call when sized automatically
const MIN_AUTO_BATCH_SIZE: i32 = 100;

/// Upper bound on the `Limit` sent with each physical call when sized automatically
const MAX_AUTO_BATCH_SIZE: i32 = 1_000;

/// The number of items each physical call asks the store to evaluate.
///
/// The store applies filter expressions after this limit, so a physical call may return fewer
/// matches than the batch size even when more exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSize {
    /// Use the requested page size, clamped to `100..=1000`
    #[default]
    Auto,

    /// Explicitly configured batch size
    Explicit(i32),
}

impl BatchSize {
    /// The `Limit` to send for a logical page of `page_size` items
    pub fn resolve(&self, page_size: usize) -> i32 {
        match self {
            BatchSize::Auto => i32::try_from(page_size)
                .unwrap_or(MAX_AUTO_BATCH_SIZE)
                .clamp(MIN_AUTO_BATCH_SIZE, MAX_AUTO_BATCH_SIZE),
            BatchSize::Explicit(limit) => cmp::max(*limit, 1),
        }
    }
}

/// Controls how logical pages are assembled from physical calls
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    default_page_size: usize,
    physical_batch_size: BatchSize,
    max_round_trips: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            physical_batch_size: BatchSize::Auto,
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
        }
    }
}

impl PagingConfig {
    /// Create a new [`Builder`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Page size used when a request does not specify one
    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Batch size of each physical call
    pub fn physical_batch_size(&self) -> BatchSize {
        self.physical_batch_size
    }

    /// Maximum physical calls per logical page, never less than one
    pub fn max_round_trips(&self) -> usize {
        cmp::max(self.max_round_trips, 1)
    }
}

/// Fluent style builder for [`PagingConfig`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: PagingConfig,
}

impl Builder {
    /// Page size used when a request does not specify one.
    ///
    /// Default is 25.
    pub fn default_page_size(mut self, page_size: usize) -> Self {
        self.config.default_page_size = page_size;
        self
    }

    /// Batch size of each physical call.
    ///
    /// Default is [`BatchSize::Auto`].
    pub fn physical_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.config.physical_batch_size = match batch_size {
            BatchSize::Explicit(limit) => BatchSize::Explicit(cmp::max(limit, 1)),
            auto => auto,
        };
        self
    }

    /// Maximum physical calls issued for one logical page before giving up.
    ///
    /// Values below one are raised to one. Default is 100.
    pub fn max_round_trips(mut self, max_round_trips: usize) -> Self {
        self.config.max_round_trips = cmp::max(max_round_trips, 1);
        self
    }

    /// Consumes the builder and constructs a [`PagingConfig`]
    pub fn build(self) -> PagingConfig {
        self.config
    }
}
