/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::expression::Operator;
use crate::types::ScalarType;

/// Type-erased failure carried by [`TransportError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Any failure produced while browsing a table
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Caller supplied input that cannot be turned into a valid request
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The table description does not support the requested operation
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A physical call to DynamoDB failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The page could not be filled within the configured number of physical round trips
    #[error(
        "page not filled after {round_trips} physical round trips ({accumulated} matching items accumulated)"
    )]
    RoundTripLimit {
        /// Round trips issued before giving up
        round_trips: usize,
        /// Matching items accumulated before giving up
        accumulated: usize,
    },
}

/// Malformed client input. Never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A value declared as a number does not parse as one
    #[error("value `{value}` for attribute `{attribute}` is not a valid number")]
    InvalidNumber {
        /// Attribute the value was supplied for
        attribute: String,
        /// The offending raw value
        value: String,
    },

    /// A value declared as binary is not valid base64
    #[error("value for attribute `{attribute}` is not valid base64")]
    InvalidBinary {
        /// Attribute the value was supplied for
        attribute: String,
    },

    /// `between` did not receive exactly two comma separated values
    #[error("between on `{attribute}` requires exactly two comma-separated values, got {found}")]
    BetweenArity {
        /// Attribute the criterion targets
        attribute: String,
        /// Number of components found
        found: usize,
    },

    /// Operator token outside of the supported set
    #[error("unknown filter operator `{0}`")]
    UnknownOperator(String),

    /// Scalar type token other than `S`, `N` or `B`
    #[error("unknown scalar type `{0}`")]
    UnknownScalarType(String),

    /// Access mode other than `scan` or `query`
    #[error("unknown access mode `{0}`")]
    UnknownAccessMode(String),

    /// Item token component count does not match the key schema
    #[error("key token has {found} components but the key schema expects {expected}")]
    KeyArity {
        /// Components required by the key schema
        expected: usize,
        /// Components present in the token
        found: usize,
    },

    /// Item lacks one of the key attributes
    #[error("item is missing key attribute `{attribute}`")]
    MissingKeyAttribute {
        /// The missing attribute
        attribute: String,
    },

    /// Key attribute value (or criterion) does not have the key's declared scalar type
    #[error("key attribute `{attribute}` must be of type {expected}")]
    KeyTypeMismatch {
        /// The key attribute
        attribute: String,
        /// Its declared scalar type
        expected: ScalarType,
    },

    /// Operator may not constrain this key attribute in a key condition
    #[error("operator `{operator}` is not allowed on hash key attribute `{attribute}`")]
    IllegalKeyCondition {
        /// The hash key attribute
        attribute: String,
        /// The rejected operator
        operator: Operator,
    },

    /// A key attribute was constrained by more than one key condition
    #[error("more than one key condition targets key attribute `{attribute}`")]
    DuplicateKeyCondition {
        /// The key attribute
        attribute: String,
    },

    /// A query was requested without an equality condition on the hash key
    #[error("query requires an `=` condition on hash key attribute `{attribute}`")]
    MissingKeyCondition {
        /// The hash key attribute of the selected table or index
        attribute: String,
    },

    /// Item token component is not percent-encoded UTF-8
    #[error("key token component `{0}` is not valid percent-encoded UTF-8")]
    InvalidToken(String),

    /// Cursor is not a JSON object of typed scalars
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

/// The table description cannot support the request
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A key schema references an attribute missing from the attribute definitions
    #[error(
        "key attribute `{attribute}` of {context} is not declared in the attribute definitions"
    )]
    UndefinedAttribute {
        /// The undeclared attribute
        attribute: String,
        /// Table or index whose key schema references it
        context: String,
    },

    /// The same attribute was declared with two scalar types
    #[error("attribute `{attribute}` is declared as {declared} but used as {used} by {context}")]
    ConflictingAttributeType {
        /// The attribute
        attribute: String,
        /// Type in the attribute definitions
        declared: ScalarType,
        /// Type used by the key schema
        used: ScalarType,
        /// Table or index whose key schema uses it
        context: String,
    },

    /// Attribute definition uses a type this crate cannot represent
    #[error("attribute `{attribute}` has unsupported scalar type `{found}`")]
    UnsupportedAttributeType {
        /// The attribute
        attribute: String,
        /// The raw type reported by the service
        found: String,
    },

    /// Key schema without a `HASH` element
    #[error("{context} has no hash key")]
    MissingHashKey {
        /// Table or index lacking the hash key
        context: String,
    },

    /// Index name not present on the table
    #[error("table `{table}` has no index named `{index}`")]
    UnknownIndex {
        /// The table
        table: String,
        /// The requested index
        index: String,
    },

    /// Describe call returned a description without a table name
    #[error("table description has no table name")]
    MissingTableName,

    /// Describe call returned no description
    #[error("table `{0}` was not found")]
    TableNotFound(String),
}

/// A physical call failed. The underlying SDK error is kept intact as the source.
#[derive(thiserror::Error, Debug)]
#[error("{operation} request failed")]
pub struct TransportError {
    operation: &'static str,
    #[source]
    source: BoxError,
}

impl TransportError {
    /// Wrap the failure of the named operation
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// The operation that failed, e.g. `Scan`
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Consume the error and return the underlying failure
    pub fn into_source(self) -> BoxError {
        self.source
    }
}

// convenience to wrap an SDK failure for the given operation
pub(crate) fn transport<E>(operation: &'static str) -> impl FnOnce(E) -> Error
where
    E: Into<BoxError>,
{
    move |e| TransportError::new(operation, e).into()
}
