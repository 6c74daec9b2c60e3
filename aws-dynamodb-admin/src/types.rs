/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, ScalarAttributeType};
use aws_smithy_types::base64;

use crate::error::ValidationError;

/// A single DynamoDB item, attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// The scalar types DynamoDB allows for key attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum ScalarType {
    /// `S`
    #[serde(rename = "S")]
    String,
    /// `N`
    #[serde(rename = "N")]
    Number,
    /// `B`, carried as base64 text wherever a string form is needed
    #[serde(rename = "B")]
    Binary,
}

impl ScalarType {
    /// The DynamoDB type descriptor (`S`, `N` or `B`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "S",
            ScalarType::Number => "N",
            ScalarType::Binary => "B",
        }
    }

    /// Map the SDK's attribute type, `None` for types this crate does not know
    pub fn from_sdk(value: &ScalarAttributeType) -> Option<Self> {
        match value {
            ScalarAttributeType::S => Some(ScalarType::String),
            ScalarAttributeType::N => Some(ScalarType::Number),
            ScalarAttributeType::B => Some(ScalarType::Binary),
            _ => None,
        }
    }

    /// The scalar type of `value`, or `None` for lists, maps, sets, booleans and nulls
    pub fn of(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(_) => Some(ScalarType::String),
            AttributeValue::N(_) => Some(ScalarType::Number),
            AttributeValue::B(_) => Some(ScalarType::Binary),
            _ => None,
        }
    }

    /// Convert raw text entered for `attribute` into a typed value.
    ///
    /// Numbers are validated but kept as the trimmed source text so no precision is lost.
    pub fn coerce(&self, attribute: &str, raw: &str) -> Result<AttributeValue, ValidationError> {
        match self {
            ScalarType::String => Ok(AttributeValue::S(raw.to_owned())),
            ScalarType::Number => {
                let trimmed = raw.trim();
                if is_number(trimmed) {
                    Ok(AttributeValue::N(trimmed.to_owned()))
                } else {
                    Err(ValidationError::InvalidNumber {
                        attribute: attribute.to_owned(),
                        value: raw.to_owned(),
                    })
                }
            }
            ScalarType::Binary => base64::decode(raw)
                .map(|bytes| AttributeValue::B(Blob::new(bytes)))
                .map_err(|_| ValidationError::InvalidBinary {
                    attribute: attribute.to_owned(),
                }),
        }
    }

    /// The text form of a scalar value, the inverse of [`ScalarType::coerce`].
    ///
    /// Returns `None` when `value` is not of this type.
    pub fn render(&self, value: &AttributeValue) -> Option<String> {
        match (self, value) {
            (ScalarType::String, AttributeValue::S(s)) => Some(s.clone()),
            (ScalarType::Number, AttributeValue::N(n)) => Some(n.clone()),
            (ScalarType::Binary, AttributeValue::B(b)) => Some(base64::encode(b.as_ref())),
            _ => None,
        }
    }

    /// Placeholder value used when templating a new item
    pub(crate) fn empty_value(&self) -> AttributeValue {
        match self {
            ScalarType::String => AttributeValue::S(String::new()),
            ScalarType::Number => AttributeValue::N("0".to_owned()),
            ScalarType::Binary => AttributeValue::B(Blob::new(Vec::new())),
        }
    }
}

pub(crate) fn is_number(text: &str) -> bool {
    // `f64::from_str` also accepts `inf` and `NaN`, which DynamoDB rejects
    !text.is_empty() && text.parse::<f64>().map_or(false, f64::is_finite)
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(ScalarType::String),
            "N" => Ok(ScalarType::Number),
            "B" => Ok(ScalarType::Binary),
            other => Err(ValidationError::UnknownScalarType(other.to_owned())),
        }
    }
}

/// How the physical calls read the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// `Scan`: every criterion is applied as a filter
    #[default]
    Scan,
    /// `Query`: criteria on the selected key schema become the key condition
    Query,
}

impl AccessMode {
    /// The DynamoDB operation name
    pub fn operation(&self) -> &'static str {
        match self {
            AccessMode::Scan => "Scan",
            AccessMode::Query => "Query",
        }
    }
}

impl FromStr for AccessMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(AccessMode::Scan),
            "query" => Ok(AccessMode::Query),
            other => Err(ValidationError::UnknownAccessMode(other.to_owned())),
        }
    }
}

/// The key schema a request runs against: the table itself or one of its secondary indexes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// The table's primary key
    #[default]
    Table,
    /// A global or local secondary index, by name
    Index(String),
}

impl Selection {
    /// Parse a selection parameter; the literal `table` selects the table itself
    pub fn parse(value: &str) -> Self {
        match value {
            "table" | "" => Selection::Table,
            name => Selection::Index(name.to_owned()),
        }
    }

    /// The index name to send with the physical call
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Selection::Table => None,
            Selection::Index(name) => Some(name.as_str()),
        }
    }
}
