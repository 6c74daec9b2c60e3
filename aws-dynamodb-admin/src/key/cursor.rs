/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::fmt;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_smithy_types::base64;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{StructuredKey, URL_SAFE};
use crate::error::ValidationError;
use crate::types::{is_number, ScalarType};

/// Where a traversal resumes: the key attributes of the last item handed out.
///
/// This is exactly what the store accepts as `ExclusiveStartKey`. On the wire it is a JSON
/// object of DynamoDB-typed scalars, `{"id":{"S":"a"},"n":{"N":"1"}}`, with attribute order
/// preserved so that decoding and re-encoding yields the same bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    entries: Vec<(String, AttributeValue)>,
}

#[derive(Deserialize)]
enum WireScalar {
    S(String),
    N(String),
    B(String),
}

impl Cursor {
    pub(crate) fn from_entries(entries: Vec<(String, AttributeValue)>) -> Self {
        Self { entries }
    }

    /// Build a cursor from a `LastEvaluatedKey` style map.
    ///
    /// Attributes are ordered by name, since the map carries no order of its own.
    pub fn from_key_map(key: HashMap<String, AttributeValue>) -> Result<Self, ValidationError> {
        let mut entries: Vec<_> = key.into_iter().collect();
        if let Some((name, _)) = entries
            .iter()
            .find(|(_, value)| ScalarType::of(value).is_none())
        {
            return Err(ValidationError::InvalidCursor(format!(
                "attribute `{name}` is not a scalar"
            )));
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(Self { entries })
    }

    /// The value of `attribute`, if it is part of this cursor
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }

    /// Attributes and values in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the cursor carries no attributes; an empty cursor starts from the beginning
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cursor as an `ExclusiveStartKey`
    pub fn to_key_map(&self) -> HashMap<String, AttributeValue> {
        self.entries.iter().cloned().collect()
    }

    /// Consume the cursor, returning an `ExclusiveStartKey`
    pub fn into_key_map(self) -> HashMap<String, AttributeValue> {
        self.entries.into_iter().collect()
    }

    fn to_value(&self) -> Value {
        let members: Map<String, Value> = self
            .entries
            .iter()
            .filter_map(|(name, value)| {
                let scalar_type = ScalarType::of(value)?;
                let text = scalar_type.render(value)?;
                let mut member = Map::new();
                member.insert(scalar_type.as_str().to_owned(), Value::String(text));
                Some((name.clone(), Value::Object(member)))
            })
            .collect();
        Value::Object(members)
    }

    /// The JSON wire form
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Parse the JSON wire form
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidCursor(e.to_string()))
    }

    /// The JSON wire form, percent-encoded for use in a URL
    pub fn encode(&self) -> String {
        utf8_percent_encode(&self.to_json(), URL_SAFE).to_string()
    }

    /// Parse a cursor produced by [`Cursor::encode`]
    pub fn decode(encoded: &str) -> Result<Self, ValidationError> {
        let json = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|e| ValidationError::InvalidCursor(e.to_string()))?;
        Self::from_json(&json)
    }
}

impl From<StructuredKey> for Cursor {
    fn from(key: StructuredKey) -> Self {
        Self::from_entries(key.into_entries())
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CursorVisitor)
    }
}

struct CursorVisitor;

impl<'de> Visitor<'de> for CursorVisitor {
    type Value = Cursor;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object mapping key attributes to typed scalars")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Cursor, M::Error> {
        let mut entries: Vec<(String, AttributeValue)> = Vec::new();
        while let Some((name, scalar)) = map.next_entry::<String, WireScalar>()? {
            if entries.iter().any(|(existing, _)| *existing == name) {
                return Err(de::Error::custom(format!("duplicate attribute `{name}`")));
            }
            let value = match scalar {
                WireScalar::S(text) => AttributeValue::S(text),
                WireScalar::N(text) if is_number(&text) => AttributeValue::N(text),
                WireScalar::N(text) => {
                    return Err(de::Error::custom(format!(
                        "`{text}` for attribute `{name}` is not a number"
                    )))
                }
                WireScalar::B(text) => base64::decode(&text)
                    .map(|bytes| AttributeValue::B(Blob::new(bytes)))
                    .map_err(|_| {
                        de::Error::custom(format!("attribute `{name}` is not valid base64"))
                    })?,
            };
            entries.push((name, value));
        }
        Ok(Cursor::from_entries(entries))
    }
}
