/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ValidationError;
use crate::schema::{AttributeSchema, KeySchema};
use crate::types::{Item, ScalarType};

mod cursor;

pub use cursor::Cursor;

/// RFC 3986 unreserved characters are left as-is, everything else is percent-encoded
pub(crate) const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const DELIMITER: &str = ",";

/// The primary key of one item: the hash attribute and, for composite keys, the range attribute.
///
/// Values are always scalars of the key schema's declared types.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredKey {
    hash: (String, AttributeValue),
    range: Option<(String, AttributeValue)>,
}

impl StructuredKey {
    /// Build a key for `schema`, checking arity and scalar types
    pub fn new(
        schema: &KeySchema,
        hash: AttributeValue,
        range: Option<AttributeValue>,
    ) -> Result<Self, ValidationError> {
        let found = 1 + usize::from(range.is_some());
        if found != schema.arity() {
            return Err(ValidationError::KeyArity {
                expected: schema.arity(),
                found,
            });
        }
        Ok(Self {
            hash: typed(schema.hash(), hash)?,
            range: match (schema.range(), range) {
                (Some(attribute), Some(value)) => Some(typed(attribute, value)?),
                _ => None,
            },
        })
    }

    /// Hash attribute name and value
    pub fn hash(&self) -> (&str, &AttributeValue) {
        (self.hash.0.as_str(), &self.hash.1)
    }

    /// Range attribute name and value, if the key is composite
    pub fn range(&self) -> Option<(&str, &AttributeValue)> {
        self.range.as_ref().map(|(name, value)| (name.as_str(), value))
    }

    /// Key attributes as expected by `GetItem`, `DeleteItem` and `ExclusiveStartKey`
    pub fn to_key_map(&self) -> HashMap<String, AttributeValue> {
        self.clone().into_key_map()
    }

    /// Consume the key, returning the key attribute map
    pub fn into_key_map(self) -> HashMap<String, AttributeValue> {
        std::iter::once(self.hash).chain(self.range).collect()
    }

    fn into_entries(self) -> Vec<(String, AttributeValue)> {
        std::iter::once(self.hash).chain(self.range).collect()
    }
}

fn typed(
    attribute: &AttributeSchema,
    value: AttributeValue,
) -> Result<(String, AttributeValue), ValidationError> {
    if ScalarType::of(&value) != Some(attribute.scalar_type()) {
        return Err(ValidationError::KeyTypeMismatch {
            attribute: attribute.name().to_owned(),
            expected: attribute.scalar_type(),
        });
    }
    Ok((attribute.name().to_owned(), value))
}

fn extract(
    item: &Item,
    attribute: &AttributeSchema,
) -> Result<(String, AttributeValue), ValidationError> {
    let value = item
        .get(attribute.name())
        .ok_or_else(|| ValidationError::MissingKeyAttribute {
            attribute: attribute.name().to_owned(),
        })?;
    typed(attribute, value.clone())
}

/// Extract the primary key of `item` under `schema`
pub fn compose_key(item: &Item, schema: &KeySchema) -> Result<StructuredKey, ValidationError> {
    Ok(StructuredKey {
        hash: extract(item, schema.hash())?,
        range: schema
            .range()
            .map(|attribute| extract(item, attribute))
            .transpose()?,
    })
}

/// Build the continuation key for `item` from `attributes`, in that order
pub(crate) fn compose_cursor(
    item: &Item,
    attributes: &[AttributeSchema],
) -> Result<Cursor, ValidationError> {
    attributes
        .iter()
        .map(|attribute| extract(item, attribute))
        .collect::<Result<Vec<_>, _>>()
        .map(Cursor::from_entries)
}

fn render(value: &AttributeValue) -> String {
    ScalarType::of(value)
        .and_then(|scalar_type| scalar_type.render(value))
        .unwrap_or_default()
}

/// Encode `key` as a URL-safe item token.
///
/// Components are rendered as text in schema order, percent-encoded and joined with `,`.
pub fn encode_token(key: &StructuredKey) -> String {
    std::iter::once(&key.hash)
        .chain(key.range.as_ref())
        .map(|(_, value)| utf8_percent_encode(&render(value), URL_SAFE).to_string())
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Decode an item token produced by [`encode_token`] for `schema`
pub fn decode_token(token: &str, schema: &KeySchema) -> Result<StructuredKey, ValidationError> {
    let components: Vec<&str> = token.split(DELIMITER).collect();
    if components.len() != schema.arity() {
        return Err(ValidationError::KeyArity {
            expected: schema.arity(),
            found: components.len(),
        });
    }

    let mut values = components
        .into_iter()
        .zip(schema.attributes())
        .map(|(component, attribute)| {
            let text = percent_decode_str(component)
                .decode_utf8()
                .map_err(|_| ValidationError::InvalidToken(component.to_owned()))?;
            attribute.scalar_type().coerce(attribute.name(), &text)
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let hash = values.next().ok_or(ValidationError::KeyArity {
        expected: schema.arity(),
        found: 0,
    })?;
    StructuredKey::new(schema, hash, values.next())
}

#[cfg(test)]
mod tests {
    use super::{compose_cursor, compose_key, decode_token, encode_token, StructuredKey};
    use crate::error::ValidationError;
    use crate::schema::{AttributeSchema, KeySchema};
    use crate::types::{Item, ScalarType};
    use aws_sdk_dynamodb::primitives::Blob;
    use aws_sdk_dynamodb::types::AttributeValue;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn composite() -> KeySchema {
        KeySchema::composite(
            AttributeSchema::new("user", ScalarType::String),
            AttributeSchema::new("seq", ScalarType::Number),
        )
    }

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_compose_key() {
        let item = item(&[
            ("user", AttributeValue::S("ana".to_owned())),
            ("seq", AttributeValue::N("7".to_owned())),
            ("body", AttributeValue::S("hello".to_owned())),
        ]);
        let key = compose_key(&item, &composite()).unwrap();
        assert_eq!(2, key.to_key_map().len());
        assert_eq!(Some(("seq", &AttributeValue::N("7".to_owned()))), key.range());
    }

    #[test]
    fn test_compose_key_missing_attribute() {
        let item = item(&[("user", AttributeValue::S("ana".to_owned()))]);
        assert_eq!(
            Err(ValidationError::MissingKeyAttribute {
                attribute: "seq".to_owned()
            }),
            compose_key(&item, &composite())
        );
    }

    #[test]
    fn test_compose_key_wrong_type() {
        let item = item(&[
            ("user", AttributeValue::S("ana".to_owned())),
            ("seq", AttributeValue::S("7".to_owned())),
        ]);
        assert!(matches!(
            compose_key(&item, &composite()),
            Err(ValidationError::KeyTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_token_escapes_delimiter() {
        let key = StructuredKey::new(
            &composite(),
            AttributeValue::S("a,b %ü".to_owned()),
            Some(AttributeValue::N("-1.5".to_owned())),
        )
        .unwrap();
        let token = encode_token(&key);
        assert_eq!("a%2Cb%20%25%C3%BC,-1.5", token);
        assert_eq!(key, decode_token(&token, &composite()).unwrap());
    }

    #[test]
    fn test_decode_arity_mismatch() {
        assert_eq!(
            Err(ValidationError::KeyArity {
                expected: 2,
                found: 1
            }),
            decode_token("ana", &composite())
        );
        let hash_only = KeySchema::hash_only(AttributeSchema::new("id", ScalarType::String));
        assert_eq!(
            Err(ValidationError::KeyArity {
                expected: 1,
                found: 2
            }),
            decode_token("a,b", &hash_only)
        );
    }

    #[test]
    fn test_decode_rejects_bad_number_and_utf8() {
        assert!(matches!(
            decode_token("ana,seven", &composite()),
            Err(ValidationError::InvalidNumber { .. })
        ));
        assert!(matches!(
            decode_token("%FF,1", &composite()),
            Err(ValidationError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_compose_cursor_in_attribute_order() {
        let item = item(&[
            ("user", AttributeValue::S("ana".to_owned())),
            ("seq", AttributeValue::N("7".to_owned())),
            ("topic", AttributeValue::S("rust".to_owned())),
        ]);
        let attributes = [
            AttributeSchema::new("user", ScalarType::String),
            AttributeSchema::new("seq", ScalarType::Number),
            AttributeSchema::new("topic", ScalarType::String),
        ];
        let cursor = compose_cursor(&item, &attributes).unwrap();
        assert_eq!(
            r#"{"user":{"S":"ana"},"seq":{"N":"7"},"topic":{"S":"rust"}}"#,
            cursor.to_json()
        );
    }

    fn scalar(scalar_type: ScalarType) -> BoxedStrategy<AttributeValue> {
        match scalar_type {
            ScalarType::String => "\\PC*".prop_map(AttributeValue::S).boxed(),
            ScalarType::Number => prop_oneof![
                any::<i64>().prop_map(|n| n.to_string()),
                (-1.0e9f64..1.0e9).prop_map(|n| n.to_string()),
            ]
            .prop_map(AttributeValue::N)
            .boxed(),
            ScalarType::Binary => prop::collection::vec(any::<u8>(), 0..32)
                .prop_map(|bytes| AttributeValue::B(Blob::new(bytes)))
                .boxed(),
        }
    }

    fn scalar_type() -> impl Strategy<Value = ScalarType> {
        prop_oneof![
            Just(ScalarType::String),
            Just(ScalarType::Number),
            Just(ScalarType::Binary),
        ]
    }

    fn schema_and_key() -> impl Strategy<Value = (KeySchema, StructuredKey)> {
        (scalar_type(), prop::option::of(scalar_type())).prop_flat_map(|(hash, range)| {
            let schema = match range {
                Some(range) => KeySchema::composite(
                    AttributeSchema::new("h", hash),
                    AttributeSchema::new("r", range),
                ),
                None => KeySchema::hash_only(AttributeSchema::new("h", hash)),
            };
            let range_value = match range {
                Some(range) => scalar(range).prop_map(Some).boxed(),
                None => Just(None).boxed(),
            };
            (Just(schema), scalar(hash), range_value)
        })
        .prop_map(|(schema, hash, range)| {
            let key = StructuredKey::new(&schema, hash, range).unwrap();
            (schema, key)
        })
    }

    proptest! {
        #[test]
        fn token_round_trips((schema, key) in schema_and_key()) {
            let token = encode_token(&key);
            let unreserved = |b: u8| b.is_ascii_alphanumeric() || b"-_.~%,".contains(&b);
            prop_assert!(token.bytes().all(unreserved));
            prop_assert_eq!(key, decode_token(&token, &schema).unwrap());
        }
    }
}
