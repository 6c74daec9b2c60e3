/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue;

use crate::error::ValidationError;
use crate::schema::KeySchema;
use crate::types::ScalarType;

mod operator;

pub use operator::Operator;
use operator::Placement;

/// One user-entered constraint on a single attribute.
///
/// Deserializes from `{"attribute": "year", "operator": ">=", "value": "2000", "type": "N"}`.
/// `value` may be omitted for `attribute_exists` / `attribute_not_exists`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FilterCriterion {
    attribute: String,
    operator: Operator,
    #[serde(default)]
    value: String,
    #[serde(rename = "type")]
    scalar_type: ScalarType,
}

impl FilterCriterion {
    /// Create a new criterion
    pub fn new(
        attribute: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
        scalar_type: ScalarType,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
            scalar_type,
        }
    }

    /// The attribute being constrained
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The comparison operator
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The raw value as entered; `"low,high"` for `between`
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The declared scalar type of the value
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    fn bind(&self, index: usize, set: &mut ExpressionSet) -> Result<String, ValidationError> {
        let name = format!("#key{index}");
        let value = format!(":key{index}");
        let clause = match self.operator.arity() {
            0 => format!("{}({name})", self.operator),
            2 => {
                let parts: Vec<&str> = self.value.split(',').map(str::trim).collect();
                let [low, high] = parts.as_slice() else {
                    return Err(ValidationError::BetweenArity {
                        attribute: self.attribute.clone(),
                        found: parts.len(),
                    });
                };
                let (start, end) = (format!("{value}_start"), format!("{value}_end"));
                set.values.insert(
                    start.clone(),
                    self.scalar_type.coerce(&self.attribute, low)?,
                );
                set.values
                    .insert(end.clone(), self.scalar_type.coerce(&self.attribute, high)?);
                format!("{name} BETWEEN {start} AND {end}")
            }
            _ => {
                set.values.insert(
                    value.clone(),
                    self.scalar_type.coerce(&self.attribute, &self.value)?,
                );
                match self.operator {
                    Operator::BeginsWith | Operator::Contains => {
                        format!("{}({name}, {value})", self.operator)
                    }
                    _ => format!("{name} {} {value}", self.operator),
                }
            }
        };
        set.names.insert(name, self.attribute.clone());
        Ok(clause)
    }
}

/// Compiled key condition and filter expressions with their placeholder maps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionSet {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
    key_conditions: Vec<String>,
    filters: Vec<String>,
}

impl ExpressionSet {
    /// Key condition clauses in criterion order
    pub fn key_conditions(&self) -> &[String] {
        &self.key_conditions
    }

    /// Filter clauses in criterion order
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Placeholder to attribute name
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// Placeholder to typed value
    pub fn values(&self) -> &BTreeMap<String, AttributeValue> {
        &self.values
    }

    /// `KeyConditionExpression`, or `None` when no criterion qualified
    pub fn key_condition_expression(&self) -> Option<String> {
        join(&self.key_conditions)
    }

    /// `FilterExpression`, or `None` when every criterion became a key condition
    pub fn filter_expression(&self) -> Option<String> {
        join(&self.filters)
    }

    /// `ExpressionAttributeNames`, or `None` when empty
    pub fn expression_attribute_names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone().into_iter().collect())
    }

    /// `ExpressionAttributeValues`, or `None` when empty
    pub fn expression_attribute_values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone().into_iter().collect())
    }
}

fn join(clauses: &[String]) -> Option<String> {
    (!clauses.is_empty()).then(|| clauses.join(" AND "))
}

#[derive(Default)]
struct Compilation {
    set: ExpressionSet,
    constrained: Vec<String>,
}

/// Compile `filters` against the key schema of the selected table or index.
///
/// Pass `None` for `active` when scanning: nothing is eligible for a key condition and every
/// criterion becomes a filter. Placeholders are numbered by position in `filters`.
pub fn compile(
    filters: &[FilterCriterion],
    active: Option<&KeySchema>,
) -> Result<ExpressionSet, ValidationError> {
    filters
        .iter()
        .enumerate()
        .try_fold(Compilation::default(), |mut acc, (index, criterion)| {
            let key = active.and_then(|schema| schema.role_of(&criterion.attribute));
            let placement = criterion.operator.placement(key.map(|(role, _)| role));
            if placement == Placement::Illegal {
                return Err(ValidationError::IllegalKeyCondition {
                    attribute: criterion.attribute.clone(),
                    operator: criterion.operator,
                });
            }
            if let (Placement::KeyCondition, Some((_, attribute))) = (placement, key) {
                if attribute.scalar_type() != criterion.scalar_type {
                    return Err(ValidationError::KeyTypeMismatch {
                        attribute: criterion.attribute.clone(),
                        expected: attribute.scalar_type(),
                    });
                }
                if acc.constrained.contains(&criterion.attribute) {
                    return Err(ValidationError::DuplicateKeyCondition {
                        attribute: criterion.attribute.clone(),
                    });
                }
                acc.constrained.push(criterion.attribute.clone());
            }

            let clause = criterion.bind(index, &mut acc.set)?;
            match placement {
                Placement::KeyCondition => acc.set.key_conditions.push(clause),
                _ => acc.set.filters.push(clause),
            }
            Ok(acc)
        })
        .map(|acc| acc.set)
}

#[cfg(test)]
mod tests {
    use super::{compile, FilterCriterion, Operator};
    use crate::error::ValidationError;
    use crate::schema::{AttributeSchema, KeySchema};
    use crate::types::ScalarType;
    use aws_sdk_dynamodb::types::AttributeValue;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn movies_key() -> KeySchema {
        KeySchema::composite(
            AttributeSchema::new("year", ScalarType::Number),
            AttributeSchema::new("title", ScalarType::String),
        )
    }

    fn n(value: &str) -> AttributeValue {
        AttributeValue::N(value.to_owned())
    }

    #[test]
    fn test_between_number() {
        let set = compile(
            &[FilterCriterion::new(
                "score",
                Operator::Between,
                "3, 10",
                ScalarType::Number,
            )],
            None,
        )
        .unwrap();
        assert_eq!(
            Some("#key0 BETWEEN :key0_start AND :key0_end".to_owned()),
            set.filter_expression()
        );
        assert_eq!(Some(&n("3")), set.values().get(":key0_start"));
        assert_eq!(Some(&n("10")), set.values().get(":key0_end"));
        assert_eq!(Some(&"score".to_owned()), set.names().get("#key0"));
        assert_eq!(None, set.key_condition_expression());
    }

    #[test]
    fn test_between_arity() {
        for value in ["3", "1,2,3", ""] {
            let between =
                FilterCriterion::new("score", Operator::Between, value, ScalarType::Number);
            assert!(matches!(
                compile(&[between], None),
                Err(ValidationError::BetweenArity { .. })
            ));
        }
    }

    #[test]
    fn test_query_splits_key_conditions_and_filters() {
        let filters = [
            FilterCriterion::new("year", Operator::Eq, "2013", ScalarType::Number),
            FilterCriterion::new("title", Operator::BeginsWith, "Rush", ScalarType::String),
            FilterCriterion::new("rating", Operator::Ge, "7.5", ScalarType::Number),
            FilterCriterion::new("archived", Operator::NotExists, "", ScalarType::String),
        ];
        let set = compile(&filters, Some(&movies_key())).unwrap();
        assert_eq!(
            Some("#key0 = :key0 AND begins_with(#key1, :key1)".to_owned()),
            set.key_condition_expression()
        );
        assert_eq!(
            Some("#key2 >= :key2 AND attribute_not_exists(#key3)".to_owned()),
            set.filter_expression()
        );
        assert_eq!(4, set.expression_attribute_names().unwrap().len());
        assert_eq!(3, set.expression_attribute_values().unwrap().len());
    }

    #[test]
    fn test_begins_with_only_on_range() {
        let key = movies_key();
        let on_range = compile(
            &[FilterCriterion::new("title", Operator::BeginsWith, "A", ScalarType::String)],
            Some(&key),
        )
        .unwrap();
        assert_eq!(1, on_range.key_conditions().len());

        let elsewhere = compile(
            &[FilterCriterion::new("genre", Operator::BeginsWith, "A", ScalarType::String)],
            Some(&key),
        )
        .unwrap();
        assert_eq!(
            vec!["begins_with(#key0, :key0)".to_owned()],
            elsewhere.filters()
        );
    }

    #[test]
    fn test_scan_never_uses_key_conditions() {
        let set = compile(
            &[
                FilterCriterion::new("year", Operator::Eq, "2013", ScalarType::Number),
                FilterCriterion::new("title", Operator::Lt, "M", ScalarType::String),
            ],
            None,
        )
        .unwrap();
        assert!(set.key_conditions().is_empty());
        assert_eq!(2, set.filters().len());
    }

    #[test]
    fn test_ne_on_key_is_filter() {
        let set = compile(
            &[FilterCriterion::new("year", Operator::Ne, "1999", ScalarType::Number)],
            Some(&movies_key()),
        )
        .unwrap();
        assert_eq!(Some("#key0 <> :key0".to_owned()), set.filter_expression());
        assert_eq!(None, set.key_condition_expression());
    }

    #[test]
    fn test_illegal_range_operator_on_hash() {
        assert_eq!(
            Err(ValidationError::IllegalKeyCondition {
                attribute: "year".to_owned(),
                operator: Operator::Gt,
            }),
            compile(
                &[FilterCriterion::new("year", Operator::Gt, "2000", ScalarType::Number)],
                Some(&movies_key()),
            )
        );
    }

    #[test]
    fn test_duplicate_key_condition() {
        assert_eq!(
            Err(ValidationError::DuplicateKeyCondition {
                attribute: "title".to_owned(),
            }),
            compile(
                &[
                    FilterCriterion::new("title", Operator::Ge, "A", ScalarType::String),
                    FilterCriterion::new("title", Operator::Le, "M", ScalarType::String),
                ],
                Some(&movies_key()),
            )
        );
    }

    #[test]
    fn test_key_type_mismatch() {
        assert_eq!(
            Err(ValidationError::KeyTypeMismatch {
                attribute: "year".to_owned(),
                expected: ScalarType::Number,
            }),
            compile(
                &[FilterCriterion::new("year", Operator::Eq, "2013", ScalarType::String)],
                Some(&movies_key()),
            )
        );
    }

    #[test]
    fn test_invalid_number() {
        assert!(matches!(
            compile(
                &[FilterCriterion::new("rating", Operator::Gt, "high", ScalarType::Number)],
                None
            ),
            Err(ValidationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_empty_filters() {
        let set = compile(&[], Some(&movies_key())).unwrap();
        assert_eq!(None, set.key_condition_expression());
        assert_eq!(None, set.filter_expression());
        assert_eq!(None, set.expression_attribute_names());
        assert_eq!(None, set.expression_attribute_values());
    }

    #[test]
    fn test_deserialize_criteria() {
        let criteria: Vec<FilterCriterion> = serde_json::from_str(
            r#"[
                {"attribute": "year", "operator": "between", "value": "1990,1999", "type": "N"},
                {"attribute": "poster", "operator": "attribute_exists", "type": "S"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            vec![
                FilterCriterion::new("year", Operator::Between, "1990,1999", ScalarType::Number),
                FilterCriterion::new("poster", Operator::Exists, "", ScalarType::String),
            ],
            criteria
        );
    }

    fn operator() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Eq),
            Just(Operator::Ne),
            Just(Operator::Lt),
            Just(Operator::Le),
            Just(Operator::Gt),
            Just(Operator::Ge),
            Just(Operator::BeginsWith),
            Just(Operator::Contains),
            Just(Operator::Between),
            Just(Operator::Exists),
            Just(Operator::NotExists),
        ]
    }

    fn criterion() -> impl Strategy<Value = FilterCriterion> {
        (
            prop_oneof![Just("year"), Just("title"), Just("genre"), Just("rating")],
            operator(),
            prop_oneof![Just("1"), Just("2,3"), Just("abc"), Just("1, 7")],
            prop_oneof![Just(ScalarType::Number), Just(ScalarType::String)],
        )
            .prop_map(|(attribute, op, value, ty)| FilterCriterion::new(attribute, op, value, ty))
    }

    proptest! {
        #[test]
        fn compile_is_deterministic_and_total(
            filters in prop::collection::vec(criterion(), 0..6),
            query in any::<bool>(),
        ) {
            let key = movies_key();
            let active = query.then_some(&key);
            let first = compile(&filters, active);
            prop_assert_eq!(&first, &compile(&filters, active));

            if let Ok(set) = first {
                prop_assert_eq!(filters.len(), set.key_conditions().len() + set.filters().len());
                prop_assert_eq!(filters.len(), set.names().len());
                for clause in set.key_conditions().iter().chain(set.filters()) {
                    for token in clause.split([' ', '(', ')', ',']) {
                        if token.starts_with('#') {
                            prop_assert!(set.names().contains_key(token));
                        } else if token.starts_with(':') {
                            prop_assert!(set.values().contains_key(token));
                        }
                    }
                }
                for clause in set.key_conditions() {
                    prop_assert!(!clause.contains("<>"));
                    prop_assert!(!clause.contains("contains("));
                    prop_assert!(!clause.contains("attribute_"));
                }
            }
        }
    }
}
