/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::schema::KeyRole;

/// Comparison operators a filter criterion may use.
///
/// The serialized form of each variant is its wire token, e.g. `<=` or `begins_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum Operator {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `<>`
    #[serde(rename = "<>")]
    Ne,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `begins_with`
    #[serde(rename = "begins_with")]
    BeginsWith,
    /// `contains`
    #[serde(rename = "contains")]
    Contains,
    /// `between`, value is `"low,high"`
    #[serde(rename = "between")]
    Between,
    /// `attribute_exists`, value is ignored
    #[serde(rename = "attribute_exists")]
    Exists,
    /// `attribute_not_exists`, value is ignored
    #[serde(rename = "attribute_not_exists")]
    NotExists,
}

/// Where a compiled clause for a criterion ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    KeyCondition,
    Filter,
    /// The operator constrains a key attribute in a way key conditions do not allow
    Illegal,
}

impl Operator {
    /// The wire token for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::BeginsWith => "begins_with",
            Operator::Contains => "contains",
            Operator::Between => "between",
            Operator::Exists => "attribute_exists",
            Operator::NotExists => "attribute_not_exists",
        }
    }

    /// Number of values bound by a clause using this operator
    pub(crate) fn arity(&self) -> usize {
        match self {
            Operator::Exists | Operator::NotExists => 0,
            Operator::Between => 2,
            _ => 1,
        }
    }

    /// Decide the placement of a criterion on an attribute playing `role` in the active key
    pub(crate) fn placement(&self, role: Option<KeyRole>) -> Placement {
        use Operator::*;
        match (self, role) {
            (Ne | Contains | Exists | NotExists, _) => Placement::Filter,
            (_, None) => Placement::Filter,
            (Eq, Some(_)) => Placement::KeyCondition,
            (Lt | Le | Gt | Ge | BeginsWith | Between, Some(KeyRole::Range)) => {
                Placement::KeyCondition
            }
            (Lt | Le | Gt | Ge, Some(KeyRole::Hash)) => Placement::Illegal,
            (BeginsWith | Between, Some(KeyRole::Hash)) => Placement::Filter,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" => Operator::Eq,
            "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "begins_with" => Operator::BeginsWith,
            "contains" => Operator::Contains,
            "between" => Operator::Between,
            "attribute_exists" => Operator::Exists,
            "attribute_not_exists" => Operator::NotExists,
            other => return Err(ValidationError::UnknownOperator(other.to_owned())),
        })
    }
}
