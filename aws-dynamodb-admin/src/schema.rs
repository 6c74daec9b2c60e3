/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_dynamodb::types::{KeySchemaElement, KeyType, TableDescription};

use crate::error::ConfigurationError;
use crate::types::{ScalarType, Selection};

/// An attribute name paired with its scalar type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSchema {
    name: String,
    scalar_type: ScalarType,
}

impl AttributeSchema {
    /// Create a new attribute schema
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
        }
    }

    /// The attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute's scalar type
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }
}

/// Which part of a primary key an attribute plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Partition key
    Hash,
    /// Sort key
    Range,
}

/// The primary key of a table or of one secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    hash: AttributeSchema,
    range: Option<AttributeSchema>,
}

impl KeySchema {
    /// Key schema with only a hash key
    pub fn hash_only(hash: AttributeSchema) -> Self {
        Self { hash, range: None }
    }

    /// Key schema with both a hash and a range key
    pub fn composite(hash: AttributeSchema, range: AttributeSchema) -> Self {
        Self {
            hash,
            range: Some(range),
        }
    }

    /// The hash key attribute
    pub fn hash(&self) -> &AttributeSchema {
        &self.hash
    }

    /// The range key attribute, if any
    pub fn range(&self) -> Option<&AttributeSchema> {
        self.range.as_ref()
    }

    /// Number of key attributes, 1 or 2
    pub fn arity(&self) -> usize {
        1 + usize::from(self.range.is_some())
    }

    /// Key attributes in declaration order, hash first
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        std::iter::once(&self.hash).chain(self.range.as_ref())
    }

    /// The role `attribute` plays in this key, if any
    pub fn role_of(&self, attribute: &str) -> Option<(KeyRole, &AttributeSchema)> {
        if self.hash.name == attribute {
            return Some((KeyRole::Hash, &self.hash));
        }
        self.range
            .as_ref()
            .filter(|range| range.name == attribute)
            .map(|range| (KeyRole::Range, range))
    }
}

/// Whether a secondary index is global or local
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Global secondary index
    Global,
    /// Local secondary index
    Local,
}

/// A secondary index and its key schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    name: String,
    kind: IndexKind,
    key_schema: KeySchema,
}

impl IndexSchema {
    /// Create a new index schema
    pub fn new(name: impl Into<String>, kind: IndexKind, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            kind,
            key_schema,
        }
    }

    /// The index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global or local
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// The index key schema
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }
}

/// Everything this crate needs to know about a table, resolved once from `DescribeTable`.
///
/// Every key attribute of the table and of each index is guaranteed to be declared in the
/// attribute definitions with a matching type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    attribute_definitions: Vec<AttributeSchema>,
    key_schema: KeySchema,
    indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// Create a table schema, checking `key_schema` against `attribute_definitions`
    pub fn new(
        name: impl Into<String>,
        attribute_definitions: Vec<AttributeSchema>,
        key_schema: KeySchema,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        check_declared(&attribute_definitions, &key_schema, &format!("table `{name}`"))?;
        Ok(Self {
            name,
            attribute_definitions,
            key_schema,
            indexes: Vec::new(),
        })
    }

    /// Add a secondary index, checking its key schema against the attribute definitions
    pub fn with_index(mut self, index: IndexSchema) -> Result<Self, ConfigurationError> {
        check_declared(
            &self.attribute_definitions,
            &index.key_schema,
            &format!("index `{}`", index.name),
        )?;
        self.indexes.push(index);
        Ok(self)
    }

    /// The table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's primary key schema
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Declared attribute definitions
    pub fn attribute_definitions(&self) -> &[AttributeSchema] {
        &self.attribute_definitions
    }

    /// Global and local secondary indexes
    pub fn indexes(&self) -> &[IndexSchema] {
        &self.indexes
    }

    /// The key schema that governs key-condition eligibility for `selection`
    pub fn key_schema_for(&self, selection: &Selection) -> Result<&KeySchema, ConfigurationError> {
        match selection {
            Selection::Table => Ok(&self.key_schema),
            Selection::Index(name) => self
                .indexes
                .iter()
                .find(|index| &index.name == name)
                .map(IndexSchema::key_schema)
                .ok_or_else(|| ConfigurationError::UnknownIndex {
                    table: self.name.clone(),
                    index: name.clone(),
                }),
        }
    }

    /// Attributes that make up a continuation key when reading `selection`.
    ///
    /// The table key comes first, followed by any index key attributes not already part of it.
    pub fn cursor_attributes(
        &self,
        selection: &Selection,
    ) -> Result<Vec<AttributeSchema>, ConfigurationError> {
        let mut attributes: Vec<AttributeSchema> = self.key_schema.attributes().cloned().collect();
        for attribute in self.key_schema_for(selection)?.attributes() {
            if !attributes.contains(attribute) {
                attributes.push(attribute.clone());
            }
        }
        Ok(attributes)
    }
}

fn check_declared(
    definitions: &[AttributeSchema],
    key_schema: &KeySchema,
    context: &str,
) -> Result<(), ConfigurationError> {
    for attribute in key_schema.attributes() {
        let declared = definitions
            .iter()
            .find(|definition| definition.name == attribute.name)
            .ok_or_else(|| ConfigurationError::UndefinedAttribute {
                attribute: attribute.name.clone(),
                context: context.to_owned(),
            })?;
        if declared.scalar_type != attribute.scalar_type {
            return Err(ConfigurationError::ConflictingAttributeType {
                attribute: attribute.name.clone(),
                declared: declared.scalar_type,
                used: attribute.scalar_type,
                context: context.to_owned(),
            });
        }
    }
    Ok(())
}

impl TryFrom<&TableDescription> for TableSchema {
    type Error = ConfigurationError;

    fn try_from(description: &TableDescription) -> Result<Self, Self::Error> {
        let name = description
            .table_name()
            .ok_or(ConfigurationError::MissingTableName)?;

        let attribute_definitions = description
            .attribute_definitions()
            .iter()
            .map(|definition| {
                let name = definition.attribute_name();
                ScalarType::from_sdk(definition.attribute_type())
                    .map(|scalar_type| AttributeSchema::new(name, scalar_type))
                    .ok_or_else(|| ConfigurationError::UnsupportedAttributeType {
                        attribute: definition.attribute_name().to_owned(),
                        found: definition.attribute_type().as_str().to_owned(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let key_schema = resolve_key_schema(
            description.key_schema(),
            &attribute_definitions,
            &format!("table `{name}`"),
        )?;
        let mut table = TableSchema::new(name, attribute_definitions, key_schema)?;

        let global = description.global_secondary_indexes().iter().map(|index| {
            (IndexKind::Global, index.index_name(), index.key_schema())
        });
        let local = description.local_secondary_indexes().iter().map(|index| {
            (IndexKind::Local, index.index_name(), index.key_schema())
        });
        for (kind, index_name, elements) in global.chain(local) {
            // an index without a name cannot be selected
            let Some(index_name) = index_name else {
                continue;
            };
            let key_schema = resolve_key_schema(
                elements,
                &table.attribute_definitions,
                &format!("index `{index_name}`"),
            )?;
            table = table.with_index(IndexSchema::new(index_name, kind, key_schema))?;
        }

        Ok(table)
    }
}

fn resolve_key_schema(
    elements: &[KeySchemaElement],
    definitions: &[AttributeSchema],
    context: &str,
) -> Result<KeySchema, ConfigurationError> {
    let lookup = |key_type: KeyType| -> Result<Option<AttributeSchema>, ConfigurationError> {
        let Some(element) = elements.iter().find(|e| *e.key_type() == key_type) else {
            return Ok(None);
        };
        definitions
            .iter()
            .find(|definition| definition.name() == element.attribute_name())
            .cloned()
            .map(Some)
            .ok_or_else(|| ConfigurationError::UndefinedAttribute {
                attribute: element.attribute_name().to_owned(),
                context: context.to_owned(),
            })
    };

    let hash = lookup(KeyType::Hash)?.ok_or_else(|| ConfigurationError::MissingHashKey {
        context: context.to_owned(),
    })?;
    Ok(match lookup(KeyType::Range)? {
        Some(range) => KeySchema::composite(hash, range),
        None => KeySchema::hash_only(hash),
    })
}
