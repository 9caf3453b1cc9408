//! Entity type descriptors returned by schema introspection.

use serde::{Deserialize, Serialize};

/// Which side of an association holds many rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// The source row points at one target row (`belongs_to`).
    One,
    /// The source row is pointed at by many target rows (`has_many`).
    Many,
}

impl Cardinality {
    /// Returns true if following this association can multiply rows.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::Many)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// Sort direction for an entity's preferred record ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// Preferred ordering of an entity's records within a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPreference {
    pub column: String,
    #[serde(default)]
    pub dir: SortDir,
}

/// A navigable association from one entity type to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Association {
    /// Association name (e.g. `products`, `category`)
    pub name: String,
    /// Target entity type
    pub target: String,
    pub cardinality: Cardinality,
    /// Foreign key column. Lives on the source for `One`, on the target for `Many`.
    #[serde(default)]
    pub foreign_key: String,
    /// Join entity for `has_many :through` style associations.
    #[serde(default)]
    pub through: Option<String>,
    /// Polymorphic associations are never followed as graph edges.
    #[serde(default)]
    pub polymorphic: bool,
}

impl Association {
    /// Source holds `foreign_key` pointing at the target's primary key.
    pub fn belongs_to(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            foreign_key: foreign_key.into(),
            through: None,
            polymorphic: false,
        }
    }

    /// Target holds `foreign_key` pointing at the source's primary key.
    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            foreign_key: foreign_key.into(),
            through: None,
            polymorphic: false,
        }
    }

    /// Reach `target` through the join entity `via`.
    pub fn has_many_through(name: &str, target: &str, via: &str) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            foreign_key: String::new(),
            through: Some(via.into()),
            polymorphic: false,
        }
    }

    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    pub fn is_through(&self) -> bool {
        self.through.is_some()
    }

    /// Whether this association becomes an edge in the entity graph.
    pub fn is_navigable(&self) -> bool {
        !self.is_through() && !self.polymorphic
    }
}

/// Everything the core needs to know about one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Physical storage identifier (table name). Defaults to the entity name.
    #[serde(default)]
    pub storage: Option<String>,
    /// Ancestor types, nearest first. Entities sharing storage must share lineage.
    #[serde(default)]
    pub lineage: Vec<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
    #[serde(default)]
    pub ordering: Option<OrderPreference>,
    /// Fields copied onto result tree nodes, in order.
    #[serde(default)]
    pub display_fields: Vec<String>,
    /// Column used as the node's display name.
    #[serde(default)]
    pub name_column: Option<String>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl EntitySchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            storage: None,
            lineage: vec![],
            associations: vec![],
            ordering: None,
            display_fields: vec![],
            name_column: None,
        }
    }

    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn with_storage(mut self, storage: &str) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn with_ancestor(mut self, ancestor: &str) -> Self {
        self.lineage.push(ancestor.into());
        self
    }

    pub fn with_association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn ordered_by(mut self, column: &str, dir: SortDir) -> Self {
        self.ordering = Some(OrderPreference {
            column: column.into(),
            dir,
        });
        self
    }

    pub fn with_display_fields(mut self, fields: &[&str]) -> Self {
        self.display_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_name_column(mut self, column: &str) -> Self {
        self.name_column = Some(column.into());
        self
    }

    /// Physical storage identifier.
    pub fn storage(&self) -> &str {
        self.storage.as_deref().unwrap_or(&self.name)
    }

    /// Ordering preference, defaulting to ascending primary key.
    pub fn ordering(&self) -> OrderPreference {
        self.ordering.clone().unwrap_or_else(|| OrderPreference {
            column: self.primary_key.clone(),
            dir: SortDir::Asc,
        })
    }

    /// Whether `other` appears in this entity's lineage.
    pub fn inherits_from(&self, other: &str) -> bool {
        self.lineage.iter().any(|a| a == other)
    }

    /// Associations that become graph edges.
    pub fn navigable_associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.iter().filter(|a| a.is_navigable())
    }

    pub fn through_associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.iter().filter(|a| a.is_through())
    }
}
