//! Focus collaborator: how an entity instance presents itself in a report.

use serde::Serialize;

use super::EntityRecord;
use crate::schema::EntitySchema;
use crate::value::Value;

/// Type name, display name and ordered fields of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusView {
    pub type_name: String,
    pub display_name: String,
    pub fields: Vec<(String, Value)>,
}

/// Produces the report-facing view of an entity record.
pub trait Focus: Send + Sync {
    fn view(&self, schema: &EntitySchema, record: &EntityRecord) -> FocusView;
}

/// Uses the schema's `display_fields` and `name_column`.
///
/// A display field missing from the record is reported as `NULL`. Without a
/// name column the display name is the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFocus;

impl Focus for DefaultFocus {
    fn view(&self, schema: &EntitySchema, record: &EntityRecord) -> FocusView {
        let display_name = schema
            .name_column
            .as_deref()
            .and_then(|column| record.get(column))
            .map(|v| v.to_string())
            .unwrap_or_else(|| record.display_name());

        let fields = schema
            .display_fields
            .iter()
            .map(|field| (field.clone(), record.get(field).cloned().unwrap_or_default()))
            .collect();

        FocusView {
            type_name: schema.name.clone(),
            display_name,
            fields,
        }
    }
}
