//! Result tree assembly from identity tuples and aggregate rows.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::AggregatePlan;
use crate::entity::{Layer, LayerEntity};
use crate::error::{ReportError, ReportResult};
use crate::schema::EntitySchema;
use crate::store::{DataStore, EntityRecord, Focus, Row};
use crate::tree::{NodeData, NodeId, ResultTree, ID_FIELD, NAME_FIELD, TYPE_FIELD};
use crate::value::Value;

/// Nodes of one tree depth, each keyed by the ids of its ancestor chain
/// (its own id last).
pub(super) type Level = Vec<(Vec<Value>, NodeId)>;

/// Build the layer nodes under the root, outermost layer first.
///
/// Identity rows are grouped once per depth into a multimap from parent
/// chain to child record indexes, so children keep the records' display
/// order. Level 0 holds the root alone.
pub(super) fn build_levels(
    tree: &mut ResultTree,
    layers: &[Layer],
    schemas: &[EntitySchema],
    rows: &[Row],
    store: &dyn DataStore,
    focus: &dyn Focus,
) -> ReportResult<Vec<Level>> {
    if let Some(short) = rows.iter().find(|row| row.len() < layers.len()) {
        return Err(ReportError::Store(format!(
            "identity row has {} values, expected {}",
            short.len(),
            layers.len()
        )));
    }

    let mut levels: Vec<Level> = vec![vec![(vec![], tree.root())]];

    for (depth, (layer, backing)) in layers.iter().zip(schemas).enumerate() {
        let ids: Vec<Value> = rows
            .iter()
            .map(|row| row[depth].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let records = layer.fetch_records(&ids, backing, store)?;
        let view_schema = match layer {
            Layer::Subgroup(subgroup) => subgroup.schema(),
            Layer::Entity(_) => backing.clone(),
        };
        let nodes: Vec<NodeData> = records
            .iter()
            .map(|record| node_data(layer, &view_schema, record, focus))
            .collect();
        debug!(layer = %layer, records = records.len(), "assembling layer");

        let position: HashMap<&Value, usize> =
            records.iter().enumerate().map(|(i, record)| (&record.id, i)).collect();
        let mut children_of: HashMap<&[Value], BTreeSet<usize>> = HashMap::new();
        for row in rows {
            if let Some(&index) = position.get(&row[depth]) {
                children_of.entry(&row[..depth]).or_default().insert(index);
            }
        }

        let mut next = Vec::new();
        for (chain, parent) in &levels[depth] {
            let Some(indexes) = children_of.get(chain.as_slice()) else {
                continue;
            };
            let children: Vec<NodeData> = indexes.iter().map(|&i| nodes[i].clone()).collect();
            let ids = tree.append_all(*parent, children)?;
            for (&i, id) in indexes.iter().zip(ids) {
                let mut child_chain = chain.clone();
                child_chain.push(records[i].id.clone());
                next.push((child_chain, id));
            }
        }
        levels.push(next);
    }

    Ok(levels)
}

fn node_data(layer: &Layer, schema: &EntitySchema, record: &EntityRecord, focus: &dyn Focus) -> NodeData {
    let view = focus.view(schema, record);
    let mut node = NodeData::new(&layer.name())
        .with_field(ID_FIELD, record.id.clone())
        .with_field(NAME_FIELD, view.display_name)
        .with_field(TYPE_FIELD, view.type_name);
    for (name, value) in view.fields {
        node = node.with_field(&name, value);
    }
    node
}

/// Set one aggregate relation's values on the nodes of its depth.
///
/// Rows are `(aggregates..., group keys...)`. Nodes whose chain has no row
/// are left without the fields.
pub(super) fn insert_aggregates(
    tree: &mut ResultTree,
    level: &Level,
    plan: &AggregatePlan,
    rows: &[Row],
) -> ReportResult<()> {
    let width = plan.fields.len();
    let mut by_chain: HashMap<&[Value], &[Value]> = HashMap::with_capacity(rows.len());
    for row in rows {
        if row.len() != width + plan.depth {
            return Err(ReportError::Store(format!(
                "aggregate row has {} values, expected {}",
                row.len(),
                width + plan.depth
            )));
        }
        let (values, keys) = row.split_at(width);
        by_chain.insert(keys, values);
    }

    for (chain, node) in level {
        if let Some(values) = by_chain.get(chain.as_slice()) {
            for (field, value) in plan.fields.iter().zip(values.iter()) {
                tree.set_field(*node, field, value.clone())?;
            }
        }
    }

    Ok(())
}
