//! Assembly of streamed events into named tabular datasets.
//!
//! The execution node interleaves row batches for any number of datasets in
//! one event stream; each batch names its dataset through `rset.source`.
//! Assembly runs in two passes so a table is registered before any batch is
//! merged into it, regardless of event ordering.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::transport::messages::{RowSet, StreamEvent};

/// One assembled dataset: declared columns and accumulated rows.
///
/// Immutable once assembly completes. Rows are appended exactly as the
/// stream delivered them; a batch declaring fewer columns than the union is
/// not padded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Accumulated rows in arrival order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    fn merge(&mut self, rset: RowSet) {
        for column in rset.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(rset.rows);
    }
}

/// The tables assembled from one query's event stream.
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    tables: HashMap<String, ResultTable>,
    skipped_events: usize,
}

impl QueryResults {
    /// Assemble tables from the decoded events of a finished stream.
    ///
    /// Pass 1 registers a table for every `data` event's `rset.source`.
    /// Pass 2 merges any event carrying a well-formed row set for a known
    /// table; everything else is skipped and counted, since the stream may
    /// carry control events with no tabular payload.
    pub fn assemble(events: &[StreamEvent]) -> Self {
        let mut results = QueryResults::default();

        for event in events {
            if event.event.as_deref() != Some("data") {
                continue;
            }
            if let Some(source) = event
                .data
                .as_ref()
                .and_then(|d| d.rset.as_ref())
                .and_then(|r| r.source.as_deref())
            {
                results.tables.entry(source.to_string()).or_default();
            }
        }

        for event in events {
            match usable_rset(event) {
                Some(rset) => {
                    let source = rset.source.clone().unwrap_or_default();
                    match results.tables.get_mut(&source) {
                        Some(table) => table.merge(rset),
                        None => results.skipped_events += 1,
                    }
                }
                None => results.skipped_events += 1,
            }
        }

        if results.skipped_events > 0 {
            warn!(
                skipped = results.skipped_events,
                "skipped stream events without usable row sets"
            );
        }

        results
    }

    /// Names of the assembled tables.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Look up one table.
    pub fn table(&self, name: &str) -> Option<&ResultTable> {
        self.tables.get(name)
    }

    /// All tables keyed by name.
    pub fn tables(&self) -> &HashMap<String, ResultTable> {
        &self.tables
    }

    /// How many stream events carried no usable row set.
    pub fn skipped_events(&self) -> usize {
        self.skipped_events
    }

    /// Best-effort row-major record view of one table: each row rendered as
    /// a JSON object keyed by the declared columns, pairing values
    /// positionally. Rows shorter than the column union simply omit the
    /// trailing keys; surplus values are dropped. The underlying table is
    /// never mutated.
    pub fn records(&self, name: &str) -> Option<Vec<Map<String, Value>>> {
        let table = self.tables.get(name)?;
        let records = table
            .rows
            .iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(column, value)| (column.clone(), value.clone()))
                    .collect()
            })
            .collect();
        Some(records)
    }
}

/// Keep/skip decision for one event: merged only when it carries a row set
/// with a source name.
fn usable_rset(event: &StreamEvent) -> Option<RowSet> {
    let rset = event.data.as_ref()?.rset.as_ref()?;
    rset.source.as_ref()?;
    Some(rset.clone())
}
