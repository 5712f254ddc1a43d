//! Row packing for groups with a `row-items` capacity.

use crate::{
    common::format_float,
    render_data::{DataItem, RenderData},
};

/// One row of a packed group.
#[derive(Debug, PartialEq)]
pub(super) enum Row<'a> {
    /// An item rendered normally, outside of any row.
    Item(&'a RenderData),
    /// A row of data items sharing the group width.
    Smart(Vec<Cell<'a>>),
}

/// A data item in a row.
#[derive(Debug, PartialEq)]
pub(super) struct Cell<'a> {
    /// The data item.
    pub data: &'a DataItem,
    /// The inline style giving the width of the item.
    pub style: String,
}

/// Packs the items of a group into rows of at most `capacity` total span.
///
/// Only data items without an explicit layout take part in packing; any other
/// item ends the current row and is emitted on its own. An item whose span is
/// larger than the capacity gets a row to itself.
pub(super) fn pack(items: &[RenderData], capacity: u32) -> Vec<Row<'_>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut row_span: u32 = 0;

    for item in items {
        match item {
            RenderData::Data(data) if data.layout.as_deref() != Some("default") => {
                if !row.is_empty() && row_span.saturating_add(data.span) > capacity {
                    rows.push(finish(core::mem::take(&mut row), row_span));
                    row_span = 0;
                }
                row_span = row_span.saturating_add(data.span);
                row.push(data);
            }
            _ => {
                if !row.is_empty() {
                    rows.push(finish(core::mem::take(&mut row), row_span));
                    row_span = 0;
                }
                rows.push(Row::Item(item));
            }
        }
    }

    if !row.is_empty() {
        rows.push(finish(row, row_span));
    }

    rows
}

/// Sizes the items of a row relative to its total span.
fn finish(row: Vec<&DataItem>, row_span: u32) -> Row<'_> {
    Row::Smart(
        row.into_iter()
            .map(|data| {
                let width = f64::from(data.span) / f64::from(row_span) * 100.0;
                Cell {
                    data,
                    style: format!("width: {}%", format_float(width)),
                }
            })
            .collect(),
    )
}
