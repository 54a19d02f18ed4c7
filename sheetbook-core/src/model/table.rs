//! The cell grid of a worksheet: rows, column descriptors and merged regions

use super::cell::Cell;
use super::indexed::{self, Indexed};
use super::row::{Column, Row};
use super::style::StyleId;
use crate::address::{CellPos, MAX_COLUMNS, MAX_ROWS, is_valid_address};
use crate::config::MergePolicy;
use crate::error::{Result, SheetError};
use std::cell::OnceCell;
use tracing::trace;

/// A merged block: anchor cell plus the extra rows and columns it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRegion {
    pub row: u32,
    pub col: u32,
    pub down: u32,
    pub across: u32,
}

impl MergeRegion {
    pub fn last_row(&self) -> u32 {
        self.row + self.down
    }

    pub fn last_col(&self) -> u32 {
        self.col + self.across
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.row..=self.last_row()).contains(&row) && (self.col..=self.last_col()).contains(&col)
    }

    pub fn is_anchor(&self, row: u32, col: u32) -> bool {
        self.row == row && self.col == col
    }

    pub fn overlaps(&self, other: &MergeRegion) -> bool {
        self.row <= other.last_row()
            && other.row <= self.last_row()
            && self.col <= other.last_col()
            && other.col <= self.last_col()
    }
}

/// Rows, columns and merged regions of one worksheet.
///
/// The merge list is derived lazily from the cells' spans and dropped whenever a merge is
/// added or removed or rows and columns shift.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Row>,
    columns: Vec<Column>,
    /// Width in points for columns without their own
    pub default_column_width: Option<f64>,
    /// Height in points for rows without their own
    pub default_row_height: Option<f64>,
    pub style_id: Option<StyleId>,
    merge_policy: MergePolicy,
    merges: OnceCell<Vec<MergeRegion>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(merge_policy: MergePolicy) -> Self {
        Self {
            merge_policy,
            ..Self::default()
        }
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn set_merge_policy(&mut self, policy: MergePolicy) {
        self.merge_policy = policy;
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows paired with their logical row number
    pub fn rows_with_index(&self) -> impl Iterator<Item = (u32, &Row)> {
        indexed::logical_indices(&self.rows)
            .into_iter()
            .zip(self.rows.iter())
    }

    /// Column descriptors paired with their logical column number
    pub fn columns_with_index(&self) -> impl Iterator<Item = (u32, &Column)> {
        indexed::logical_indices(&self.columns)
            .into_iter()
            .zip(self.columns.iter())
    }

    /// Every stored cell with its position, in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellPos, &Cell)> {
        self.rows_with_index().flat_map(|(r, row)| {
            row.cells_with_columns()
                .map(move |(c, cell)| (CellPos::new(r, c), cell))
        })
    }

    pub fn row(&self, index: u32) -> Option<&Row> {
        let lookup = indexed::find_by_index(&self.rows, index);
        lookup.found.then(|| &self.rows[lookup.position])
    }

    /// Row attributes for editing; the row is created if absent
    pub fn get_row(&mut self, index: u32) -> Result<&mut Row> {
        check_address(index, 1)?;
        let position = indexed::create_at_index(&mut self.rows, index);
        Ok(&mut self.rows[position])
    }

    /// Descriptor governing `index`, which may be a spanned column
    pub fn column(&self, index: u32) -> Option<&Column> {
        let lookup = indexed::find_by_index(&self.columns, index);
        if lookup.found {
            Some(&self.columns[lookup.position])
        } else {
            lookup.covered_by.map(|i| &self.columns[i])
        }
    }

    /// Column attributes for editing; a spanned descriptor is split so that only `index`
    /// is affected.
    pub fn get_column(&mut self, index: u32) -> Result<&mut Column> {
        check_address(1, index)?;
        let lookup = indexed::find_by_index(&self.columns, index);
        if lookup.found && self.columns[lookup.position].span() == 0 {
            return Ok(&mut self.columns[lookup.position]);
        }

        let template = if lookup.found {
            Some(lookup.position)
        } else {
            lookup.covered_by
        };
        let Some(source) = template else {
            let position = indexed::create_at_index(&mut self.columns, index);
            return Ok(&mut self.columns[position]);
        };

        // Split `source` into [start, index - 1], [index], [index + 1, end]
        let start = lookup.indices[source];
        let end = start + self.columns[source].span();
        let mut head = self.columns[source].clone();
        head.set_repeat(0);
        let mut tail = head.clone();
        self.columns.remove(source);
        let mut indices = indexed::logical_indices(&self.columns);
        let mut insert_at = source;
        if index > start {
            let mut before = head.clone();
            before.set_repeat(index - start - 1);
            self.columns.insert(insert_at, before);
            indices.insert(insert_at, start);
            insert_at += 1;
        }
        self.columns.insert(insert_at, head);
        indices.insert(insert_at, index);
        let target = insert_at;
        if end > index {
            tail.set_repeat(end - index - 1);
            self.columns.insert(insert_at + 1, tail);
            indices.insert(insert_at + 1, index + 1);
        }
        indexed::normalize(&mut self.columns, &indices);
        Ok(&mut self.columns[target])
    }

    /// Merged regions of the table, derived from anchor spans
    pub fn merge_regions(&self) -> &[MergeRegion] {
        self.merges.get_or_init(|| {
            self.cells()
                .filter(|(_, cell)| cell.is_merge_anchor())
                .map(|(pos, cell)| MergeRegion {
                    row: pos.row,
                    col: pos.col,
                    down: cell.merge_down(),
                    across: cell.merge_across(),
                })
                .collect()
        })
    }

    /// Region containing the position, if any
    pub fn merge_at(&self, row: u32, col: u32) -> Option<MergeRegion> {
        self.merge_regions()
            .iter()
            .find(|region| region.contains(row, col))
            .copied()
    }

    fn invalidate_merges(&mut self) {
        self.merges.take();
    }

    /// Read-only lookup honoring the merge policy: a covered position reads as its anchor
    /// under `Redirect` and fails under `Strict`.
    pub fn cell(&self, row: u32, col: u32) -> Result<Option<&Cell>> {
        check_address(row, col)?;
        let (row, col) = self.target(row, col, self.merge_policy)?;
        Ok(self.row(row).and_then(|r| r.cell(col)))
    }

    /// Cell at the position, created (with its row and column) if absent.
    ///
    /// A covered position of a merged region resolves according to the table's
    /// [`MergePolicy`].
    pub fn get_cell(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        check_address(row, col)?;
        let (row, col) = self.target(row, col, self.merge_policy)?;
        Ok(self.materialize(row, col))
    }

    /// Like [`get_cell`](Self::get_cell) but always strict about merged regions
    pub fn create_cell(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        check_address(row, col)?;
        let (row, col) = self.target(row, col, MergePolicy::Strict)?;
        Ok(self.materialize(row, col))
    }

    fn target(&self, row: u32, col: u32, policy: MergePolicy) -> Result<(u32, u32)> {
        match self.merge_at(row, col) {
            Some(region) if !region.is_anchor(row, col) => match policy {
                MergePolicy::Strict => Err(SheetError::MergeCell {
                    row,
                    col,
                    anchor_row: region.row,
                    anchor_col: region.col,
                }),
                MergePolicy::Redirect => {
                    trace!(row, col, anchor_row = region.row, anchor_col = region.col, "redirected to merge anchor");
                    Ok((region.row, region.col))
                }
            },
            _ => Ok((row, col)),
        }
    }

    fn materialize(&mut self, row: u32, col: u32) -> &mut Cell {
        let column = indexed::find_by_index(&self.columns, col);
        if !column.found && column.covered_by.is_none() {
            indexed::create_at_index(&mut self.columns, col);
        }

        let r = indexed::create_at_index(&mut self.rows, row);
        let cells = &mut self.rows[r].cells;
        let c = indexed::create_at_index(cells, col);
        let cell = &mut cells[c];
        cell.set_position(row, col);
        cell
    }

    /// Merge a block anchored at `(row, col)` spanning `down` extra rows and `across` extra
    /// columns. Cells inside the block other than the anchor are deleted; a block that
    /// partially overlaps an existing merge is rejected.
    pub fn merge_cell(&mut self, row: u32, col: u32, down: u32, across: u32) -> Result<()> {
        check_address(row, col)?;
        check_address(row.saturating_add(down), col.saturating_add(across))?;
        let region = MergeRegion {
            row,
            col,
            down,
            across,
        };

        let swallowed =
            |m: &MergeRegion| region.contains(m.row, m.col) && region.contains(m.last_row(), m.last_col());
        if let Some(existing) = self
            .merge_regions()
            .iter()
            .find(|m| m.overlaps(&region) && !swallowed(m))
        {
            return Err(SheetError::MergeCell {
                row: existing.row.max(row),
                col: existing.col.max(col),
                anchor_row: existing.row,
                anchor_col: existing.col,
            });
        }

        for r in row..=region.last_row() {
            let lookup = indexed::find_by_index(&self.rows, r);
            if !lookup.found {
                continue;
            }
            let cells = &mut self.rows[lookup.position].cells;
            let indices = indexed::logical_indices(cells);
            let mut kept_indices = Vec::with_capacity(indices.len());
            let mut position = 0;
            cells.retain(|_| {
                let c = indices[position];
                position += 1;
                let inside = (col..=region.last_col()).contains(&c) && !(r == row && c == col);
                if !inside {
                    kept_indices.push(c);
                }
                !inside
            });
            // Spans of merges swallowed by the new block go with their anchors
            indexed::normalize(cells, &kept_indices);
        }

        self.materialize(row, col);
        let lookup = indexed::find_by_index(&self.rows, row);
        let cells = &mut self.rows[lookup.position].cells;
        let indices = indexed::logical_indices(cells);
        let position = indexed::find_by_index(cells, col).position;
        cells[position].set_merge(across, down);
        indexed::normalize(cells, &indices);
        self.invalidate_merges();
        Ok(())
    }

    /// Clear the spans of the merge anchored at `(row, col)`. Returns false if there is none.
    pub fn unmerge_cell(&mut self, row: u32, col: u32) -> bool {
        let lookup = indexed::find_by_index(&self.rows, row);
        if !lookup.found {
            return false;
        }
        let cells = &mut self.rows[lookup.position].cells;
        let cell_lookup = indexed::find_by_index(cells, col);
        if !cell_lookup.found || !cells[cell_lookup.position].is_merge_anchor() {
            return false;
        }
        cells[cell_lookup.position].set_merge(0, 0);
        indexed::normalize(cells, &cell_lookup.indices);
        self.invalidate_merges();
        true
    }

    /// Delete a row, shifting later rows up. Merges crossing the row lose one row.
    pub fn del_row(&mut self, row: u32) -> Result<Option<Row>> {
        check_address(row, 1)?;
        let shrinking: Vec<MergeRegion> = self
            .merge_regions()
            .iter()
            .filter(|m| m.row < row && row <= m.last_row())
            .copied()
            .collect();
        for region in shrinking {
            self.set_anchor_merge(region.row, region.col, region.across, region.down - 1);
        }

        let removed = indexed::remove_at_index(&mut self.rows, row);
        self.invalidate_merges();
        Ok(removed)
    }

    /// Delete a column, shifting later cells and descriptors left. Merges crossing the
    /// column lose one column.
    pub fn del_column(&mut self, col: u32) -> Result<()> {
        check_address(1, col)?;
        for row in &mut self.rows {
            indexed::remove_at_index(&mut row.cells, col);
        }
        indexed::remove_at_index(&mut self.columns, col);
        self.invalidate_merges();
        Ok(())
    }

    /// Open an empty row at `row`, shifting it and later rows down
    pub fn insert_row(&mut self, row: u32) -> Result<()> {
        check_address(row, 1)?;
        let last = self.dimensions().0;
        if last >= MAX_ROWS && row <= last {
            return Err(SheetError::InvalidRange(format!(
                "inserting row {} would push content past row {}",
                row, MAX_ROWS
            )));
        }

        let growing: Vec<MergeRegion> = self
            .merge_regions()
            .iter()
            .filter(|m| m.row < row && row <= m.last_row())
            .copied()
            .collect();
        for region in growing {
            self.set_anchor_merge(region.row, region.col, region.across, region.down + 1);
        }

        indexed::insert_at_index(&mut self.rows, row);
        self.invalidate_merges();
        Ok(())
    }

    /// Open an empty column at `col`, shifting it and later columns right
    pub fn insert_column(&mut self, col: u32) -> Result<()> {
        check_address(1, col)?;
        let last = self.dimensions().1;
        if last >= MAX_COLUMNS && col <= last {
            return Err(SheetError::InvalidRange(format!(
                "inserting column {} would push content past column {}",
                col, MAX_COLUMNS
            )));
        }

        for row in &mut self.rows {
            indexed::insert_at_index(&mut row.cells, col);
        }
        indexed::insert_at_index(&mut self.columns, col);
        self.invalidate_merges();
        Ok(())
    }

    fn set_anchor_merge(&mut self, row: u32, col: u32, across: u32, down: u32) {
        let lookup = indexed::find_by_index(&self.rows, row);
        if !lookup.found {
            return;
        }
        let cells = &mut self.rows[lookup.position].cells;
        let cell_lookup = indexed::find_by_index(cells, col);
        if cell_lookup.found {
            cells[cell_lookup.position].set_merge(across, down);
            indexed::normalize(cells, &cell_lookup.indices);
        }
    }

    /// `(last row, last column)` in use by cells, merges, rows and column descriptors
    pub fn dimensions(&self) -> (u32, u32) {
        let mut last_row = indexed::last_position(&self.rows);
        let mut last_col = indexed::last_position(&self.columns);
        for row in &self.rows {
            last_col = last_col.max(row.last_column());
        }
        for region in self.merge_regions() {
            last_row = last_row.max(region.last_row());
            last_col = last_col.max(region.last_col());
        }
        (last_row, last_col)
    }

    /// Append a row during load. Rows must arrive in increasing order; the explicit index
    /// is kept until [`finish_load`](Self::finish_load) compacts it.
    pub(crate) fn push_row(&mut self, index: u32, mut row: Row) {
        row.set_index(Some(index));
        self.rows.push(row);
    }

    pub(crate) fn push_column(&mut self, index: u32, mut column: Column) {
        column.set_index(Some(index));
        self.columns.push(column);
    }

    /// Clear every table, column, row and cell style reference `keep` rejects
    pub(crate) fn retain_style_references(&mut self, keep: impl Fn(&StyleId) -> bool) {
        let rejected = |id: Option<&StyleId>| id.is_some_and(|id| !keep(id));
        if rejected(self.style_id.as_ref()) {
            self.style_id = None;
        }
        for column in &mut self.columns {
            if rejected(column.style_id.as_ref()) {
                column.style_id = None;
            }
        }
        for row in &mut self.rows {
            if rejected(row.style_id.as_ref()) {
                row.style_id = None;
            }
            for cell in &mut row.cells {
                if rejected(cell.style_id()) {
                    cell.set_style_id(None);
                }
            }
        }
    }

    /// Restore the compact index form after bulk loading
    pub(crate) fn finish_load(&mut self) {
        let indices = indexed::logical_indices(&self.rows);
        indexed::normalize(&mut self.rows, &indices);
        for row in &mut self.rows {
            let indices = indexed::logical_indices(&row.cells);
            indexed::normalize(&mut row.cells, &indices);
        }
        let indices = indexed::logical_indices(&self.columns);
        indexed::normalize(&mut self.columns, &indices);
        self.invalidate_merges();
    }
}

fn check_address(row: u32, col: u32) -> Result<()> {
    if is_valid_address(row, col) {
        Ok(())
    } else {
        Err(SheetError::AddressFormat { row, col })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::CellValue;

    fn text_at(table: &Table, row: u32, col: u32) -> Option<String> {
        table
            .row(row)
            .and_then(|r| r.cell(col))
            .map(|c| c.value().to_string())
    }

    #[test]
    fn test_get_cell_grows_rows_and_columns() {
        let mut table = Table::new();
        let cell = table.get_cell(2, 2).unwrap();
        assert_eq!((cell.row(), cell.col()), (2, 2));
        cell.set_value("Hello");

        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.columns().len(), 1);
        assert_eq!(text_at(&table, 2, 2).as_deref(), Some("Hello"));
        assert_eq!(table.dimensions(), (2, 2));
    }

    #[test]
    fn test_address_limits() {
        let mut table = Table::new();
        assert!(table.get_cell(65535, 256).is_ok());
        assert_eq!(
            table.get_cell(65536, 1).unwrap_err(),
            SheetError::AddressFormat { row: 65536, col: 1 }
        );
        assert!(matches!(table.get_cell(1, 257), Err(SheetError::AddressFormat { .. })));
        assert!(matches!(table.get_cell(0, 1), Err(SheetError::AddressFormat { .. })));
    }

    #[test]
    fn test_merge_deletes_inner_cells() {
        let mut table = Table::new();
        table.get_cell(1, 1).unwrap().set_value("anchor");
        table.get_cell(1, 2).unwrap().set_value("gone");
        table.get_cell(2, 2).unwrap().set_value("gone too");
        table.get_cell(1, 3).unwrap().set_value("stays");

        table.merge_cell(1, 1, 1, 1).unwrap();

        assert_eq!(table.merge_regions().len(), 1);
        assert!(text_at(&table, 1, 2).is_none());
        assert!(text_at(&table, 2, 2).is_none());
        assert_eq!(text_at(&table, 1, 1).as_deref(), Some("anchor"));
        assert_eq!(text_at(&table, 1, 3).as_deref(), Some("stays"));
    }

    #[test]
    fn test_redirect_policy_reaches_anchor() {
        let mut table = Table::new();
        table.merge_cell(1, 1, 1, 1).unwrap();

        let cell = table.get_cell(2, 2).unwrap();
        assert_eq!((cell.row(), cell.col()), (1, 1));
        cell.set_value("via covered");
        assert_eq!(text_at(&table, 1, 1).as_deref(), Some("via covered"));
        assert_eq!(
            table.cell(2, 1).unwrap().map(|c| c.value()),
            Some(CellValue::Text("via covered".to_string()))
        );
    }

    #[test]
    fn test_strict_policy_rejects_covered() {
        let mut table = Table::with_policy(MergePolicy::Strict);
        table.merge_cell(1, 1, 1, 1).unwrap();

        let err = table.get_cell(1, 2).unwrap_err();
        assert_eq!(
            err,
            SheetError::MergeCell {
                row: 1,
                col: 2,
                anchor_row: 1,
                anchor_col: 1
            }
        );
        assert!(table.get_cell(1, 1).is_ok());
    }

    #[test]
    fn test_create_cell_is_always_strict() {
        let mut table = Table::new();
        table.merge_cell(3, 3, 0, 2).unwrap();
        assert!(matches!(table.create_cell(3, 4), Err(SheetError::MergeCell { .. })));
        assert!(table.get_cell(3, 4).is_ok());
    }

    #[test]
    fn test_partial_overlap_rejected_and_containment_allowed() {
        let mut table = Table::new();
        table.merge_cell(2, 2, 1, 1).unwrap();
        assert!(table.merge_cell(3, 3, 1, 1).is_err());

        table.merge_cell(1, 1, 3, 3).unwrap();
        assert_eq!(
            table.merge_regions(),
            &[MergeRegion {
                row: 1,
                col: 1,
                down: 3,
                across: 3
            }]
        );
    }

    #[test]
    fn test_cells_after_merge_keep_position() {
        let mut table = Table::new();
        table.get_cell(1, 4).unwrap().set_value("d");
        table.merge_cell(1, 1, 0, 1).unwrap();
        assert_eq!(text_at(&table, 1, 4).as_deref(), Some("d"));

        assert!(table.unmerge_cell(1, 1));
        assert!(table.merge_regions().is_empty());
        assert_eq!(text_at(&table, 1, 4).as_deref(), Some("d"));
        assert!(!table.unmerge_cell(1, 1));
    }

    #[test]
    fn test_delete_and_insert_rows() {
        let mut table = Table::new();
        table.get_cell(1, 1).unwrap().set_value("one");
        table.get_cell(3, 1).unwrap().set_value("three");

        table.insert_row(2).unwrap();
        assert_eq!(text_at(&table, 4, 1).as_deref(), Some("three"));

        let removed = table.del_row(1).unwrap();
        assert!(removed.is_some());
        assert_eq!(text_at(&table, 3, 1).as_deref(), Some("three"));
        assert!(text_at(&table, 1, 1).is_none());
    }

    #[test]
    fn test_row_ops_adjust_merges() {
        let mut table = Table::new();
        table.merge_cell(1, 1, 2, 0).unwrap();
        table.insert_row(2).unwrap();
        assert_eq!(table.merge_regions()[0].down, 3);
        table.del_row(3).unwrap();
        table.del_row(3).unwrap();
        assert_eq!(table.merge_regions()[0].down, 1);
    }

    #[test]
    fn test_column_ops_adjust_cells_and_merges() {
        let mut table = Table::new();
        table.merge_cell(1, 1, 0, 2).unwrap();
        table.get_cell(1, 5).unwrap().set_value("e");

        table.insert_column(2).unwrap();
        assert_eq!(table.merge_regions()[0].across, 3);
        assert_eq!(text_at(&table, 1, 6).as_deref(), Some("e"));

        table.del_column(6).unwrap();
        assert!(text_at(&table, 1, 6).is_none());
        table.del_column(1).unwrap();
        assert!(table.merge_regions().is_empty());
    }

    #[test]
    fn test_insert_past_limit_rejected() {
        let mut table = Table::new();
        table.get_cell(65535, 1).unwrap();
        assert!(matches!(table.insert_row(10), Err(SheetError::InvalidRange(_))));

        let mut table = Table::new();
        table.get_cell(1, 256).unwrap();
        assert!(matches!(table.insert_column(1), Err(SheetError::InvalidRange(_))));
    }

    #[test]
    fn test_get_column_splits_span() {
        let mut table = Table::new();
        table.push_column(2, Column::with_width(30.0));
        table.columns[0].set_repeat(4);
        table.finish_load();

        table.get_column(4).unwrap().width = Some(90.0);
        let layout: Vec<(u32, u32, Option<f64>)> = table
            .columns_with_index()
            .map(|(i, c)| (i, c.span(), c.width))
            .collect();
        assert_eq!(
            layout,
            vec![
                (2, 1, Some(30.0)),
                (4, 0, Some(90.0)),
                (5, 1, Some(30.0))
            ]
        );
        assert_eq!(table.column(3).and_then(|c| c.width), Some(30.0));
    }
}
