//! Rectangular blocks of cells and bulk operations on them

use super::cell::{Cell, CellValue};
use super::style::{Border, BorderPosition, Borders, Color, LineStyle, StyleId, StyleSpec};
use super::styles::StyleRegistry;
use super::table::{MergeRegion, Table};
use crate::address::{CellPos, is_valid_address};
use crate::error::{Result, SheetError};
use std::fmt;

/// Which edges [`Range::set_border_on`] draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorderSides {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
    pub inside_horizontal: bool,
    pub inside_vertical: bool,
}

impl BorderSides {
    pub fn outline() -> Self {
        Self {
            top: true,
            bottom: true,
            left: true,
            right: true,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            inside_horizontal: true,
            inside_vertical: true,
            ..Self::outline()
        }
    }
}

/// A block of `height` x `width` cells anchored at `(row, col)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub row: u32,
    pub col: u32,
    pub height: u32,
    pub width: u32,
}

impl Range {
    pub fn new(row: u32, col: u32, height: u32, width: u32) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(SheetError::InvalidRange(format!(
                "empty range {}x{} at R{}C{}",
                height, width, row, col
            )));
        }
        for (r, c) in [(row, col), (row.saturating_add(height - 1), col.saturating_add(width - 1))] {
            if !is_valid_address(r, c) {
                return Err(SheetError::AddressFormat { row: r, col: c });
            }
        }
        Ok(Self {
            row,
            col,
            height,
            width,
        })
    }

    /// Parse `A1:B2` or a single `A1`
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || SheetError::InvalidRange(reference.to_string());
        let (start, end) = match reference.split_once(':') {
            Some((a, b)) => (CellPos::parse(a).ok_or_else(invalid)?, CellPos::parse(b).ok_or_else(invalid)?),
            None => {
                let pos = CellPos::parse(reference).ok_or_else(invalid)?;
                (pos, pos)
            }
        };
        let (top, bottom) = (start.row.min(end.row), start.row.max(end.row));
        let (left, right) = (start.col.min(end.col), start.col.max(end.col));
        Self::new(top, left, bottom - top + 1, right - left + 1)
    }

    pub fn last_row(&self) -> u32 {
        self.row + self.height - 1
    }

    pub fn last_col(&self) -> u32 {
        self.col + self.width - 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.row..=self.last_row()).contains(&row) && (self.col..=self.last_col()).contains(&col)
    }

    /// Every position in row-major order
    pub fn positions(&self) -> impl Iterator<Item = CellPos> {
        let (row, col, last_row, last_col) = (self.row, self.col, self.last_row(), self.last_col());
        (row..=last_row).flat_map(move |r| (col..=last_col).map(move |c| CellPos::new(r, c)))
    }

    /// Stored cells inside the block, row-major
    pub fn cells<'t>(&self, table: &'t Table) -> impl Iterator<Item = (CellPos, &'t Cell)> {
        let range = *self;
        table
            .cells()
            .filter(move |(pos, _)| range.contains(pos.row, pos.col))
    }

    /// Positions that hold their own cell: plain positions and merge anchors, each with
    /// the block it occupies
    fn own_cells(&self, table: &Table) -> Vec<MergeRegion> {
        self.positions()
            .filter_map(|pos| match table.merge_at(pos.row, pos.col) {
                Some(region) if region.is_anchor(pos.row, pos.col) => Some(region),
                Some(_) => None,
                None => Some(MergeRegion {
                    row: pos.row,
                    col: pos.col,
                    down: 0,
                    across: 0,
                }),
            })
            .collect()
    }

    /// Write a matrix of values row by row from the top-left corner. Covered positions of
    /// merged regions are skipped.
    pub fn set_values(&self, table: &mut Table, values: &[Vec<CellValue>]) -> Result<()> {
        if values.len() > self.height as usize
            || values.iter().any(|row| row.len() > self.width as usize)
        {
            return Err(SheetError::InvalidRange(format!(
                "{} rows of values do not fit in {}",
                values.len(),
                self
            )));
        }

        for (dr, row_values) in values.iter().enumerate() {
            for (dc, value) in row_values.iter().enumerate() {
                let (row, col) = (self.row + dr as u32, self.col + dc as u32);
                if table.merge_at(row, col).is_some_and(|m| !m.is_anchor(row, col)) {
                    continue;
                }
                table.create_cell(row, col)?.set_value(value.clone());
            }
        }
        Ok(())
    }

    /// Values as a `height` x `width` matrix; covered positions read as empty
    pub fn values(&self, table: &Table) -> Vec<Vec<CellValue>> {
        (self.row..=self.last_row())
            .map(|r| {
                (self.col..=self.last_col())
                    .map(|c| {
                        table
                            .row(r)
                            .and_then(|row| row.cell(c))
                            .map(|cell| cell.value())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    /// Overlay `spec` onto the style of every cell in the block
    pub fn set_style(
        &self,
        table: &mut Table,
        styles: &mut StyleRegistry,
        spec: &StyleSpec,
    ) -> Result<()> {
        for block in self.own_cells(table) {
            let cell = table.create_cell(block.row, block.col)?;
            let base = current_spec(styles, cell.style_id());
            cell.set_style(styles, base.merged(spec));
        }
        Ok(())
    }

    /// Draw borders on the chosen edges, keeping each cell's other style content
    pub fn set_border_on(
        &self,
        table: &mut Table,
        styles: &mut StyleRegistry,
        sides: BorderSides,
        line_style: LineStyle,
        weight: u8,
        color: Option<Color>,
    ) -> Result<()> {
        for block in self.own_cells(table) {
            let at_top = block.row == self.row;
            let at_bottom = block.last_row() >= self.last_row();
            let at_left = block.col == self.col;
            let at_right = block.last_col() >= self.last_col();
            let edges = [
                (BorderPosition::Top, if at_top { sides.top } else { sides.inside_horizontal }),
                (BorderPosition::Bottom, if at_bottom { sides.bottom } else { sides.inside_horizontal }),
                (BorderPosition::Left, if at_left { sides.left } else { sides.inside_vertical }),
                (BorderPosition::Right, if at_right { sides.right } else { sides.inside_vertical }),
            ];
            if !edges.iter().any(|(_, draw)| *draw) {
                continue;
            }

            let cell = table.create_cell(block.row, block.col)?;
            let mut spec = current_spec(styles, cell.style_id());
            let mut borders = spec.borders.take().unwrap_or_else(Borders::new);
            for (position, draw) in edges {
                if draw {
                    let mut border = Border::new(position, line_style, weight);
                    border.color = color.clone();
                    borders.set(border);
                }
            }
            spec.borders = Some(borders);
            cell.set_style(styles, spec);
        }
        Ok(())
    }

    /// Merge the whole block into one cell anchored at the top-left corner
    pub fn merge(&self, table: &mut Table) -> Result<()> {
        table.merge_cell(self.row, self.col, self.height - 1, self.width - 1)
    }

    /// Remove values and formulas, keeping styles and merges
    pub fn clear(&self, table: &mut Table) -> Result<()> {
        for block in self.own_cells(table) {
            if table.row(block.row).and_then(|r| r.cell(block.col)).is_some() {
                table.create_cell(block.row, block.col)?.clear();
            }
        }
        Ok(())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            CellPos::new(self.row, self.col),
            CellPos::new(self.last_row(), self.last_col())
        )
    }
}

fn current_spec(styles: &StyleRegistry, id: Option<&StyleId>) -> StyleSpec {
    id.and_then(|id| styles.get(id))
        .map(|style| style.spec.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::style::Interior;

    #[test]
    fn test_parse_and_display() {
        let range = Range::parse("B2:C4").unwrap();
        assert_eq!((range.row, range.col, range.height, range.width), (2, 2, 3, 2));
        assert_eq!(range.to_string(), "B2:C4");
        assert_eq!(Range::parse("C4:B2").unwrap(), range);
        assert!(Range::parse("B2:").is_err());
        assert!(matches!(Range::new(65535, 1, 2, 1), Err(SheetError::AddressFormat { .. })));
    }

    #[test]
    fn test_values_round_trip() {
        let mut table = Table::new();
        let range = Range::new(1, 1, 2, 2).unwrap();
        range
            .set_values(
                &mut table,
                &[
                    vec![CellValue::from("a"), CellValue::from(1.0)],
                    vec![CellValue::from(true)],
                ],
            )
            .unwrap();

        let values = range.values(&table);
        assert_eq!(values[0][0], CellValue::Text("a".to_string()));
        assert_eq!(values[0][1], CellValue::Number(1.0));
        assert_eq!(values[1][0], CellValue::Boolean(true));
        assert_eq!(values[1][1], CellValue::Empty);

        let too_wide = [vec![CellValue::Empty; 3]];
        assert!(range.set_values(&mut table, &too_wide).is_err());
    }

    #[test]
    fn test_values_skip_covered_cells() {
        let mut table = Table::new();
        let range = Range::new(1, 1, 1, 2).unwrap();
        range.merge(&mut table).unwrap();
        range
            .set_values(&mut table, &[vec![CellValue::from("kept"), CellValue::from("skipped")]])
            .unwrap();

        assert_eq!(
            range.values(&table),
            vec![vec![CellValue::Text("kept".to_string()), CellValue::Empty]]
        );
    }

    #[test]
    fn test_outline_border_shares_styles() {
        let mut table = Table::new();
        let mut styles = StyleRegistry::new();
        let range = Range::new(1, 1, 3, 3).unwrap();
        range
            .set_border_on(&mut table, &mut styles, BorderSides::outline(), LineStyle::Continuous, 1, None)
            .unwrap();

        // Centre untouched, four corners, four edge midpoints
        assert!(table.row(2).and_then(|r| r.cell(2)).is_none());
        let corner = table.row(1).and_then(|r| r.cell(1)).and_then(|c| c.style_id()).unwrap();
        let borders = styles.get(corner).unwrap().spec.borders.clone().unwrap();
        let positions: Vec<_> = borders.iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![BorderPosition::Left, BorderPosition::Top]);

        // Default + 4 corners + 4 edges
        assert_eq!(styles.len(), 9);

        let top_middle = table.row(1).and_then(|r| r.cell(2)).and_then(|c| c.style_id()).cloned();
        let top_right = table.row(1).and_then(|r| r.cell(3)).and_then(|c| c.style_id()).cloned();
        assert_ne!(top_middle, top_right);
    }

    #[test]
    fn test_set_style_keeps_existing_parts() {
        let mut table = Table::new();
        let mut styles = StyleRegistry::new();
        let range = Range::new(1, 1, 1, 2).unwrap();
        range
            .set_style(&mut table, &mut styles, &StyleSpec::new().with_number_format("0.00"))
            .unwrap();
        range
            .set_style(
                &mut table,
                &mut styles,
                &StyleSpec::new().with_interior(Interior::solid(Color::black())),
            )
            .unwrap();

        let id = table.row(1).and_then(|r| r.cell(2)).and_then(|c| c.style_id()).unwrap();
        let spec = &styles.get(id).unwrap().spec;
        assert!(spec.number_format.is_some());
        assert!(spec.interior.is_some());
        // Both cells share one style
        assert_eq!(table.row(1).and_then(|r| r.cell(1)).and_then(|c| c.style_id()), Some(id));
    }

    #[test]
    fn test_cells_lists_stored_cells_only() {
        let mut table = Table::new();
        table.create_cell(1, 1).unwrap().set_value(1);
        table.create_cell(2, 3).unwrap().set_value(2);
        table.create_cell(4, 2).unwrap().set_value(3);
        let range = Range::parse("A1:C3").unwrap();
        let found: Vec<String> = range.cells(&table).map(|(pos, _)| pos.to_a1()).collect();
        assert_eq!(found, vec!["A1", "C2"]);
    }

    #[test]
    fn test_clear_keeps_style() {
        let mut table = Table::new();
        let mut styles = StyleRegistry::new();
        let range = Range::new(1, 1, 1, 1).unwrap();
        range.set_values(&mut table, &[vec![CellValue::from("x")]]).unwrap();
        range
            .set_style(&mut table, &mut styles, &StyleSpec::new().with_number_format("0"))
            .unwrap();
        range.clear(&mut table).unwrap();

        let cell = table.row(1).and_then(|r| r.cell(1)).unwrap();
        assert!(cell.is_blank());
        assert!(cell.style_id().is_some());
    }
}
