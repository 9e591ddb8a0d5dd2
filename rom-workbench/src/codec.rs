//! Table decoding engine
//!
//! Decodes raw ROM bytes into typed numeric grids based on the table
//! definitions. The codec is stateless; it reads cells as 4-byte big-endian
//! IEEE-754 floats and bounds-checks every span against the image before
//! touching it.

use crate::definition::{DefinitionSet, Scaling, TableDefinition, TableKind};
use crate::rom::RomImage;
use crate::types::{Result, WorkbenchError};
use byteorder::{BigEndian, ByteOrder};

/// Bytes per table cell
const CELL_SIZE: u64 = 4;

/// Read one big-endian f32 out of a byte slice
///
/// Pure conversion with a defined byte order, independent of the platform.
/// Returns None if the slice does not hold 4 bytes at `offset`.
pub fn read_f32_be(data: &[u8], offset: usize) -> Option<f32> {
    let end = offset.checked_add(4)?;
    data.get(offset..end).map(BigEndian::read_f32)
}

/// A decoded table: a row-major grid of cells plus display metadata
///
/// `None` cells are the blank corner of a header layout. The format strings
/// are the resolved scalings' display formats, carried along for whoever
/// renders the grid; the codec itself stops at typed values.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGrid {
    /// Dimensionality this grid was decoded as
    pub kind: TableKind,
    /// Number of rows, including the header row where one exists
    pub rows: usize,
    /// Number of columns, including the header column where one exists
    pub cols: usize,
    /// Display format for the X-axis header values
    pub x_format: Option<String>,
    /// Display format for the Y-axis header values
    pub y_format: Option<String>,
    /// Display format for data cells
    pub cell_format: Option<String>,
    cells: Vec<Option<f32>>,
}

impl TableGrid {
    fn blank(kind: TableKind, rows: usize, cols: usize) -> Self {
        Self {
            kind,
            rows,
            cols,
            x_format: None,
            y_format: None,
            cell_format: None,
            cells: vec![None; rows * cols],
        }
    }

    fn set(&mut self, row: usize, col: usize, value: f32) {
        self.cells[row * self.cols + col] = Some(value);
    }

    /// Cell at (row, col); None for the blank corner
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.cells.get(row * self.cols + col).copied().flatten()
    }

    /// One row of cells
    pub fn row(&self, row: usize) -> &[Option<f32>] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }
}

/// Stateless table decoder
pub struct TableCodec;

impl TableCodec {
    /// Decode a table out of a ROM image
    ///
    /// # Errors
    /// * [`WorkbenchError::MalformedDefinition`] if the axis count disagrees
    ///   with the declared kind
    /// * [`WorkbenchError::MissingScaling`] if the table (or a consulted
    ///   axis) has an unresolved scaling reference
    /// * [`WorkbenchError::OutOfBounds`] if any cell span exceeds the image
    pub fn decode(
        set: &DefinitionSet,
        table: &TableDefinition,
        rom: &RomImage,
    ) -> Result<TableGrid> {
        if table.axes.len() != table.kind.expected_axes() {
            return Err(WorkbenchError::MalformedDefinition {
                table: table.name.clone(),
                detail: format!(
                    "declared {} but has {} axis sub-table(s)",
                    table.kind,
                    table.axes.len()
                ),
            });
        }

        let scaling = Self::resolved_scaling(set, table)?;
        log::debug!(
            "Decoding {} table '{}' at 0x{:X}",
            table.kind,
            table.name,
            table.address
        );

        match table.kind {
            TableKind::OneD => Self::decode_1d(table, rom, scaling),
            TableKind::TwoD => Self::decode_2d(set, table, rom, scaling),
            TableKind::ThreeD => Self::decode_3d(set, table, rom, scaling),
        }
    }

    /// 1D: `element_count` consecutive cells starting at the table address
    fn decode_1d(table: &TableDefinition, rom: &RomImage, scaling: &Scaling) -> Result<TableGrid> {
        Self::check_span(&table.name, rom, table.address, table.element_count.into())?;

        let cols = table.element_count as usize;
        let mut grid = TableGrid::blank(TableKind::OneD, 1, cols);
        grid.cell_format = Some(scaling.display_format.clone());

        for i in 0..cols {
            let value = Self::cell(&table.name, rom, table.address + i as u64 * CELL_SIZE)?;
            grid.set(0, i, value);
        }
        Ok(grid)
    }

    /// 2D: axis-only header row, a blank corner followed by the X-axis
    /// values read from the axis's own address. No data plane is read; the
    /// definitions in circulation use 2D tables purely as labelled axes.
    fn decode_2d(
        set: &DefinitionSet,
        table: &TableDefinition,
        rom: &RomImage,
        scaling: &Scaling,
    ) -> Result<TableGrid> {
        let x_axis = &table.axes[0];
        let x_scaling = Self::resolved_scaling(set, x_axis)?;
        Self::check_span(&x_axis.name, rom, x_axis.address, x_axis.element_count.into())?;

        let cols = x_axis.element_count as usize + 1;
        let mut grid = TableGrid::blank(TableKind::TwoD, 1, cols);
        grid.x_format = Some(x_scaling.display_format.clone());
        grid.cell_format = Some(scaling.display_format.clone());

        for xi in 0..x_axis.element_count as usize {
            let value = Self::cell(&x_axis.name, rom, x_axis.address + xi as u64 * CELL_SIZE)?;
            grid.set(0, xi + 1, value);
        }
        Ok(grid)
    }

    /// 3D: X-axis header row, Y-axis header column, and a data plane stored
    /// column-major: each X step strides `y.element_count` cells, each Y
    /// step strides one cell.
    fn decode_3d(
        set: &DefinitionSet,
        table: &TableDefinition,
        rom: &RomImage,
        scaling: &Scaling,
    ) -> Result<TableGrid> {
        let (x_axis, y_axis) = if table.swap_axes {
            (&table.axes[1], &table.axes[0])
        } else {
            (&table.axes[0], &table.axes[1])
        };
        let x_scaling = Self::resolved_scaling(set, x_axis)?;
        let y_scaling = Self::resolved_scaling(set, y_axis)?;

        Self::check_span(&x_axis.name, rom, x_axis.address, x_axis.element_count.into())?;
        Self::check_span(&y_axis.name, rom, y_axis.address, y_axis.element_count.into())?;
        Self::check_span(
            &table.name,
            rom,
            table.address,
            x_axis.element_count as u64 * y_axis.element_count as u64,
        )?;

        let x_count = x_axis.element_count as usize;
        let y_count = y_axis.element_count as usize;
        let y_stride = y_axis.element_count as u64 * CELL_SIZE;

        let mut grid = TableGrid::blank(TableKind::ThreeD, y_count + 1, x_count + 1);
        grid.x_format = Some(x_scaling.display_format.clone());
        grid.y_format = Some(y_scaling.display_format.clone());
        grid.cell_format = Some(scaling.display_format.clone());

        for xi in 0..x_count {
            let value = Self::cell(&x_axis.name, rom, x_axis.address + xi as u64 * CELL_SIZE)?;
            grid.set(0, xi + 1, value);
        }

        for yi in 0..y_count {
            let header = Self::cell(&y_axis.name, rom, y_axis.address + yi as u64 * CELL_SIZE)?;
            grid.set(yi + 1, 0, header);

            for xi in 0..x_count {
                let address = table.address + xi as u64 * y_stride + yi as u64 * CELL_SIZE;
                let value = Self::cell(&table.name, rom, address)?;
                grid.set(yi + 1, xi + 1, value);
            }
        }
        Ok(grid)
    }

    fn resolved_scaling<'a>(
        set: &'a DefinitionSet,
        table: &TableDefinition,
    ) -> Result<&'a Scaling> {
        set.scaling_for(table)
            .ok_or_else(|| WorkbenchError::MissingScaling {
                table: table.name.clone(),
                scaling: table.scaling_name.clone(),
            })
    }

    /// Verify that `count` cells starting at `address` fit inside the image
    fn check_span(name: &str, rom: &RomImage, address: u64, count: u64) -> Result<()> {
        let len = count.saturating_mul(CELL_SIZE);
        let end = address.checked_add(len);
        match end {
            Some(end) if end <= rom.len() as u64 => Ok(()),
            _ => Err(WorkbenchError::OutOfBounds {
                table: name.to_string(),
                address,
                len: len as usize,
                rom_len: rom.len(),
            }),
        }
    }

    fn cell(name: &str, rom: &RomImage, address: u64) -> Result<f32> {
        read_f32_be(rom.as_bytes(), address as usize).ok_or_else(|| {
            WorkbenchError::OutOfBounds {
                table: name.to_string(),
                address,
                len: CELL_SIZE as usize,
                rom_len: rom.len(),
            }
        })
    }
}
