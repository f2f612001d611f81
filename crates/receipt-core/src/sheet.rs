//! Cell-addressed sheet storage.
//!
//! The response sheet and the document template are both [`Sheet`]s: a grid of
//! cells addressed by 1-based `(row, col)`, the way a spreadsheet host exposes
//! them. The pipeline only ever talks to the trait, so the host can be a real
//! spreadsheet service, a YAML file on disk ([`FileSheet`]) or an in-process
//! grid ([`MemorySheet`]).

use crate::error::{ReceiptError, Result};
use crate::io;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// CellValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Blank text counts as empty, the same as a cell nobody typed into.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Empty => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell / Grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default, skip_serializing_if = "CellValue::is_empty")]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// The cell renders as a checkbox (the trigger flag is attached).
    #[serde(default, skip_serializing_if = "is_false")]
    pub checkbox: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Cell {
    /// A checkbox that is ticked.
    pub fn is_checked(&self) -> bool {
        self.checkbox && self.value.as_bool() == Some(true)
    }
}

/// An owned copy of a whole sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grid {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Last row holding a value, checkbox or formatting; 0 for an empty sheet.
    pub fn last_row(&self) -> u32 {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| *c != Cell::default()))
            .map(|i| i as u32 + 1)
            .unwrap_or(0)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows
            .get(row.checked_sub(1)? as usize)?
            .get(col.checked_sub(1)? as usize)
    }

    pub fn cell_mut(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        check_address(row, col)?;
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize_with(c + 1, Cell::default);
        }
        Ok(&mut cells[c])
    }

    pub fn value(&self, row: u32, col: u32) -> CellValue {
        self.cell(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) -> Result<()> {
        self.cell_mut(row, col)?.value = value;
        Ok(())
    }

    /// Turn the cell into a checkbox. A non-boolean value becomes an unticked
    /// box; an existing boolean is kept.
    pub fn insert_checkbox(&mut self, row: u32, col: u32) -> Result<()> {
        let cell = self.cell_mut(row, col)?;
        cell.checkbox = true;
        if cell.value.as_bool().is_none() {
            cell.value = CellValue::Bool(false);
        }
        Ok(())
    }
}

fn check_address(row: u32, col: u32) -> Result<()> {
    if row == 0 || col == 0 {
        return Err(ReceiptError::InvalidAddress { row, col });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// A named grid hosted somewhere else. Implementors provide `view` and
/// `update`; every other operation is expressed through those two.
pub trait Sheet: Send + Sync {
    fn name(&self) -> String;

    fn view(&self, f: &mut dyn FnMut(&Grid)) -> Result<()>;

    fn update(&self, f: &mut dyn FnMut(&mut Grid) -> Result<()>) -> Result<()>;

    fn last_row(&self) -> Result<u32> {
        let mut last = 0;
        self.view(&mut |g: &Grid| last = g.last_row())?;
        Ok(last)
    }

    fn cell(&self, row: u32, col: u32) -> Result<Cell> {
        check_address(row, col)?;
        let mut out = Cell::default();
        self.view(&mut |g: &Grid| {
            if let Some(c) = g.cell(row, col) {
                out = c.clone();
            }
        })?;
        Ok(out)
    }

    /// Values of columns `1..=width` on `row`. Rows past the last row are an error.
    fn read_row(&self, row: u32, width: u32) -> Result<Vec<CellValue>> {
        check_address(row, 1)?;
        let mut out = Vec::new();
        let mut last = 0;
        self.view(&mut |g: &Grid| {
            last = g.last_row();
            out = (1..=width).map(|col| g.value(row, col)).collect();
        })?;
        if row > last {
            return Err(ReceiptError::RowOutOfRange { row, last });
        }
        Ok(out)
    }

    fn set_value(&self, row: u32, col: u32, value: CellValue) -> Result<()> {
        let mut value = Some(value);
        self.update(&mut |g: &mut Grid| {
            if let Some(v) = value.take() {
                g.set_value(row, col, v)?;
            }
            Ok(())
        })
    }

    fn set_background(&self, row: u32, col: u32, color: &str) -> Result<()> {
        self.update(&mut |g: &mut Grid| {
            g.cell_mut(row, col)?.background = Some(color.to_string());
            Ok(())
        })
    }

    fn insert_checkbox(&self, row: u32, col: u32) -> Result<()> {
        self.update(&mut |g: &mut Grid| g.insert_checkbox(row, col))
    }

    /// Append `values` after the last row and return the new row index.
    fn append_row(&self, values: Vec<CellValue>) -> Result<u32> {
        let mut values = Some(values);
        let mut row = 0;
        self.update(&mut |g: &mut Grid| {
            row = g.last_row() + 1;
            for (i, v) in values.take().unwrap_or_default().into_iter().enumerate() {
                g.set_value(row, i as u32 + 1, v)?;
            }
            Ok(())
        })?;
        Ok(row)
    }

    fn snapshot(&self) -> Result<Grid> {
        let mut out = Grid::default();
        self.view(&mut |g: &Grid| out = g.clone())?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MemorySheet
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySheet {
    grid: Mutex<Grid>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_grid(Grid::new(name))
    }

    pub fn from_grid(grid: Grid) -> Self {
        Self {
            grid: Mutex::new(grid),
        }
    }
}

impl Sheet for MemorySheet {
    fn name(&self) -> String {
        self.grid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .name
            .clone()
    }

    fn view(&self, f: &mut dyn FnMut(&Grid)) -> Result<()> {
        let grid = self.grid.lock().unwrap_or_else(|e| e.into_inner());
        f(&grid);
        Ok(())
    }

    fn update(&self, f: &mut dyn FnMut(&mut Grid) -> Result<()>) -> Result<()> {
        let mut grid = self.grid.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut grid)
    }
}

// ---------------------------------------------------------------------------
// FileSheet
// ---------------------------------------------------------------------------

/// A sheet persisted as YAML. Every mutation is load → modify → atomic write
/// while holding this handle's lock.
#[derive(Debug)]
pub struct FileSheet {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSheet {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(ReceiptError::SheetNotFound(path.display().to_string()));
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Write `grid` to `path` unless a sheet is already there.
    pub fn create_if_missing(path: &Path, grid: &Grid) -> Result<bool> {
        let data = serde_yaml::to_string(grid)?;
        io::write_if_missing(path, data.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Grid> {
        io::read_yaml(&self.path)
    }
}

impl Sheet for FileSheet {
    fn name(&self) -> String {
        self.load().map(|g| g.name).unwrap_or_default()
    }

    fn view(&self, f: &mut dyn FnMut(&Grid)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let grid = self.load()?;
        f(&grid);
        Ok(())
    }

    fn update(&self, f: &mut dyn FnMut(&mut Grid) -> Result<()>) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut grid = self.load()?;
        f(&mut grid)?;
        io::write_yaml(&self.path, &grid)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
