//! Dense numeric grid of evaluated cell values
//!
//! Row-major `f32` storage, allocated once at a fixed size. Cell keys are
//! decoded to zero-based (column, row) and bounds-checked before any access.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{SheetError, SheetResult};

fn cell_key_re() -> &'static Regex {
    static CELL_KEY_RE: OnceLock<Regex> = OnceLock::new();
    CELL_KEY_RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Z]+)(?<numbers>[0-9]+)$").expect("cell key regex must compile")
    })
}

/// Decode a cell key into zero-based `(column, row)`.
///
/// Only the first column letter is decoded (`A` → 0 … `Z` → 25). Keys such as
/// "AB3" match the grammar but decode as column `A`; bijective base-26
/// columns are not supported. Row "0" decodes to `None` since rows are 1-based.
pub fn decode_key(key: &str) -> Option<(usize, usize)> {
    let caps = cell_key_re().captures(key)?;
    let first = caps["letters"].bytes().next()?;
    let column = (first - b'A') as usize;
    let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
    Some((column, row))
}

/// Single-letter key that a multi-letter key shares storage with.
///
/// `AB1` decodes like `A1`, so both land in the same slot. `None` for
/// single-letter keys and keys that do not decode.
pub fn storage_alias(key: &str) -> Option<String> {
    let caps = cell_key_re().captures(key)?;
    if caps["letters"].len() < 2 {
        return None;
    }
    let (column, row) = decode_key(key)?;
    encode_key(column, row)
}

/// Encode zero-based coordinates back into a key (single-letter columns only)
pub fn encode_key(column: usize, row: usize) -> Option<String> {
    if column >= 26 {
        return None;
    }
    Some(format!("{}{}", (b'A' + column as u8) as char, row + 1))
}

/// Outcome of a bounds-checked write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellWrite {
    /// Value stored at this flat index
    Stored(usize),
    /// Key did not decode or fell outside the grid; nothing was written
    OutOfBounds,
    /// No formula is registered for the key; nothing was written
    Missing,
}

impl CellWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, CellWrite::Stored(_))
    }
}

/// Fixed-size grid of evaluated values
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Table {
    /// Zero-initialised `width` × `height` grid
    pub fn new(width: usize, height: usize) -> SheetResult<Self> {
        if width == 0 || height == 0 {
            return Err(SheetError::InvalidDimensions { width, height });
        }
        let len = width
            .checked_mul(height)
            .ok_or(SheetError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            data: vec![0.0; len],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Flat index for `key`, or `None` when it does not decode or is out of bounds
    pub fn index_of(&self, key: &str) -> Option<usize> {
        let (column, row) = decode_key(key)?;
        if column < self.width && row < self.height {
            Some(row * self.width + column)
        } else {
            None
        }
    }

    /// Stored value for `key`; `None` when out of bounds
    pub fn get(&self, key: &str) -> Option<f32> {
        self.index_of(key).map(|i| self.data[i])
    }

    /// Write through the bounds check; an unknown key is reported, not dropped silently
    pub fn set(&mut self, key: &str, value: f32) -> CellWrite {
        match self.index_of(key) {
            Some(index) => {
                self.data[index] = value;
                CellWrite::Stored(index)
            }
            None => CellWrite::OutOfBounds,
        }
    }

    pub(crate) fn set_index(&mut self, index: usize, value: f32) {
        self.data[index] = value;
    }

    /// Row slices, top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks(self.width)
    }
}
