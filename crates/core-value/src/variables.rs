//! Variable table (spec §3 "Variable table"): canonical-name -> `Value`
//! for scalars, plus a small array store for `NAME(I)`/`NAME(I,J)` cells.
//!
//! The spec describes array bookkeeping as synthetic keys (`NAME(SIZE)`,
//! `NAME(DIMS)`, ...) living in the same flat map as scalars — a pattern
//! natural to a dynamically-typed host language. Rust has a better fit: a
//! second map from array name to an `ArrayCell` struct holding its
//! dimensions and backing storage directly. Observable behavior is
//! unchanged; this is the same kind of idiomatic substitution already
//! recorded for `core-program`'s `BTreeMap` vs. a parallel sorted index.

use crate::{BasicError, ErrorCode, Value};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Classic-BASIC default extent for an array referenced without a prior
/// `DIM` (indices `0..=10`, i.e. 11 cells per dimension).
const AUTO_DIM_SIZE: usize = 11;

struct ArrayCell {
    dims: Vec<usize>,
    cells: Vec<Value>,
    is_string: bool,
}

impl ArrayCell {
    fn new(dims: Vec<usize>, is_string: bool) -> Self {
        let total: usize = dims.iter().product();
        let fill = if is_string { Value::Str(Rc::from("")) } else { Value::Num(0.0) };
        Self { cells: vec![fill; total.max(1)], dims, is_string }
    }

    fn offset(&self, idx: &[usize]) -> Result<usize, BasicError> {
        if idx.len() != self.dims.len() {
            return Err(BasicError::new(
                ErrorCode::IllegalArgument,
                format!("array expects {} subscript(s), got {}", self.dims.len(), idx.len()),
            ));
        }
        let mut offset = 0usize;
        for (i, (&dim, &ix)) in self.dims.iter().zip(idx.iter()).enumerate() {
            if ix >= dim {
                return Err(BasicError::new(ErrorCode::IllegalArgument, format!("array subscript {ix} out of bounds in dimension {i}")));
            }
            offset = offset * dim + ix;
        }
        Ok(offset)
    }
}

/// Canonical (uppercased) name -> `Value` for scalars, plus a parallel
/// array store. Tracks which scalar names have ever been assigned so
/// `LOAD_VAR`'s "default vs. UNKNOWN_VARIABLE" rule (spec.md §4.F) can be
/// enforced without conflating "never touched" with "explicitly zeroed".
#[derive(Default)]
pub struct VariableTable {
    scalars: HashMap<Rc<str>, Value>,
    arrays: HashMap<Rc<str>, ArrayCell>,
    ever_assigned: HashSet<Rc<str>>,
}

impl VariableTable {
    /// A fresh table with the reserved constants spec.md §3 calls out as
    /// predefined on session init and program reset.
    pub fn new() -> Self {
        let mut t = Self::default();
        t.reset();
        t
    }

    /// `NEW`/`RUN`-time reset: clears everything, then reseeds the
    /// reserved names so a bare `PRINT PI` or `LOAD_VAR` on `INKEY$`
    /// never raises `UNKNOWN_VARIABLE`.
    pub fn reset(&mut self) {
        self.scalars.clear();
        self.arrays.clear();
        self.ever_assigned.clear();
        self.set_scalar("PI", Value::Num(std::f64::consts::PI));
        self.set_scalar("INKEY$", Value::Str(Rc::from("")));
    }

    pub fn set_scalar(&mut self, name: &str, value: Value) {
        let key: Rc<str> = Rc::from(name);
        self.ever_assigned.insert(key.clone());
        self.scalars.insert(key, value);
    }

    /// `LOAD_VAR`: returns the stored value, or the type default if the
    /// name has been used as an L-value before; otherwise `UNKNOWN_VARIABLE`.
    pub fn get_scalar(&self, name: &str) -> Result<Value, BasicError> {
        if let Some(v) = self.scalars.get(name) {
            return Ok(v.clone());
        }
        if self.ever_assigned.contains(name) {
            return Ok(Value::default_for_name(name));
        }
        Err(BasicError::new(ErrorCode::UnknownVariable, format!("unknown variable {name}")))
    }

    /// `DIM NAME(d1[, d2])`, 0-indexed with `d+1` cells per spec.md §6.
    pub fn dim_array(&mut self, name: &str, dims: Vec<usize>) -> Result<(), BasicError> {
        if dims.is_empty() || dims.len() > 2 {
            return Err(BasicError::new(ErrorCode::IllegalArgument, "DIM supports 1 or 2 dimensions"));
        }
        let sized: Vec<usize> = dims.into_iter().map(|d| d + 1).collect();
        let is_string = name.ends_with('$');
        self.arrays.insert(Rc::from(name), ArrayCell::new(sized, is_string));
        Ok(())
    }

    fn auto_dim(&mut self, name: &str, idx: &[usize]) {
        let dims: Vec<usize> = idx.iter().map(|&i| (i + 1).max(AUTO_DIM_SIZE)).collect();
        let is_string = name.ends_with('$');
        self.arrays.insert(Rc::from(name), ArrayCell::new(dims, is_string));
    }

    pub fn get_array(&mut self, name: &str, idx: &[usize]) -> Result<Value, BasicError> {
        if !self.arrays.contains_key(name) {
            self.auto_dim(name, idx);
        }
        let cell = self.arrays.get(name).expect("just inserted");
        let offset = cell.offset(idx)?;
        Ok(cell.cells[offset].clone())
    }

    pub fn set_array(&mut self, name: &str, idx: &[usize], value: Value) -> Result<(), BasicError> {
        if !self.arrays.contains_key(name) {
            self.auto_dim(name, idx);
        }
        let cell = self.arrays.get_mut(name).expect("just inserted");
        let offset = cell.offset(idx)?;
        cell.cells[offset] = value;
        Ok(())
    }

    pub fn array_is_string(&self, name: &str) -> bool {
        self.arrays.get(name).map(|c| c.is_string).unwrap_or_else(|| name.ends_with('$'))
    }

    /// Every assigned scalar, name-sorted, for the `VARS` command.
    pub fn scalar_entries(&self) -> Vec<(Rc<str>, Value)> {
        let mut entries: Vec<_> = self.scalars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_predefines_pi_and_inkey_dollar() {
        let t = VariableTable::new();
        assert_eq!(t.get_scalar("PI").unwrap().as_num().unwrap(), std::f64::consts::PI);
        assert_eq!(t.get_scalar("INKEY$").unwrap().as_str().unwrap(), "");
    }

    #[test]
    fn unassigned_name_is_unknown_variable() {
        let t = VariableTable::new();
        assert!(matches!(t.get_scalar("X"), Err(e) if e.code == ErrorCode::UnknownVariable));
    }

    #[test]
    fn name_used_as_lvalue_then_cleared_defaults_by_type() {
        let mut t = VariableTable::new();
        t.set_scalar("X", Value::Num(5.0));
        t.reset();
        // after reset X was never re-assigned, so it must error again.
        assert!(matches!(t.get_scalar("X"), Err(e) if e.code == ErrorCode::UnknownVariable));
    }

    #[test]
    fn dim_array_is_zero_indexed_and_initialized() {
        let mut t = VariableTable::new();
        t.dim_array("A", vec![2, 2]).unwrap();
        assert_eq!(t.get_array("A", &[1, 1]).unwrap(), Value::Num(0.0));
        t.set_array("A", &[1, 1], Value::Num(7.0)).unwrap();
        assert_eq!(t.get_array("A", &[1, 1]).unwrap(), Value::Num(7.0));
    }

    #[test]
    fn array_out_of_bounds_is_illegal_argument() {
        let mut t = VariableTable::new();
        t.dim_array("A", vec![2]).unwrap();
        assert!(matches!(t.get_array("A", &[10]), Err(e) if e.code == ErrorCode::IllegalArgument));
    }

    #[test]
    fn undeclared_array_auto_dims_on_first_use() {
        let mut t = VariableTable::new();
        assert_eq!(t.get_array("B", &[3]).unwrap(), Value::Num(0.0));
    }
}
