// Named, lock-guarded row sequence with positional edits, linear search and stable typed sorts.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::Duration;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

/// Typed projection used to order rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortType {
    String,
    Number,
    Duration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOption {
    Ascending,
    Descending,
}

impl SortOption {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOption::Ascending => ordering,
            SortOption::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(SortType::String),
            "number" => Ok(SortType::Number),
            "duration" => Ok(SortType::Duration),
            other => Err(Error::new(ErrorKind::UnsupportedType)
                .with_message(format!("unknown sort type {other:?}"))),
        }
    }
}

impl FromStr for SortOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" => Ok(SortOption::Ascending),
            "descending" => Ok(SortOption::Descending),
            other => Err(Error::new(ErrorKind::UnsupportedType)
                .with_message(format!("unknown sort option {other:?}"))),
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortType::String => "string",
            SortType::Number => "number",
            SortType::Duration => "duration",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOption::Ascending => "ascending",
            SortOption::Descending => "descending",
        };
        f.write_str(name)
    }
}

/// Returns the stable ordering of `values` under the requested projection.
/// Values that do not parse under the projection sort as its zero value.
pub(crate) fn sort_permutation(values: &[Value], sort_type: SortType, option: SortOption) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    match sort_type {
        SortType::String => {
            order.sort_by(|&a, &b| option.apply(values[a].text().cmp(values[b].text())));
        }
        SortType::Number => {
            let keys: Vec<f64> = values
                .iter()
                .map(|value| value.as_number().unwrap_or(0.0))
                .collect();
            order.sort_by(|&a, &b| option.apply(compare_numbers(keys[a], keys[b])));
        }
        SortType::Duration => {
            let keys: Vec<Duration> = values
                .iter()
                .map(|value| value.as_duration().unwrap_or(Duration::ZERO))
                .collect();
            order.sort_by(|&a, &b| option.apply(keys[a].cmp(&keys[b])));
        }
    }
    order
}

// NaN orders after every number.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

#[derive(Debug)]
struct ColumnState {
    header: String,
    data: Vec<Value>,
}

impl ColumnState {
    fn check_row(&self, row: usize) -> Result<(), Error> {
        if row >= self.data.len() {
            return Err(Error::index_out_of_range(row, self.data.len()).with_header(&self.header));
        }
        Ok(())
    }

    fn check_range(&self, from: usize, to: usize) -> Result<(), Error> {
        if from > to || to > self.data.len() {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message(format!(
                    "range {from}..{to} out of bounds for size {}",
                    self.data.len()
                ))
                .with_header(&self.header));
        }
        Ok(())
    }

    fn permute(&mut self, order: &[usize]) {
        let sorted: Vec<Value> = order.iter().map(|&i| self.data[i].clone()).collect();
        self.data = sorted;
    }
}

/// An ordered, mutable sequence of values under a single header.
///
/// Every operation takes the column's own lock, so one column can be shared
/// across threads. Nothing coordinates locks between columns.
#[derive(Debug)]
pub struct Column {
    state: Mutex<ColumnState>,
}

impl Column {
    pub fn new(header: impl Into<String>) -> Self {
        Self::from_values(header, Vec::new())
    }

    pub fn from_values(header: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            state: Mutex::new(ColumnState {
                header: header.into(),
                data: values,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ColumnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn header(&self) -> String {
        self.lock().header.clone()
    }

    /// Renames a column the caller owns outright. Columns held by a frame
    /// are renamed through `Frame::update_header`.
    pub fn set_header(&mut self, header: impl Into<String>) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.header = header.into();
    }

    pub(crate) fn rename(&self, header: &str) {
        self.lock().header = header.to_string();
    }

    pub fn row_count(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    pub fn values(&self) -> Vec<Value> {
        self.lock().data.clone()
    }

    pub fn value(&self, row: usize) -> Result<Value, Error> {
        let state = self.lock();
        state.check_row(row)?;
        Ok(state.data[row].clone())
    }

    pub fn set_value(&self, row: usize, value: Value) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_row(row)?;
        state.data[row] = value;
        Ok(())
    }

    pub fn front(&self) -> Option<Value> {
        self.lock().data.first().cloned()
    }

    pub fn back(&self) -> Option<Value> {
        self.lock().data.last().cloned()
    }

    pub fn front_non_nil(&self) -> Option<Value> {
        self.lock().data.iter().find(|v| !v.is_nil()).cloned()
    }

    pub fn back_non_nil(&self) -> Option<Value> {
        self.lock().data.iter().rev().find(|v| !v.is_nil()).cloned()
    }

    pub fn push_front(&self, value: Value) -> usize {
        let mut state = self.lock();
        state.data.insert(0, value);
        state.data.len()
    }

    pub fn push_back(&self, value: Value) -> usize {
        let mut state = self.lock();
        state.data.push(value);
        state.data.len()
    }

    pub fn pop_front(&self) -> Option<Value> {
        let mut state = self.lock();
        if state.data.is_empty() {
            return None;
        }
        Some(state.data.remove(0))
    }

    pub fn pop_back(&self) -> Option<Value> {
        self.lock().data.pop()
    }

    pub fn delete_row(&self, row: usize) -> Result<Value, Error> {
        let mut state = self.lock();
        state.check_row(row)?;
        Ok(state.data.remove(row))
    }

    /// Removes rows in `[from, to)`.
    pub fn delete_rows(&self, from: usize, to: usize) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_range(from, to)?;
        state.data.drain(from..to);
        Ok(())
    }

    /// Keeps only rows in `[from, to)`, renumbered from zero.
    pub fn keep_rows(&self, from: usize, to: usize) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_range(from, to)?;
        state.data.truncate(to);
        state.data.drain(..from);
        Ok(())
    }

    /// Pushes `value` at the back until the column holds `target_size` rows.
    /// Never truncates.
    pub fn appends(&self, value: Value, target_size: usize) -> Result<(), Error> {
        let mut state = self.lock();
        let size = state.data.len();
        if size > 0 && target_size < size {
            return Err(Error::new(ErrorKind::SizeTooSmall)
                .with_message(format!(
                    "cannot append with {target_size} less than the column size {size}"
                ))
                .with_header(&state.header));
        }
        state.data.resize(target_size, value);
        Ok(())
    }

    pub fn find_value(&self, value: &Value) -> Option<usize> {
        self.lock().data.iter().position(|v| v.equal_to(value))
    }

    pub fn sort(&self, sort_type: SortType, option: SortOption) {
        let mut state = self.lock();
        let order = sort_permutation(&state.data, sort_type, option);
        state.permute(&order);
    }

    pub fn sort_by_string_ascending(&self) {
        self.sort(SortType::String, SortOption::Ascending);
    }

    pub fn sort_by_string_descending(&self) {
        self.sort(SortType::String, SortOption::Descending);
    }

    pub fn sort_by_number_ascending(&self) {
        self.sort(SortType::Number, SortOption::Ascending);
    }

    pub fn sort_by_number_descending(&self) {
        self.sort(SortType::Number, SortOption::Descending);
    }

    pub fn sort_by_duration_ascending(&self) {
        self.sort(SortType::Duration, SortOption::Ascending);
    }

    pub fn sort_by_duration_descending(&self) {
        self.sort(SortType::Duration, SortOption::Descending);
    }

    pub(crate) fn apply_permutation(&self, order: &[usize]) -> Result<(), Error> {
        let mut state = self.lock();
        if order.len() != state.data.len() {
            return Err(Error::new(ErrorKind::ShapeMismatch)
                .with_message(format!(
                    "permutation of {} rows applied to column of {} rows",
                    order.len(),
                    state.data.len()
                ))
                .with_header(&state.header));
        }
        state.permute(order);
        Ok(())
    }
}
