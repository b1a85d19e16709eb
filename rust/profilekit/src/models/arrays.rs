use std::fmt::Debug;

use crate::errors::{
    ProfilingError,
    Result,
};

/// Dense row-major 2D array.
///
/// Used for the samples x features intensity matrix (and the matrices that
/// must stay aligned with it: fits, expected concentrations).
///
/// `values` is a flattened array of values
/// `ncols` is the number of values in each row
/// `nrows` is the number of rows
///
/// Note on memory layout:
///
/// Values that belong to the same row (sample) are adjacent
/// in memory, so column (feature) access is strided.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array2D<T: Clone + Copy> {
    values: Vec<T>,
    ncols: usize,
    nrows: usize,
}

impl<T: Clone + Copy + Debug> Array2D<T> {
    /// Builds an array from rows. All rows must have the same length.
    pub fn new<S: AsRef<[T]>, C: AsRef<[S]>>(rows: C) -> Result<Array2D<T>> {
        let nrows = rows.as_ref().len();
        let ncols = rows.as_ref().first().map(|r| r.as_ref().len()).unwrap_or(0);

        let mut values = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.as_ref().iter().enumerate() {
            if row.as_ref().len() != ncols {
                return Err(ProfilingError::Value(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.as_ref().len(),
                    ncols
                )));
            }
            values.extend_from_slice(row.as_ref());
        }

        Ok(Array2D {
            values,
            ncols,
            nrows,
        })
    }

    /// Builds an array from columns. All columns must have the same length.
    pub fn new_transposed<S: AsRef<[T]>, C: AsRef<[S]>>(columns: C) -> Result<Array2D<T>> {
        let ncols = columns.as_ref().len();
        let nrows = columns
            .as_ref()
            .first()
            .map(|c| c.as_ref().len())
            .unwrap_or(0);

        let mut out_values: Vec<Option<T>> = vec![None; nrows * ncols];
        for (ci, col) in columns.as_ref().iter().enumerate() {
            if col.as_ref().len() != nrows {
                return Err(ProfilingError::Value(format!(
                    "Column {} has {} values, expected {}",
                    ci,
                    col.as_ref().len(),
                    nrows
                )));
            }
            for (ri, val) in col.as_ref().iter().enumerate() {
                out_values[ri * ncols + ci] = Some(*val);
            }
        }

        Ok(Array2D {
            values: out_values.into_iter().flatten().collect(),
            ncols,
            nrows,
        })
    }

    pub fn from_flat_vector(values: Vec<T>, nrows: usize, ncols: usize) -> Result<Array2D<T>> {
        if values.len() != nrows * ncols {
            return Err(ProfilingError::Value(format!(
                "Expected {} values for a {}x{} array, got {}",
                nrows * ncols,
                nrows,
                ncols,
                values.len()
            )));
        }
        Ok(Array2D {
            values,
            ncols,
            nrows,
        })
    }

    pub fn filled(nrows: usize, ncols: usize, value: T) -> Array2D<T> {
        Array2D {
            values: vec![value; nrows * ncols],
            ncols,
            nrows,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `(nrows, ncols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn get(&self, row_idx: usize, col_idx: usize) -> Option<T> {
        if row_idx >= self.nrows || col_idx >= self.ncols {
            return None;
        }
        Some(self.values[row_idx * self.ncols + col_idx])
    }

    pub fn insert(&mut self, row_idx: usize, col_idx: usize, value: T) {
        let idx = row_idx * self.ncols + col_idx;
        self.values[idx] = value;
    }

    pub fn get_row(&self, index: usize) -> Option<&[T]> {
        if index >= self.nrows {
            return None;
        }
        let start = index * self.ncols;
        Some(&self.values[start..start + self.ncols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics, so empty-width arrays yield empty rows explicitly.
        (0..self.nrows).map(move |i| &self.values[i * self.ncols..(i + 1) * self.ncols])
    }

    pub fn iter_mut_rows(&mut self) -> impl Iterator<Item = &mut [T]> {
        self.values.chunks_mut(self.ncols.max(1))
    }

    /// Copies out a single column.
    pub fn column(&self, col_idx: usize) -> Option<Vec<T>> {
        if col_idx >= self.ncols {
            return None;
        }
        Some(
            (0..self.nrows)
                .map(|r| self.values[r * self.ncols + col_idx])
                .collect(),
        )
    }

    pub fn set_column(&mut self, col_idx: usize, column: &[T]) -> Result<()> {
        if col_idx >= self.ncols || column.len() != self.nrows {
            return Err(ProfilingError::Value(format!(
                "Cannot set column {} of a {}x{} array with {} values",
                col_idx,
                self.nrows,
                self.ncols,
                column.len()
            )));
        }
        for (r, v) in column.iter().enumerate() {
            self.values[r * self.ncols + col_idx] = *v;
        }
        Ok(())
    }

    /// Apply a function to each row of the array
    ///
    /// Example:
    /// ```
    /// use profilekit::models::Array2D;
    /// let array = Array2D::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    /// let result: Vec<u32> = array.row_apply(|x| x.iter().sum()).collect();
    /// assert_eq!(result, vec![6, 15]);
    ///
    /// let array = Array2D::new_transposed(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    /// let result: Vec<u32> = array.row_apply(|x| x.iter().sum()).collect();
    /// assert_eq!(result, vec![5, 7, 9]);
    /// ```
    pub fn row_apply<'a: 'b, 'b, W, F: FnMut(&[T]) -> W + 'b>(
        &'a self,
        f: F,
    ) -> impl Iterator<Item = W> + 'b {
        self.iter_rows().map(f)
    }

    /// Apply a function to each column of the array.
    pub fn column_apply<W, F: FnMut(&[T]) -> W>(&self, mut f: F) -> Vec<W> {
        let mut buffer = Vec::with_capacity(self.nrows);
        (0..self.ncols)
            .map(|c| {
                buffer.clear();
                buffer.extend((0..self.nrows).map(|r| self.values[r * self.ncols + c]));
                f(&buffer)
            })
            .collect()
    }

    /// New array holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Array2D<T> {
        let mut values = Vec::with_capacity(rows.len() * self.ncols);
        for &r in rows {
            values.extend_from_slice(&self.values[r * self.ncols..(r + 1) * self.ncols]);
        }
        Array2D {
            values,
            ncols: self.ncols,
            nrows: rows.len(),
        }
    }

    /// New array holding the given columns, in the given order.
    pub fn select_cols(&self, cols: &[usize]) -> Array2D<T> {
        let mut values = Vec::with_capacity(cols.len() * self.nrows);
        for r in 0..self.nrows {
            let row = &self.values[r * self.ncols..(r + 1) * self.ncols];
            values.extend(cols.iter().map(|&c| row[c]));
        }
        Array2D {
            values,
            ncols: cols.len(),
            nrows: self.nrows,
        }
    }

    /// Rows whose mask entry equals `keep`.
    pub fn filter_rows(&self, mask: &[bool], keep: bool) -> Array2D<T> {
        let rows: Vec<usize> = mask_indices(mask, keep);
        self.select_rows(&rows)
    }

    /// Columns whose mask entry equals `keep`.
    pub fn filter_cols(&self, mask: &[bool], keep: bool) -> Array2D<T> {
        let cols: Vec<usize> = mask_indices(mask, keep);
        self.select_cols(&cols)
    }

    /// Re-indexes columns; `None` entries are filled with `fill`.
    pub fn take_cols(&self, cols: &[Option<usize>], fill: T) -> Array2D<T> {
        let mut values = Vec::with_capacity(cols.len() * self.nrows);
        for r in 0..self.nrows {
            let row = &self.values[r * self.ncols..(r + 1) * self.ncols];
            values.extend(cols.iter().map(|c| c.map(|c| row[c]).unwrap_or(fill)));
        }
        Array2D {
            values,
            ncols: cols.len(),
            nrows: self.nrows,
        }
    }

    /// Stacks `other` below `self`. Both must have the same number of columns.
    pub fn vstack(&self, other: &Array2D<T>) -> Result<Array2D<T>> {
        if self.ncols != other.ncols && self.nrows != 0 && other.nrows != 0 {
            return Err(ProfilingError::Value(format!(
                "Cannot stack arrays with {} and {} columns",
                self.ncols, other.ncols
            )));
        }
        let ncols = if self.nrows == 0 {
            other.ncols
        } else {
            self.ncols
        };
        let mut values = self.values.clone();
        values.extend_from_slice(&other.values);
        Ok(Array2D {
            values,
            ncols,
            nrows: self.nrows + other.nrows,
        })
    }

    pub fn transpose(&self) -> Array2D<T> {
        let mut result = Vec::with_capacity(self.values.len());
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                result.push(self.values[i * self.ncols + j]);
            }
        }
        Array2D {
            values: result,
            ncols: self.nrows,
            nrows: self.ncols,
        }
    }

    pub fn map<W: Clone + Copy + Debug>(&self, f: impl Fn(T) -> W) -> Array2D<W> {
        Array2D {
            values: self.values.iter().map(|v| f(*v)).collect(),
            ncols: self.ncols,
            nrows: self.nrows,
        }
    }
}

pub(crate) fn mask_indices(mask: &[bool], keep: bool) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, m)| **m == keep)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array2d_new() -> Result<()> {
        // Test creating a 2x3 array
        let values = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let array = Array2D::new(&values)?;

        assert_eq!(array.ncols(), 3);
        assert_eq!(array.nrows(), 2);

        // Check memory layout - values in same row should be adjacent
        assert_eq!(array.values(), &[1, 2, 3, 4, 5, 6]);

        Ok(())
    }

    #[test]
    fn test_array2d_new_transposed() -> Result<()> {
        // Test creating a 2x3 array from columns
        let columns = vec![
            vec![1, 4], // first column
            vec![2, 5], // second column
            vec![3, 6], // third column
        ];
        let array = Array2D::new_transposed(&columns)?;

        assert_eq!(array.shape(), (2, 3));
        assert_eq!(array.values(), &[1, 2, 3, 4, 5, 6]);

        Ok(())
    }

    #[test]
    fn test_array2d_error_handling() {
        // Test with inconsistent row lengths
        let invalid_values = vec![
            vec![1, 2, 3],
            vec![4, 5], // Missing one value
        ];
        assert!(Array2D::new(&invalid_values).is_err());

        // Empty arrays are allowed (all samples or features excluded)
        let empty_values: Vec<Vec<i32>> = vec![];
        assert_eq!(Array2D::new(&empty_values).unwrap().shape(), (0, 0));

        // Test transposed with inconsistent column lengths
        let invalid_columns = vec![
            vec![1, 4],
            vec![2], // Missing one value
            vec![3, 6],
        ];
        assert!(Array2D::new_transposed(&invalid_columns).is_err());
    }

    #[test]
    fn test_array2d_transpose() -> Result<()> {
        let array = Array2D::new(vec![vec![1, 2, 3], vec![4, 5, 6]])?;
        let transposed = array.transpose();

        assert_eq!(transposed.shape(), (3, 2));
        assert_eq!(transposed.values(), &[1, 4, 2, 5, 3, 6]);

        Ok(())
    }

    #[test]
    fn test_selection() {
        let array = Array2D::new(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]).unwrap();

        let rows = array.filter_rows(&[true, false, true], true);
        assert_eq!(rows.values(), &[1, 2, 3, 7, 8, 9]);

        let cols = array.filter_cols(&[true, false, true], false);
        assert_eq!(cols.shape(), (3, 1));
        assert_eq!(cols.column(0).unwrap(), vec![2, 5, 8]);

        let taken = array.take_cols(&[Some(2), None], 0);
        assert_eq!(taken.values(), &[3, 0, 6, 0, 9, 0]);
    }

    #[test]
    fn test_vstack() {
        let a = Array2D::new(vec![vec![1, 2]]).unwrap();
        let b = Array2D::new(vec![vec![3, 4], vec![5, 6]]).unwrap();
        let stacked = a.vstack(&b).unwrap();
        assert_eq!(stacked.shape(), (3, 2));
        assert_eq!(stacked.get(2, 1), Some(6));

        let c = Array2D::new(vec![vec![1, 2, 3]]).unwrap();
        assert!(a.vstack(&c).is_err());
    }

    #[test]
    fn test_insertion_and_columns() {
        let mut array = Array2D::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        array.insert(0, 0, 7);
        assert_eq!(array.values(), &[7, 2, 3, 4, 5, 6]);
        array.set_column(2, &[8, 9]).unwrap();
        assert_eq!(array.values(), &[7, 2, 8, 4, 5, 9]);
        assert!(array.set_column(3, &[1, 1]).is_err());

        let sums = array.column_apply(|c| c.iter().sum::<i32>());
        assert_eq!(sums, vec![11, 7, 17]);
    }
}
