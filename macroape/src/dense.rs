//! Dense matrix storage with a constant number of columns.

use std::fmt::Debug;
use std::fmt::Error as FmtError;
use std::fmt::Formatter;
use std::ops::Index;
use std::ops::IndexMut;
use std::slice::ChunksExact;
use std::slice::ChunksExactMut;

use typenum::marker_traits::Unsigned;

use super::err::Error;

// --- DenseMatrix -------------------------------------------------------------

/// A row-major dense matrix with a constant number of columns.
#[derive(Clone)]
pub struct DenseMatrix<T: Default + Copy, C: Unsigned> {
    data: Vec<T>,
    rows: usize,
    _columns: std::marker::PhantomData<C>,
}

impl<T: Default + Copy, C: Unsigned> DenseMatrix<T, C> {
    /// Create a new matrix with the given number of rows.
    pub fn new(rows: usize) -> Self {
        Self {
            data: vec![T::default(); rows * C::USIZE],
            rows,
            _columns: std::marker::PhantomData,
        }
    }

    /// Create a new dense matrix from an iterable of rows.
    ///
    /// # Panics
    ///
    /// Panics if any of the rows does not have the number of elements
    /// corresponding to the dense matrix columns.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator,
        <I as IntoIterator>::Item: AsRef<[T]>,
    {
        match Self::try_from_rows(rows) {
            Ok(matrix) => matrix,
            Err(e) => panic!("{}", e),
        }
    }

    /// Create a new dense matrix from an iterable of rows, checking their width.
    pub fn try_from_rows<I>(rows: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        <I as IntoIterator>::Item: AsRef<[T]>,
    {
        let mut data = Vec::new();
        let mut n = 0;
        for row in rows {
            let row = row.as_ref();
            if row.len() != C::USIZE {
                return Err(Error::InvalidData(format!(
                    "row {} has {} columns, expected {}",
                    n,
                    row.len(),
                    C::USIZE
                )));
            }
            data.extend_from_slice(row);
            n += 1;
        }
        Ok(Self {
            data,
            rows: n,
            _columns: std::marker::PhantomData,
        })
    }

    /// The number of columns of the matrix.
    #[inline]
    pub const fn columns(&self) -> usize {
        C::USIZE
    }

    /// The number of rows of the matrix.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Iterate over the rows of the matrix.
    #[inline]
    pub fn iter(&self) -> ChunksExact<'_, T> {
        self.data.chunks_exact(C::USIZE)
    }

    /// Returns an iterator that allows modifying each row.
    #[inline]
    pub fn iter_mut(&mut self) -> ChunksExactMut<'_, T> {
        self.data.chunks_exact_mut(C::USIZE)
    }

    /// Fill the entire matrix with a constant value.
    #[inline]
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Create a new matrix with `left` and `right` additional default rows.
    pub fn padded(&self, left: usize, right: usize) -> Self {
        let mut data = vec![T::default(); left * C::USIZE];
        data.extend_from_slice(&self.data);
        data.resize(data.len() + right * C::USIZE, T::default());
        Self {
            data,
            rows: self.rows + left + right,
            _columns: std::marker::PhantomData,
        }
    }
}

impl<T: Default + Copy + Debug, C: Unsigned> Debug for DenseMatrix<T, C> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Default + Copy + PartialEq, C: Unsigned> PartialEq for DenseMatrix<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.data == other.data
    }
}

impl<T: Default + Copy, C: Unsigned> Index<usize> for DenseMatrix<T, C> {
    type Output = [T];
    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        let row = C::USIZE * index;
        &self.data[row..row + C::USIZE]
    }
}

impl<T: Default + Copy, C: Unsigned> IndexMut<usize> for DenseMatrix<T, C> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let row = C::USIZE * index;
        &mut self.data[row..row + C::USIZE]
    }
}

impl<'a, T: Default + Copy, C: Unsigned> IntoIterator for &'a DenseMatrix<T, C> {
    type Item = &'a [T];
    type IntoIter = ChunksExact<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Default + Copy, C: Unsigned> IntoIterator for &'a mut DenseMatrix<T, C> {
    type Item = &'a mut [T];
    type IntoIter = ChunksExactMut<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod test {
    use typenum::consts::U3;

    use super::*;

    #[test]
    fn from_rows() {
        let m = DenseMatrix::<i32, U3>::from_rows([[1, 2, 3], [4, 5, 6]]);
        assert_eq!(m.rows(), 2);
        assert_eq!(&m[1], &[4, 5, 6]);
        assert_eq!(m.iter().count(), 2);
    }

    #[test]
    fn try_from_rows_invalid() {
        let rows: Vec<Vec<i32>> = vec![vec![1, 2, 3], vec![1, 2]];
        assert!(DenseMatrix::<i32, U3>::try_from_rows(rows).is_err());
    }

    #[test]
    fn padded() {
        let m = DenseMatrix::<i32, U3>::from_rows([[1, 2, 3]]);
        let p = m.padded(2, 1);
        assert_eq!(p.rows(), 4);
        assert_eq!(&p[0], &[0, 0, 0]);
        assert_eq!(&p[2], &[1, 2, 3]);
        assert_eq!(&p[3], &[0, 0, 0]);
    }
}
