//! Hines-ordered tridiagonal system
//!
//! The implicit voltage update produces one linear equation per control
//! volume, coupled to the parent CV only. Because `parent[i] < i` for every
//! non-root CV, a single backward sweep eliminates the lower band and a
//! forward sweep back-substitutes, in O(N) for arbitrary tree topologies.

use nalgebra::DVector;

use crate::error::RuntimeError;

/// Banded matrix with parent-index structure.
///
/// Storage is four arrays aligned with the CV numbering, where `j = p[i]`
/// is the parent of CV `i`:
///
/// - `d[i]`: diagonal entry at row `i`
/// - `u[i]`: entry at row `j`, column `i`
/// - `l[i]`: entry at row `i`, column `j`
/// - `rhs[i]`: right-hand side, replaced by the solution in `solve`
///
/// Row 0 is the root; by convention `p[0] == 0` and `l[0] == u[0] == 0`.
#[derive(Debug, Clone)]
pub struct TridiagonalMatrix {
    parent_index: Vec<usize>,
    l: DVector<f64>,
    d: DVector<f64>,
    u: DVector<f64>,
    rhs: DVector<f64>,
}

impl TridiagonalMatrix {
    /// Create a zero matrix over the given parent-index array.
    pub fn new(parent_index: Vec<usize>) -> Self {
        let n = parent_index.len();
        Self {
            parent_index,
            l: DVector::zeros(n),
            d: DVector::zeros(n),
            u: DVector::zeros(n),
            rhs: DVector::zeros(n),
        }
    }

    /// Create a matrix from explicit bands and right-hand side.
    ///
    /// All four arrays must match the parent-index length.
    pub fn from_bands(
        parent_index: Vec<usize>,
        l: Vec<f64>,
        d: Vec<f64>,
        u: Vec<f64>,
        rhs: Vec<f64>,
    ) -> Self {
        let n = parent_index.len();
        assert!(
            l.len() == n && d.len() == n && u.len() == n && rhs.len() == n,
            "band lengths must match the parent index"
        );
        Self {
            parent_index,
            l: DVector::from_vec(l),
            d: DVector::from_vec(d),
            u: DVector::from_vec(u),
            rhs: DVector::from_vec(rhs),
        }
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.parent_index.len()
    }

    /// Parent index of each row.
    pub fn parent_index(&self) -> &[usize] {
        &self.parent_index
    }

    /// Lower band.
    pub fn l(&self) -> &[f64] {
        self.l.as_slice()
    }

    /// Diagonal.
    pub fn d(&self) -> &[f64] {
        self.d.as_slice()
    }

    /// Upper band.
    pub fn u(&self) -> &[f64] {
        self.u.as_slice()
    }

    /// Right-hand side, or the solution after `solve`.
    pub fn rhs(&self) -> &[f64] {
        self.rhs.as_slice()
    }

    /// Solution vector view for copying out after `solve`.
    pub(crate) fn rhs_vector(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Mutable access to all bands at once for assembly.
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&[usize], &mut [f64], &mut [f64], &mut [f64], &mut [f64]) {
        (
            &self.parent_index,
            self.l.as_mut_slice(),
            self.d.as_mut_slice(),
            self.u.as_mut_slice(),
            self.rhs.as_mut_slice(),
        )
    }

    /// Solve the system in place, leaving the solution in `rhs`.
    ///
    /// Backward sweep over `i = N-1..1` eliminates `l`, then the forward
    /// sweep substitutes. The bands `l` and `u` are left untouched; `d` and
    /// `rhs` hold elimination results afterwards.
    pub fn solve(&mut self) -> Result<(), RuntimeError> {
        let n = self.size();
        for i in (1..n).rev() {
            let pivot = self.d[i];
            if !pivot.is_finite() || pivot == 0.0 {
                return Err(RuntimeError::NumericalInstability { index: i });
            }
            let factor = self.u[i] / pivot;
            let parent = self.parent_index[i];
            self.d[parent] -= factor * self.l[i];
            self.rhs[parent] -= factor * self.rhs[i];
        }

        let root = self.d[0];
        if !root.is_finite() || root == 0.0 {
            return Err(RuntimeError::NumericalInstability { index: 0 });
        }
        self.rhs[0] /= root;

        for i in 1..n {
            let parent = self.parent_index[i];
            self.rhs[i] = (self.rhs[i] - self.l[i] * self.rhs[parent]) / self.d[i];
        }
        Ok(())
    }
}
