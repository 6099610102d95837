//! Hines solver against a dense reference
//!
//! Random tree-structured systems with diagonally dominant (hence positive
//! definite) diagonals, solved both by the O(N) Hines sweeps and by a dense
//! LU factorisation.

use approx::assert_relative_eq;
use cablesim::TridiagonalMatrix;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Dense matrix with the same entries as the banded storage.
fn dense_from_bands(parent: &[usize], l: &[f64], d: &[f64], u: &[f64]) -> DMatrix<f64> {
    let n = parent.len();
    let mut dense = DMatrix::zeros(n, n);
    for i in 0..n {
        dense[(i, i)] = d[i];
    }
    for i in 1..n {
        dense[(parent[i], i)] = u[i];
        dense[(i, parent[i])] = l[i];
    }
    dense
}

/// Random tree over `n` nodes with `parent[i] < i`.
fn random_tree(rng: &mut StdRng, n: usize) -> Vec<usize> {
    (0..n)
        .map(|i| if i == 0 { 0 } else { rng.gen_range(0..i) })
        .collect()
}

/// Random symmetric, diagonally dominant system on the given tree.
fn random_system(rng: &mut StdRng, parent: Vec<usize>) -> TridiagonalMatrix {
    let n = parent.len();
    let mut l = vec![0.0; n];
    let mut u = vec![0.0; n];
    let mut d = vec![0.0; n];
    for i in 1..n {
        let coupling = -rng.gen_range(0.1..2.0);
        l[i] = coupling;
        u[i] = coupling;
        d[i] -= coupling;
        d[parent[i]] -= coupling;
    }
    for value in d.iter_mut() {
        *value += rng.gen_range(0.5..3.0);
    }
    let rhs: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    TridiagonalMatrix::from_bands(parent, l, d, u, rhs)
}

fn check_against_dense(mut matrix: TridiagonalMatrix) {
    let dense = dense_from_bands(
        matrix.parent_index(),
        matrix.l(),
        matrix.d(),
        matrix.u(),
    );
    let rhs = DVector::from_column_slice(matrix.rhs());
    let reference = dense
        .lu()
        .solve(&rhs)
        .expect("reference system must be solvable");

    matrix.solve().unwrap();
    for i in 0..matrix.size() {
        assert_relative_eq!(matrix.rhs()[i], reference[i], max_relative = 1e-10);
    }
}

#[test]
fn test_chain_topologies_match_dense_solve() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in [2usize, 5, 23, 101] {
        let parent = (0..n).map(|i| i.saturating_sub(1)).collect();
        check_against_dense(random_system(&mut rng, parent));
    }
}

#[test]
fn test_random_trees_match_dense_solve() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..25 {
        let n = rng.gen_range(2..60);
        let parent = random_tree(&mut rng, n);
        check_against_dense(random_system(&mut rng, parent));
    }
}

#[test]
fn test_fan_out_tree_matches_dense_solve() {
    // Soma with two 5-compartment branches, as lowered by the cell layer
    let parent = vec![0, 0, 1, 2, 3, 4, 0, 6, 7, 8, 9];
    for i in 1..parent.len() {
        assert!(parent[i] < i);
    }
    let mut rng = StdRng::seed_from_u64(3);
    check_against_dense(random_system(&mut rng, parent));
}

#[test]
fn test_solution_overwrites_rhs_in_place() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut matrix = random_system(&mut rng, vec![0, 0, 1]);
    let before = matrix.rhs().to_vec();
    matrix.solve().unwrap();
    assert_ne!(matrix.rhs(), before.as_slice());
}
