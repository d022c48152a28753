//! Reorder per-trial data from presentation order into canonical
//! (lexicographic) stimulus order.
use std::collections::HashMap;

use ndarray::{Array3, Axis};

use crate::error::{Error, Result};

/// Indices into `order_list` that visit its ids in sorted order.
///
/// `perm[i]` is the presentation position of the `i`-th stimulus in
/// lexicographic order.
///
/// # Errors
///
/// [`Error::Alignment`] if an id occurs more than once.
pub fn canonical_permutation<S: AsRef<str>>(order_list: &[S]) -> Result<Vec<usize>> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(order_list.len());
    for (i, id) in order_list.iter().enumerate() {
        if let Some(prev) = position.insert(id.as_ref(), i) {
            return Err(Error::alignment(format!(
                "stimulus `{}` presented twice (trials {prev} and {i})",
                id.as_ref()
            )));
        }
    }
    let mut sorted: Vec<&str> = position.keys().copied().collect();
    sorted.sort_unstable();
    Ok(sorted.iter().map(|id| position[id]).collect())
}

/// Inverse of a permutation: `inverse[perm[i]] == i`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

fn check_count(order_len: usize, n_trials: usize) -> Result<()> {
    if order_len != n_trials {
        return Err(Error::alignment(format!(
            "presentation log lists {order_len} stimuli but the EEG holds {n_trials} trials"
        )));
    }
    Ok(())
}

/// `eeg` (one entry per trial, in `order_list` order) permuted so entry `i`
/// belongs to the `i`-th stimulus id in lexicographic order.
///
/// # Errors
///
/// [`Error::Alignment`] for duplicate ids or a length mismatch.
pub fn reorder<S: AsRef<str>, T: Clone>(order_list: &[S], eeg: &[T]) -> Result<Vec<T>> {
    check_count(order_list.len(), eeg.len())?;
    let perm = canonical_permutation(order_list)?;
    Ok(perm.into_iter().map(|i| eeg[i].clone()).collect())
}

/// [`reorder`] along the trial axis of a `[trial, channel, sample]` tensor.
pub fn reorder_trials<S: AsRef<str>>(order_list: &[S], eeg: &Array3<f64>) -> Result<Array3<f64>> {
    check_count(order_list.len(), eeg.dim().0)?;
    let perm = canonical_permutation(order_list)?;
    Ok(eeg.select(Axis(0), &perm))
}
