use ndarray::{s, Array3};
use speechtrack::align::invert_permutation;
use speechtrack::{canonical_permutation, reorder, reorder_trials, Error};

#[test]
fn reorder_sorts_trials_by_stimulus_id() {
    let order = ["b", "a", "c"];
    let eeg = vec!["X_b", "X_a", "X_c"];
    assert_eq!(reorder(&order, &eeg).unwrap(), vec!["X_a", "X_b", "X_c"]);
}

#[test]
fn reorder_then_invert_recovers_presentation_order() {
    let order = ["sent07", "sent02", "sent11", "sent01", "sent05"];
    let eeg: Vec<usize> = (0..order.len()).collect();
    let sorted = reorder(&order, &eeg).unwrap();
    assert_eq!(sorted, vec![3, 1, 4, 0, 2]);

    let perm = canonical_permutation(&order).unwrap();
    let inv = invert_permutation(&perm);
    let restored: Vec<usize> = inv.iter().map(|&i| sorted[i]).collect();
    assert_eq!(restored, eeg);
}

#[test]
fn reorder_trials_moves_whole_trials() {
    let order = ["c", "a", "b"];
    let eeg = Array3::from_shape_fn((3, 2, 4), |(e, c, t)| (e * 100 + c * 10 + t) as f64);
    let sorted = reorder_trials(&order, &eeg).unwrap();
    assert_eq!(sorted.slice(s![0, .., ..]), eeg.slice(s![1, .., ..]));
    assert_eq!(sorted.slice(s![1, .., ..]), eeg.slice(s![2, .., ..]));
    assert_eq!(sorted.slice(s![2, .., ..]), eeg.slice(s![0, .., ..]));
}

#[test]
fn duplicates_and_count_mismatch_are_alignment_errors() {
    assert!(matches!(reorder(&["a", "b", "a"], &[1, 2, 3]), Err(Error::Alignment(_))));
    assert!(matches!(reorder(&["a", "b"], &[1, 2, 3]), Err(Error::Alignment(_))));
    let eeg = Array3::<f64>::zeros((2, 1, 1));
    assert!(matches!(reorder_trials(&["a", "b", "c"], &eeg), Err(Error::Alignment(_))));
}
