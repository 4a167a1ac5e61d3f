#![cfg(test)]

use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, array};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    MlErr,
    arch::{
        Model, Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{LossFn, Mse},
    },
    dataset::Dataset,
    optimization::{GradientDescentWithMomentum, Optimizer},
    training::ModelTrainer,
};

fn and2() -> Dataset {
    let data = vec![
        0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 1.0, //
    ];

    Dataset::new(data, 2, 1).unwrap()
}

fn net() -> Sequential {
    Sequential::new([
        Layer::dense((2, 3), Some(ActFn::sigmoid(1.))),
        Layer::dense((3, 1), Some(ActFn::sigmoid(1.))),
    ])
}

#[test]
fn test_ml_and2_gate_loss_decreases() {
    let dataset = and2();
    let mut rng = StdRng::seed_from_u64(7);
    let model = net();
    let optimizer = GradientDescentWithMomentum::new(model.size(), 2.0, 0.5);
    let mut trainer = ModelTrainer::new(model, optimizer, Mse, &mut rng).unwrap();

    let before = trainer.evaluate(&dataset).unwrap();
    let losses = trainer
        .train(&dataset, 3000, NonZeroUsize::new(4).unwrap(), &mut rng)
        .unwrap();
    let after = trainer.evaluate(&dataset).unwrap();

    assert_eq!(losses.len(), 3000);
    assert!(after < before, "loss went from {before} to {after}");
    assert!(after < 0.1, "final loss {after}");
}

#[test]
fn test_dense_gradient_matches_finite_differences() {
    let x = array![[0.5_f32, -1.0], [1.5, 0.25]];
    let y = array![[1.0_f32], [0.0]];
    let mut model = net();
    let mut rng = StdRng::seed_from_u64(3);
    let mut params = vec![0.; model.size()];
    model.init_params(&mut params, &mut rng).unwrap();

    // A zero learning rate leaves the parameters untouched while still computing the gradient.
    let mut grad = vec![0.; model.size()];
    let mut optimizer = GradientDescentWithMomentum::new(model.size(), 0., 0.);
    let batches = std::iter::once((x.clone(), y.clone()));
    model
        .backprop(&mut params, &mut grad, &Mse, &mut optimizer, batches)
        .unwrap();

    let mut loss_at = |params: &[f32]| {
        let y_pred = model.forward(params, x.view()).unwrap();
        Mse.loss(y_pred.view(), y.view())
    };

    let eps = 1e-3;
    for i in 0..params.len() {
        let mut plus = params.clone();
        plus[i] += eps;
        let mut minus = params.clone();
        minus[i] -= eps;

        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2. * eps);
        assert!(
            (numeric - grad[i]).abs() < 1e-2,
            "param {i}: numeric {numeric}, analytic {}",
            grad[i]
        );
    }
}

#[test]
fn test_dataset_rejects_partial_rows() {
    let err = Dataset::new(vec![0.; 5], 2, 1).unwrap_err();
    assert!(matches!(
        err,
        MlErr::InvalidDataset {
            len: 5,
            row_size: 3
        }
    ));

    assert!(matches!(
        Dataset::new(Vec::new(), 2, 1),
        Err(MlErr::EmptyDataset)
    ));
}

#[test]
fn test_dataset_batches_follow_order() {
    let dataset = and2();
    let order = [3, 0, 2];
    let batches: Vec<(Array2<f32>, Array2<f32>)> =
        dataset.batches(&order, 2).unwrap().collect();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].0, array![[1.0, 1.0], [0.0, 0.0]]);
    assert_eq!(batches[0].1, array![[1.0], [0.0]]);
    assert_eq!(batches[1].0, array![[1.0, 0.0]]);
}

#[test]
fn test_shuffled_order_is_permutation() {
    let dataset = and2();
    let mut order = dataset.shuffled_order(&mut StdRng::seed_from_u64(1));
    order.sort_unstable();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_momentum_accumulates_velocity() {
    let mut optimizer = GradientDescentWithMomentum::new(1, 0.1, 0.5);
    let mut params = [1.0_f32];

    optimizer.update_params(&[1.0], &mut params).unwrap();
    assert!((params[0] - 0.9).abs() < 1e-6);

    optimizer.update_params(&[1.0], &mut params).unwrap();
    assert!((params[0] - 0.75).abs() < 1e-6);

    optimizer.set_learning_rate(0.2);
    assert_eq!(optimizer.learning_rate(), 0.2);
}

#[test]
fn test_snapshot_restore_replaces_params() {
    let mut rng = StdRng::seed_from_u64(11);
    let model = net();
    let size = model.size();
    let mut a = ModelTrainer::new(
        model.clone(),
        GradientDescentWithMomentum::new(size, 0.1, 0.0),
        Mse,
        &mut rng,
    )
    .unwrap();
    let mut b = ModelTrainer::new(
        model,
        GradientDescentWithMomentum::new(size, 0.1, 0.0),
        Mse,
        &mut rng,
    )
    .unwrap();
    assert_ne!(a.params(), b.params());

    b.restore(a.snapshot()).unwrap();
    assert_eq!(a.params(), b.params());

    let x = ArrayView2::from_shape((1, 2), &[1.0_f32, 0.0][..]).unwrap();
    assert_eq!(a.predict(x).unwrap(), b.predict(x).unwrap());
}

#[test]
fn test_input_width_mismatch_is_an_error() {
    let mut model = net();
    let params = vec![0.; model.size()];
    let x = Array2::<f32>::zeros((4, 3));

    let err = model.forward(&params, x.view()).unwrap_err();
    assert!(matches!(
        err,
        MlErr::SizeMismatch {
            what: "layer input width",
            got: 3,
            expected: 2
        }
    ));
}

#[test]
fn test_output_width_mismatch_is_an_error() {
    // Two outputs per sample against a single-output model.
    let dataset = Dataset::new(vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0], 2, 2).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let model = net();
    let optimizer = GradientDescentWithMomentum::new(model.size(), 0.1, 0.0);
    let mut trainer = ModelTrainer::new(model, optimizer, Mse, &mut rng).unwrap();

    assert!(matches!(
        trainer.evaluate(&dataset),
        Err(MlErr::SizeMismatch { got: 1, expected: 2, .. })
    ));
    assert!(matches!(
        trainer.train(&dataset, 1, NonZeroUsize::new(2).unwrap(), &mut rng),
        Err(MlErr::SizeMismatch { got: 1, expected: 2, .. })
    ));
}

#[test]
fn test_huge_epoch_count_does_not_preallocate() {
    let dataset = Dataset::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0], 3, 1).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let model = net();
    let optimizer = GradientDescentWithMomentum::new(model.size(), 0.1, 0.0);
    let mut trainer = ModelTrainer::new(model, optimizer, Mse, &mut rng).unwrap();

    // The first epoch fails on the input width, so this returns right away.
    let result = trainer.train(&dataset, usize::MAX, NonZeroUsize::new(2).unwrap(), &mut rng);
    assert!(matches!(result, Err(MlErr::SizeMismatch { .. })));
}
