use parametric_merge::backend::{Backend, get_backend, set_backend};
use parametric_merge::tensors::{Ten64, Tensor};
use parametric_merge::{MergeError, MergeLayer, MergeOperator, Propagate, tensor};

fn ramp(shape: &[usize], offset: f64) -> Ten64 {
    let len = shape.iter().product::<usize>();
    let data = (0..len).map(|i| (i as f64 * 0.37 + offset).sin()).collect();
    Tensor::new(shape, data)
}

#[test]
fn test_backward_without_forward() {
    let mut layer = MergeLayer::default();
    assert!(!layer.has_cache());
    assert_eq!(
        layer.backward(&tensor!([1.0]), Propagate::ALL),
        Err(MergeError::MissingForwardCache)
    );
}

#[test]
fn test_forward_then_backward_accumulates_theta() {
    let mut layer = MergeLayer::new(MergeOperator::new(0.0));
    let y = layer.forward(&tensor!([1.0, 0.0]), &tensor!([0.0, 1.0])).unwrap();
    assert_eq!(y.data, vec![0.5, 0.5]);

    let (dx1, dx2) = layer.backward(&tensor!([1.0, 1.0]), Propagate::ALL).unwrap();
    assert_eq!(dx1.unwrap().data, vec![0.5, 0.5]);
    assert_eq!(dx2.unwrap().data, vec![0.5, 0.5]);
    assert_eq!(layer.operator().theta_grad(), 0.5);

    // the cache survives, so a second backward accumulates again
    layer.backward(&tensor!([1.0, 1.0]), Propagate::PARAM_ONLY).unwrap();
    assert_eq!(layer.operator().theta_grad(), 1.0);
}

#[test]
fn test_failed_forward_drops_cache() {
    let mut layer = MergeLayer::default();
    layer.forward(&tensor!([1.0, 2.0]), &tensor!([3.0, 4.0])).unwrap();
    assert!(layer.has_cache());

    let err = layer
        .forward(&tensor!([1.0, 2.0]), &tensor!([[3.0, 4.0]]))
        .unwrap_err();
    assert!(matches!(err, MergeError::ShapeMismatch { .. }));
    assert!(!layer.has_cache());
    assert_eq!(
        layer.backward(&tensor!([1.0, 1.0]), Propagate::ALL),
        Err(MergeError::MissingForwardCache)
    );
}

#[test]
fn test_reshape_between_calls() {
    let mut layer = MergeLayer::default();
    layer.forward(&ramp(&[2, 3], 0.0), &ramp(&[2, 3], 1.0)).unwrap();
    let y = layer.forward(&ramp(&[4, 5, 6], 0.0), &ramp(&[4, 5, 6], 1.0)).unwrap();
    assert_eq!(y.shape, vec![4, 5, 6]);

    // gradient shaped like the old output is now rejected
    let err = layer
        .backward(&Tensor::zeros(vec![2, 3]), Propagate::ALL)
        .unwrap_err();
    assert_eq!(
        err,
        MergeError::ShapeMismatch {
            expected: vec![4, 5, 6],
            got: vec![2, 3]
        }
    );
    // nothing was accumulated by the rejected call
    assert_eq!(layer.operator().theta_grad(), 0.0);
}

#[test]
fn test_theta_update_between_passes_uses_cached_theta() {
    let x1 = ramp(&[10], 0.0);
    let x2 = ramp(&[10], 2.0);
    let g = Tensor::full(vec![10], 1.0);

    let mut layer = MergeLayer::new(MergeOperator::new(2.0));
    layer.forward(&x1, &x2).unwrap();
    layer.operator_mut().set_theta(-5.0);
    let (dx1, _) = layer.backward(&g, Propagate::ALL).unwrap();

    let expected = MergeOperator::new(2.0)
        .forward(&x1, &x2)
        .unwrap()
        .backward(&g, Propagate::ALL)
        .unwrap();
    assert_eq!(dx1, expected.x1);
    assert_eq!(layer.operator().theta_grad(), expected.theta);
}

#[test]
fn test_backends_agree() {
    let shape = [70, 70];
    let x1 = ramp(&shape, 0.0);
    let x2 = ramp(&shape, 0.5);
    let g = ramp(&shape, 1.5);
    let op = MergeOperator::new(7.0);

    let before = get_backend();
    set_backend(Backend::Sequential);
    assert_eq!(get_backend(), Backend::Sequential);
    let seq = op.forward(&x1, &x2).unwrap();
    let seq_grads = seq.backward(&g, Propagate::ALL).unwrap();

    set_backend(Backend::Parallel);
    let par = op.forward(&x1, &x2).unwrap();
    let par_grads = par.backward(&g, Propagate::ALL).unwrap();
    set_backend(before);

    assert_eq!(seq.output(), par.output());
    assert_eq!(seq_grads.x1, par_grads.x1);
    assert_eq!(seq_grads.x2, par_grads.x2);
    assert!((seq_grads.theta - par_grads.theta).abs() <= 1e-9 * seq_grads.theta.abs().max(1.0));
}
