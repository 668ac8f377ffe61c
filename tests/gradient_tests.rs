use approx::assert_abs_diff_eq;
use parametric_merge::approx::Tolerance;
use parametric_merge::backend::{Backend, set_backend};
use parametric_merge::backprop::{parametric_merge, sgd};
use parametric_merge::gradcheck::GradientChecker;
use parametric_merge::tensors::*;
use parametric_merge::{MergeOperator, Propagate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn uniform(shape: &[usize], rng: &mut StdRng) -> Ten64 {
    let len = shape.iter().product::<usize>();
    Tensor::new(shape, (0..len).map(|_| rng.gen_range(-1.0..=1.0)).collect())
}

fn check_at(theta: f64) {
    let mut rng = StdRng::seed_from_u64(1701);
    let shape = [2, 3, 4, 5];
    let x1 = uniform(&shape, &mut rng);
    let x2 = uniform(&shape, &mut rng);
    let g = uniform(&shape, &mut rng);

    let report = GradientChecker::default()
        .check(&MergeOperator::new(theta), &x1, &x2, &g)
        .unwrap();
    report.assert_ok();
}

#[test]
fn test_max_gradient() {
    check_at(10.0);
}

#[test]
fn test_min_gradient() {
    check_at(-10.0);
}

#[test]
fn test_mean_gradient() {
    check_at(0.0);
}

#[test]
fn test_theta1_gradient() {
    check_at(1.0);
}

#[test]
fn test_gradient_with_coarse_step() {
    // the step and tolerance a single-precision host would use
    let mut rng = StdRng::seed_from_u64(42);
    let x1 = uniform(&[3, 7], &mut rng);
    let x2 = uniform(&[3, 7], &mut rng);
    let g = Tensor::full(vec![3, 7], 1.0);
    let checker = GradientChecker::new(1e-2, Tolerance::GRADIENT);
    for theta in [-2.0, 0.5, 3.0] {
        checker
            .check(&MergeOperator::new(theta), &x1, &x2, &g)
            .unwrap()
            .assert_ok();
    }
}

#[test]
fn test_gradient_on_large_parallel_tensor() {
    set_backend(Backend::Parallel);
    let mut rng = StdRng::seed_from_u64(9);
    let shape = [64, 80];
    let x1 = uniform(&shape, &mut rng);
    let x2 = uniform(&shape, &mut rng);
    let g = uniform(&shape, &mut rng);
    let fwd = MergeOperator::new(4.0).forward(&x1, &x2).unwrap();
    let (dx1, dx2, dtheta) = fwd.backward_all(&g).unwrap();

    // the per-element derivatives of a softmax blend sum to one
    for ((&a, &b), &gi) in dx1.data.iter().zip(&dx2.data).zip(&g.data) {
        assert_abs_diff_eq!(a + b, gi, epsilon = 1e-12);
    }

    let step = 1e-4;
    let objective = |theta: f64| -> f64 {
        let y = MergeOperator::new(theta).forward(&x1, &x2).unwrap();
        y.output().data.iter().zip(&g.data).map(|(y, g)| y * g).sum()
    };
    let numeric = (objective(4.0 + step) - objective(4.0 - step)) / (2.0 * step);
    assert!(Tolerance::GRADIENT.close(dtheta, numeric));
}

#[test]
fn test_closure_api_matches_operator() {
    let mut rng = StdRng::seed_from_u64(3);
    let x1 = WithGrad::new(uniform(&[4, 4], &mut rng));
    let x2 = WithGrad::new(uniform(&[4, 4], &mut rng));
    let theta = WithGrad::new(2.0);
    let g = uniform(&[4, 4], &mut rng);

    let (out, back) = parametric_merge(&x1, &x2, &theta).unwrap();
    let (dx1, dx2, dtheta) = back(&g).unwrap();

    let fwd = MergeOperator::new(2.0).forward(&x1.value, &x2.value).unwrap();
    let grads = fwd.backward(&g, Propagate::ALL).unwrap();
    assert_eq!(&out, fwd.output());
    assert_eq!(Some(dx1), grads.x1);
    assert_eq!(Some(dx2), grads.x2);
    assert_eq!(dtheta, grads.theta);

    assert!(back(&Tensor::zeros(vec![16])).is_err());
}

#[test]
fn test_sgd_moves_theta_toward_max() {
    // target is max(x1, x2); gradient descent on θ should increase it
    let x1: Ten64 = Tensor::new(vec![4], vec![1.0, -1.0, 0.5, -0.5]);
    let x2: Ten64 = Tensor::new(vec![4], vec![-1.0, 1.0, -0.5, 0.5]);
    let target: Vec<f64> = x1.data.iter().zip(&x2.data).map(|(a, b)| a.max(*b)).collect();

    let mut theta = WithGrad::new(0.0);
    for _ in 0..50 {
        let (out, back) =
            parametric_merge(&WithGrad::new(x1.clone()), &WithGrad::new(x2.clone()), &theta)
                .unwrap();
        // dL/dy for L = Σ (y - t)²
        let g = Tensor::new(
            vec![4],
            out.data.iter().zip(&target).map(|(y, t)| 2.0 * (y - t)).collect(),
        );
        let (_, _, dtheta) = back(&g).unwrap();
        theta.grad += dtheta;
        sgd(&mut theta, 0.5);
        assert_eq!(theta.grad, 0.0);
    }
    assert!(theta.value > 1.0, "theta = {}", theta.value);
}
