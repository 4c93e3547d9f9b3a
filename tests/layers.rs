use ferrite_lenet::layers::{AvgPool2d, Conv2d, Dense, Flatten, Padding};
use ferrite_lenet::loss::cross_entropy::{softmax, softmax_cross_entropy};
use ferrite_lenet::{ActivationFunction, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};

const EPS: f64 = 1e-6;
const TOL: f64 = 1e-6;

fn random_tensor(shape: &[usize], rng: &mut StdRng) -> Tensor {
    let n = shape.iter().product();
    Tensor::from_vec(shape, (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect())
}

/// Scalar probe loss L = Σ out ⊙ r, so ∂L/∂out = r.
fn probe(out: &Tensor, r: &Tensor) -> f64 {
    out.data.iter().zip(&r.data).map(|(a, b)| a * b).sum()
}

fn assert_close(numerical: f64, analytical: f64, what: &str) {
    assert!(
        (numerical - analytical).abs() < TOL * (1.0 + analytical.abs()),
        "{} mismatch: numerical={}, analytical={}",
        what,
        numerical,
        analytical
    );
}

#[test]
fn test_dense_backward_gradient_check() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut layer = Dense::new(4, 3, ActivationFunction::Identity, &mut rng);
    layer.biases.value = random_tensor(&[3], &mut rng);
    let input = random_tensor(&[2, 4], &mut rng);
    let r = random_tensor(&[2, 3], &mut rng);

    layer.forward(&input);
    let grad_input = layer.backward(&r);
    let w_grad = layer.weights.grad.clone().unwrap();
    let b_grad = layer.biases.grad.clone().unwrap();

    for i in 0..w_grad.numel() {
        let orig = layer.weights.value.data[i];
        layer.weights.value.data[i] = orig + EPS;
        let plus = probe(&layer.predict(&input), &r);
        layer.weights.value.data[i] = orig - EPS;
        let minus = probe(&layer.predict(&input), &r);
        layer.weights.value.data[i] = orig;
        assert_close((plus - minus) / (2.0 * EPS), w_grad.data[i], "dense weight grad");
    }

    for i in 0..b_grad.numel() {
        let orig = layer.biases.value.data[i];
        layer.biases.value.data[i] = orig + EPS;
        let plus = probe(&layer.predict(&input), &r);
        layer.biases.value.data[i] = orig - EPS;
        let minus = probe(&layer.predict(&input), &r);
        layer.biases.value.data[i] = orig;
        assert_close((plus - minus) / (2.0 * EPS), b_grad.data[i], "dense bias grad");
    }

    for i in 0..input.numel() {
        let mut x = input.clone();
        x.data[i] += EPS;
        let plus = probe(&layer.predict(&x), &r);
        x.data[i] -= 2.0 * EPS;
        let minus = probe(&layer.predict(&x), &r);
        assert_close((plus - minus) / (2.0 * EPS), grad_input.data[i], "dense input grad");
    }
}

#[test]
fn test_dense_relu_masks_negative_preactivations() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut layer = Dense::new(1, 2, ActivationFunction::ReLU, &mut rng);
    layer.weights.value = Tensor::from_vec(&[1, 2], vec![1.0, -1.0]);
    layer.biases.value = Tensor::zeros(&[2]);

    let out = layer.forward(&Tensor::from_vec(&[1, 1], vec![2.0]));
    assert_eq!(out.data, vec![2.0, 0.0]);

    let grad_input = layer.backward(&Tensor::from_vec(&[1, 2], vec![1.0, 1.0]));
    assert_eq!(layer.weights.grad.as_ref().unwrap().data, vec![2.0, 0.0]);
    assert_eq!(layer.biases.grad.as_ref().unwrap().data, vec![1.0, 0.0]);
    assert_eq!(grad_input.data, vec![1.0]);
}

fn conv_gradient_check(padding: Padding) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut conv = Conv2d::new(2, 3, 3, padding, ActivationFunction::Identity, &mut rng);
    conv.biases.value = random_tensor(&[3], &mut rng);
    let input = random_tensor(&[2, 2, 5, 5], &mut rng);
    let out = conv.forward(&input);
    let r = random_tensor(&out.shape, &mut rng);

    let grad_input = conv.backward(&r);
    let f_grad = conv.filters.grad.clone().unwrap();
    let b_grad = conv.biases.grad.clone().unwrap();

    for i in 0..f_grad.numel() {
        let orig = conv.filters.value.data[i];
        conv.filters.value.data[i] = orig + EPS;
        let plus = probe(&conv.predict(&input), &r);
        conv.filters.value.data[i] = orig - EPS;
        let minus = probe(&conv.predict(&input), &r);
        conv.filters.value.data[i] = orig;
        assert_close((plus - minus) / (2.0 * EPS), f_grad.data[i], "conv filter grad");
    }

    for i in 0..b_grad.numel() {
        let orig = conv.biases.value.data[i];
        conv.biases.value.data[i] = orig + EPS;
        let plus = probe(&conv.predict(&input), &r);
        conv.biases.value.data[i] = orig - EPS;
        let minus = probe(&conv.predict(&input), &r);
        conv.biases.value.data[i] = orig;
        assert_close((plus - minus) / (2.0 * EPS), b_grad.data[i], "conv bias grad");
    }

    for i in 0..input.numel() {
        let mut x = input.clone();
        x.data[i] += EPS;
        let plus = probe(&conv.predict(&x), &r);
        x.data[i] -= 2.0 * EPS;
        let minus = probe(&conv.predict(&x), &r);
        assert_close((plus - minus) / (2.0 * EPS), grad_input.data[i], "conv input grad");
    }
}

#[test]
fn test_conv2d_same_padding_gradient_check() {
    conv_gradient_check(Padding::Same);
}

#[test]
fn test_conv2d_valid_padding_gradient_check() {
    conv_gradient_check(Padding::Valid);
}

#[test]
fn test_avg_pool_forward_and_backward() {
    let mut pool = AvgPool2d::new(2, 2);
    let input = Tensor::from_vec(
        &[1, 1, 4, 4],
        vec![
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        ],
    );
    let out = pool.forward(&input);
    assert_eq!(out.shape, vec![1, 1, 2, 2]);
    assert_eq!(out.data, vec![3.5, 5.5, 11.5, 13.5]);

    let grad = pool.backward(&Tensor::from_vec(&[1, 1, 2, 2], vec![4.0, 8.0, 0.0, -4.0]));
    assert_eq!(grad.shape, input.shape);
    assert_eq!(&grad.data[0..4], &[1.0, 1.0, 2.0, 2.0]);
    assert_eq!(&grad.data[12..16], &[0.0, 0.0, -1.0, -1.0]);
}

#[test]
fn test_avg_pool_gradient_check() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut pool = AvgPool2d::new(2, 2);
    let input = random_tensor(&[2, 3, 4, 4], &mut rng);
    let out = pool.forward(&input);
    let r = random_tensor(&out.shape, &mut rng);
    let grad_input = pool.backward(&r);

    for i in 0..input.numel() {
        let mut x = input.clone();
        x.data[i] += EPS;
        let plus = probe(&pool.predict(&x), &r);
        x.data[i] -= 2.0 * EPS;
        let minus = probe(&pool.predict(&x), &r);
        assert_close((plus - minus) / (2.0 * EPS), grad_input.data[i], "pool input grad");
    }
}

#[test]
fn test_avg_pool_odd_input_drops_trailing_row_and_column() {
    let pool = AvgPool2d::new(2, 2);
    let out = pool.predict(&Tensor::zeros(&[3, 6, 5, 5]));
    assert_eq!(out.shape, vec![3, 6, 2, 2]);
}

#[test]
fn test_flatten_round_trips_shape() {
    let mut flatten = Flatten::new();
    let input = Tensor::zeros(&[2, 16, 5, 5]);
    let out = flatten.forward(&input);
    assert_eq!(out.shape, vec![2, 400]);
    let grad = flatten.backward(&out);
    assert_eq!(grad.shape, vec![2, 16, 5, 5]);
}

#[test]
fn test_softmax_cross_entropy_uniform_logits() {
    let logits = Tensor::zeros(&[2, 10]);
    let out = softmax_cross_entropy(&logits, &[3, 9]).unwrap();
    assert!((out.loss - 10f64.ln()).abs() < 1e-12);
    // Row 0: softmax = 0.1 everywhere, minus one at the label, divided by batch size 2.
    assert!((out.grad.data[0] - 0.05).abs() < 1e-12);
    assert!((out.grad.data[3] + 0.45).abs() < 1e-12);
}

#[test]
fn test_softmax_cross_entropy_gradient_check() {
    let mut rng = StdRng::seed_from_u64(3);
    let logits = random_tensor(&[3, 5], &mut rng);
    let labels = [0, 4, 2];
    let out = softmax_cross_entropy(&logits, &labels).unwrap();

    for i in 0..logits.numel() {
        let mut z = logits.clone();
        z.data[i] += EPS;
        let plus = softmax_cross_entropy(&z, &labels).unwrap().loss;
        z.data[i] -= 2.0 * EPS;
        let minus = softmax_cross_entropy(&z, &labels).unwrap().loss;
        assert_close((plus - minus) / (2.0 * EPS), out.grad.data[i], "cross-entropy logit grad");
    }
}

#[test]
fn test_softmax_cross_entropy_counts_correct_and_rejects_bad_labels() {
    let logits = Tensor::from_vec(&[2, 3], vec![5.0, 0.0, 0.0, 0.0, 0.0, 5.0]);
    assert_eq!(softmax_cross_entropy(&logits, &[0, 1]).unwrap().correct, 1);
    assert!(softmax_cross_entropy(&logits, &[0]).is_err());
    assert!(softmax_cross_entropy(&logits, &[0, 3]).is_err());
}

#[test]
fn test_softmax_is_stable_for_large_logits() {
    let p = softmax(&[1000.0, 1000.0]);
    assert!((p[0] - 0.5).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
}
