use ferrite_lenet::error::ComputationError;
use ferrite_lenet::layers::Padding;
use ferrite_lenet::network::LayerSpec;
use ferrite_lenet::{ActivationFunction, Network, NetworkSpec, Sgd, Tensor};

#[test]
fn test_lenet_spec_maps_mnist_digit_to_ten_scores() {
    let spec = NetworkSpec::lenet();
    assert_eq!(spec.output_shape(&[1, 28, 28]).unwrap(), vec![10]);
}

#[test]
fn test_lenet_intermediate_shapes() {
    let spec = NetworkSpec::lenet();
    let mut shape = spec.input_shape.clone();
    let mut seen = Vec::new();
    for layer in &spec.layers {
        shape = layer.output_shape(&shape).unwrap();
        seen.push(shape.clone());
    }
    assert_eq!(
        seen,
        vec![
            vec![6, 28, 28],
            vec![6, 14, 14],
            vec![16, 10, 10],
            vec![16, 5, 5],
            vec![400],
            vec![40],
            vec![20],
            vec![10],
        ]
    );
}

#[test]
fn test_lenet_forward_outputs_batch_by_ten() {
    let network = Network::lenet(1);
    let out = network.predict(&Tensor::zeros(&[3, 1, 28, 28])).unwrap();
    assert_eq!(out.shape, vec![3, 10]);
    assert!(out.all_finite());
}

#[test]
fn test_lenet_parameter_count() {
    // conv1 6·25+6, conv2 16·150+16, dense 400·40+40, 40·20+20, 20·10+10
    assert_eq!(Network::lenet(0).parameter_count(), 156 + 2416 + 16040 + 820 + 210);
}

#[test]
fn test_same_seed_gives_same_weights() {
    let a = Network::lenet(9);
    let b = Network::lenet(9);
    let c = Network::lenet(10);
    let values = |n: &Network| n.parameters().iter().flat_map(|p| p.value.data.clone()).collect::<Vec<_>>();
    assert_eq!(values(&a), values(&b));
    assert_ne!(values(&a), values(&c));
}

#[test]
fn test_forward_matches_predict() {
    let mut network = Network::lenet(4);
    let input = Tensor::from_vec(&[2, 1, 28, 28], (0..2 * 784).map(|i| (i % 17) as f64 / 17.0).collect());
    let predicted = network.predict(&input).unwrap();
    let forwarded = network.forward(&input).unwrap();
    assert_eq!(predicted, forwarded);
}

#[test]
fn test_wrong_input_shape_is_an_error_not_a_panic() {
    let mut network = Network::lenet(0);
    let err = network.forward(&Tensor::zeros(&[1, 1, 14, 14])).unwrap_err();
    assert!(matches!(err, ComputationError::ShapeMismatch { .. }));
    assert!(network.predict(&Tensor::zeros(&[784])).is_err());
}

#[test]
fn test_from_spec_rejects_inconsistent_layers() {
    let mut spec = NetworkSpec::lenet();
    spec.layers[5] = LayerSpec::Dense { input_size: 256, size: 40, activation: ActivationFunction::ReLU };
    assert!(Network::from_spec(&spec, 0).is_err());
    assert!(Network::from_spec(&NetworkSpec::lenet(), 0).is_ok());
}

fn single_layer(layer: LayerSpec) -> NetworkSpec {
    NetworkSpec { name: "single".to_owned(), input_shape: vec![1, 5, 5], layers: vec![layer] }
}

#[test]
fn test_from_spec_rejects_zero_sized_layers() {
    let zero_sized = [
        LayerSpec::Conv2d {
            kernel: 0,
            channels_in: 1,
            channels_out: 2,
            padding: Padding::Same,
            activation: ActivationFunction::ReLU,
        },
        LayerSpec::Conv2d {
            kernel: 3,
            channels_in: 1,
            channels_out: 0,
            padding: Padding::Valid,
            activation: ActivationFunction::ReLU,
        },
        LayerSpec::AvgPool2d { kernel: 0, stride: 1 },
        LayerSpec::AvgPool2d { kernel: 2, stride: 0 },
    ];
    for layer in zero_sized {
        let spec = single_layer(layer.clone());
        assert!(
            matches!(Network::from_spec(&spec, 0), Err(ComputationError::ShapeMismatch { .. })),
            "{:?} was accepted",
            layer
        );
    }

    let mut spec = single_layer(LayerSpec::Flatten);
    spec.layers.push(LayerSpec::Dense { input_size: 25, size: 0, activation: ActivationFunction::Identity });
    assert!(Network::from_spec(&spec, 0).is_err());
}

#[test]
fn test_sgd_step_moves_against_gradient_and_clears_it() {
    let mut network = Network::lenet(2);
    let optimizer = Sgd::new(&network, 0.5);
    let before = network.parameters()[0].value.data[0];

    {
        let mut params = network.parameters_mut();
        let mut grad = Tensor::zeros(params[0].shape());
        grad.data[0] = 2.0;
        params[0].accumulate_grad(&grad);
    }
    optimizer.step(&mut network).unwrap();

    let after = network.parameters()[0].value.data[0];
    assert!((after - (before - 1.0)).abs() < 1e-12);
    assert!(network.parameters().iter().all(|p| p.grad.is_none()));
}

#[test]
fn test_sgd_refuses_a_network_with_a_different_layout() {
    let lenet = Network::lenet(0);
    let optimizer = Sgd::new(&lenet, 0.1);

    let mut spec = NetworkSpec::lenet();
    spec.layers.truncate(6);
    let mut other = Network::from_spec(&spec, 0).unwrap();
    assert!(matches!(
        optimizer.step(&mut other),
        Err(ComputationError::ParameterMismatch { .. })
    ));
}

#[test]
fn test_save_and_load_json_preserves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lenet.json");

    let network = Network::lenet(5);
    network.save_json(&path).unwrap();
    let loaded = Network::load_json(&path).unwrap();

    let input = Tensor::from_vec(&[1, 1, 28, 28], (0..784).map(|i| (i % 7) as f64 / 7.0).collect());
    let a = network.predict(&input).unwrap();
    let b = loaded.predict(&input).unwrap();
    for (x, y) in a.data.iter().zip(&b.data) {
        assert!((x - y).abs() < 1e-9);
    }
}

#[cfg(unix)]
#[test]
fn test_save_json_keeps_non_utf8_file_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(OsStr::from_bytes(b"lenet-\xff.json"));
    Network::lenet(0).save_json(&path).unwrap();

    assert!(path.is_file());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(Network::load_json(&path).unwrap().parameter_count(), 19642);
}
