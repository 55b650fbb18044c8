use ferrite_convnet::gradcheck::check_gradients;
use ferrite_convnet::{
    softmax_loss, ConvNetConfig, ErrorKind, InputDim, LossOutput, NetError, ParamName,
    ParameterSet, Tensor, ThreeLayerConvNet,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn scenario() -> ConvNetConfig {
    ConvNetConfig {
        input_dim: InputDim::new(3, 16, 16),
        num_filters: 2,
        filter_size: 3,
        hidden_dim: 7,
        num_classes: 5,
        weight_scale: 1e-2,
        reg: 0.1,
        seed: Some(231),
    }
}

/// Small enough for element-wise finite differences.
fn tiny(seed: u64, reg: f64) -> ConvNetConfig {
    ConvNetConfig {
        input_dim: InputDim::new(2, 6, 6),
        num_filters: 3,
        filter_size: 3,
        hidden_dim: 5,
        num_classes: 4,
        weight_scale: 0.5,
        reg,
        seed: Some(seed),
    }
}

fn images<T: ferrite_convnet::Element>(n: usize, dim: InputDim, seed: u64) -> Tensor<T> {
    let shape = [n, dim.channels, dim.height, dim.width];
    Tensor::randn(&shape, 1.0, &mut StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn scenario_loss_is_near_log_k_with_expected_gradient_shapes() {
    let config = scenario();
    let net = ThreeLayerConvNet::<f64>::new(config.clone()).unwrap();
    let x = images(3, config.input_dim, 1);

    let (loss, grads) = net.loss_and_gradients(&x, &[0, 3, 4]).unwrap();
    assert!(loss > 0.0);
    assert!((loss - 5f64.ln()).abs() < 0.05, "loss {loss}");

    let shapes: Vec<(ParamName, Vec<usize>)> =
        grads.iter().map(|(name, g)| (name, g.shape().to_vec())).collect();
    assert_eq!(
        shapes,
        vec![
            (ParamName::W1, vec![2, 3, 3, 3]),
            (ParamName::B1, vec![2]),
            (ParamName::W2, vec![2 * 8 * 8, 7]),
            (ParamName::B2, vec![7]),
            (ParamName::W3, vec![7, 5]),
            (ParamName::B3, vec![5]),
        ]
    );
    for ((_, g), (_, p)) in grads.iter().zip(net.params().iter()) {
        assert_eq!(g.shape(), p.shape());
    }
}

#[test]
fn single_precision_network_produces_same_shapes() {
    let config = scenario();
    let net = ThreeLayerConvNet::<f32>::new(config.clone()).unwrap();
    let x = images::<f32>(2, config.input_dim, 2);

    let scores = net.scores(&x).unwrap();
    assert_eq!(scores.shape(), &[2, 5]);

    let (loss, grads) = net.loss_and_gradients(&x, &[1, 2]).unwrap();
    assert!((loss - 5f32.ln()).abs() < 0.05);
    assert!(grads.check_shapes(&config).is_ok());
}

#[test]
fn analytic_gradients_match_finite_differences() {
    for seed in [0, 1, 2] {
        let config = tiny(seed, 0.05);
        let mut net = ThreeLayerConvNet::<f64>::new(config.clone()).unwrap();
        let x = images(4, config.input_dim, 100 + seed);
        let labels = [0, 3, 1, 2];

        let errors = check_gradients(&mut net, &x, &labels, 1e-6).unwrap();
        assert_eq!(errors.len(), 6);
        for (name, err) in errors {
            assert!(err < 1e-5, "seed {seed}: {name} relative error {err:e}");
        }
    }
}

#[test]
fn gradient_check_restores_parameters() {
    let config = tiny(5, 0.0);
    let mut net = ThreeLayerConvNet::<f64>::new(config.clone()).unwrap();
    let before = net.params().clone();
    let x = images(2, config.input_dim, 6);

    check_gradients(&mut net, &x, &[1, 2], 1e-6).unwrap();
    assert_eq!(net.params(), &before);
}

#[test]
fn regularization_adds_exactly_reg_times_weights() {
    let reg = 0.5;
    let plain = ThreeLayerConvNet::<f64>::new(tiny(8, 0.0)).unwrap();
    let regularized = ThreeLayerConvNet::<f64>::new(tiny(8, reg)).unwrap();
    assert_eq!(plain.params(), regularized.params());

    let x = images(3, plain.config().input_dim, 9);
    let labels = [2, 0, 1];
    let (loss0, grads0) = plain.loss_and_gradients(&x, &labels).unwrap();
    let (loss1, grads1) = regularized.loss_and_gradients(&x, &labels).unwrap();
    assert!(loss1 > loss0);

    let squares: f64 = ParamName::WEIGHTS
        .iter()
        .map(|&name| plain.params().get(name).sum_squares())
        .sum();
    assert!((loss1 - loss0 - 0.5 * reg * squares).abs() < 1e-10);

    for name in ParamName::ALL {
        let (g0, g1) = (grads0.get(name), grads1.get(name));
        if name.is_weight() {
            let w = plain.params().get(name);
            let expected = g0.clone() + w.scale(reg);
            let diff = (g1.clone() - expected).max_abs();
            assert!(diff < 1e-12, "{name}: {diff:e}");
        } else {
            assert_eq!(g0, g1, "{name} must not be regularized");
        }
    }
}

#[test]
fn scores_only_mode_matches_training_path() {
    let config = tiny(12, 0.1);
    let net = ThreeLayerConvNet::<f64>::new(config.clone()).unwrap();
    let x = images(3, config.input_dim, 13);
    let labels = [3, 3, 0];

    let scores = match net.loss(&x, None).unwrap() {
        LossOutput::Scores(scores) => scores,
        other => panic!("expected scores, got {other:?}"),
    };
    assert_eq!(scores, net.scores(&x).unwrap());

    let loss = match net.loss(&x, Some(&labels[..])).unwrap() {
        LossOutput::Training { loss, .. } => loss,
        other => panic!("expected training output, got {other:?}"),
    };
    assert_eq!(net.loss_value(&x, &labels).unwrap(), loss);

    let (data_loss, _) = softmax_loss(&scores, &labels).unwrap();
    let squares: f64 = ParamName::WEIGHTS
        .iter()
        .map(|&name| net.params().get(name).sum_squares())
        .sum();
    assert!((data_loss + 0.5 * 0.1 * squares - loss).abs() < 1e-12);
}

#[test]
fn seeded_construction_and_evaluation_are_deterministic() {
    let a = ThreeLayerConvNet::<f64>::new(scenario()).unwrap();
    let b = ThreeLayerConvNet::<f64>::new(scenario()).unwrap();
    assert_eq!(a.params(), b.params());

    let mut rng = StdRng::seed_from_u64(231);
    let c = ThreeLayerConvNet::<f64>::with_rng(ConvNetConfig { seed: None, ..scenario() }, &mut rng)
        .unwrap();
    assert_eq!(a.params(), c.params());

    let x = images(2, scenario().input_dim, 4);
    let first = a.loss(&x, Some(&[1, 4][..])).unwrap();
    let second = a.loss(&x, Some(&[1, 4][..])).unwrap();
    assert_eq!(first, second);
    assert_eq!(a.scores(&x).unwrap(), b.scores(&x).unwrap());
}

#[test]
fn precision_cast_keeps_scores_close() {
    let config = tiny(3, 0.0);
    let net64 = ThreeLayerConvNet::<f64>::new(config.clone()).unwrap();
    let params32: ParameterSet<f32> = net64.params().cast();
    let net32 = ThreeLayerConvNet::from_params(config.clone(), params32).unwrap();

    let x64 = images::<f64>(2, config.input_dim, 5);
    let x32 = x64.cast::<f32>();
    let s64 = net64.scores(&x64).unwrap();
    let s32 = net32.scores(&x32).unwrap().cast::<f64>();
    assert!((s64 - s32).max_abs() < 1e-3);
}

#[test]
fn configuration_errors_fail_loudly() {
    let even = ConvNetConfig { filter_size: 4, ..scenario() };
    assert_eq!(
        ThreeLayerConvNet::<f64>::new(even).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    let too_small = ConvNetConfig { input_dim: InputDim::new(3, 1, 1), ..scenario() };
    assert!(matches!(
        ThreeLayerConvNet::<f64>::new(too_small),
        Err(NetError::Configuration(_))
    ));

    let net = ThreeLayerConvNet::<f64>::new(scenario()).unwrap();

    let wrong_size = Tensor::<f64>::zeros(&[2, 3, 15, 16]);
    assert!(matches!(
        net.loss(&wrong_size, None),
        Err(NetError::ShapeMismatch { what: "input batch", .. })
    ));

    let x = images(2, scenario().input_dim, 0);
    assert!(matches!(
        net.loss(&x, Some(&[0, 5][..])),
        Err(NetError::LabelOutOfRange { index: 1, label: 5, num_classes: 5 })
    ));
    let err = net.loss(&x, Some(&[0][..])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
