//! Integration tests for gradient engines, Bellman targets and trainers.

use rust_rlnet::core::{NetRng, TrainingConfig};
use rust_rlnet::matrix::Matrix;
use rust_rlnet::nn::{Activation, Architecture, Network};
use rust_rlnet::NetError;
use rust_rlnet::training::{
    backprop, bellman_targets, finite_difference_cost, finite_difference_policy, finite_difference_q,
    gradient_descent, policy_backprop, q_backprop, DqnTrainer, Step, StepBuffer,
};

const GRADIENT_TOLERANCE: f32 = 1e-2;

fn assert_gradients_close(analytic: &Network, numeric: &Network) {
    let mut compared = 0;
    for (i, (a, n)) in analytic.parameters().zip(numeric.parameters()).enumerate() {
        assert!(
            (a - n).abs() < GRADIENT_TOLERANCE,
            "parameter {}: analytic {} vs numeric {}",
            i,
            a,
            n
        );
        compared += 1;
    }
    assert_eq!(compared, analytic.parameter_count());
}

fn xor_data() -> (Matrix, Matrix) {
    let inputs = Matrix::from_vec(4, 2, vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
    let targets = Matrix::from_vec(4, 1, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    (inputs, targets)
}

fn small_net(activations: &[Activation], seed: u64) -> Network {
    let out = if activations.last() == Some(&Activation::Softmax) { 2 } else { 1 };
    let mut net = Network::new(&[2, 3, out], activations).unwrap();
    net.xavier_init(&mut NetRng::new(seed));
    net
}

fn episode() -> Vec<Step> {
    vec![
        Step::new(vec![0.2, -0.4], 0, 1.0, 0.0, false),
        Step::new(vec![0.9, 0.1], 1, -0.5, 0.0, false),
        Step::new(vec![-0.3, 0.7], 1, 0.0, 0.0, false),
        Step::new(vec![-0.8, -0.6], 0, 2.0, 0.0, true),
    ]
}

// =============================================================================
// Gradient Check Tests
// =============================================================================

#[test]
fn test_backprop_matches_finite_difference_sigmoid() {
    let mut net = small_net(&[Activation::Sigmoid, Activation::Sigmoid], 1);
    let (inputs, targets) = xor_data();

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_backprop_matches_finite_difference_tanh() {
    let mut net = small_net(&[Activation::Tanh, Activation::Sigmoid], 2);
    let (inputs, targets) = xor_data();

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_backprop_matches_finite_difference_linear_output() {
    let arch = Architecture::new(&[2, 3, 1]).unwrap();
    let mut net = Network::with_activations(&arch, &[Some(Activation::Tanh), None]).unwrap();
    net.xavier_init(&mut NetRng::new(3));
    let (inputs, targets) = xor_data();

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

/// 2-3-1 network with fixed parameters whose hidden pre-activations stay at
/// least 0.15 away from zero on every XOR input, clear of the ReLU kink.
fn kinked_net(hidden: Activation) -> Network {
    let mut net = Network::new(&[2, 3, 1], &[hidden, Activation::Sigmoid]).unwrap();
    let layers = net.layers_mut();
    layers[0]
        .weights
        .as_mut_slice()
        .copy_from_slice(&[0.6, -0.7, 0.4, -0.5, 0.8, 0.9]);
    layers[0].bias.as_mut_slice().copy_from_slice(&[0.3, 0.2, -0.25]);
    layers[1].weights.as_mut_slice().copy_from_slice(&[0.5, -0.6, 0.7]);
    layers[1].bias.as_mut_slice()[0] = 0.1;
    net
}

fn min_hidden_pre_activation(net: &Network, inputs: &Matrix) -> f32 {
    let hidden = &net.layers()[0];
    let w = hidden.weights.as_slice();
    let b = hidden.bias.as_slice();
    let mut min = f32::INFINITY;
    for x in inputs.view().row_slices() {
        for j in 0..3 {
            let z = x[0] * w[j] + x[1] * w[3 + j] + b[j];
            min = min.min(z.abs());
        }
    }
    min
}

#[test]
fn test_backprop_matches_finite_difference_relu() {
    let mut net = kinked_net(Activation::Relu);
    let (inputs, targets) = xor_data();
    assert!(min_hidden_pre_activation(&net, &inputs) > 0.1);

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
    assert!(analytic.parameters().any(|&g| g != 0.0));
}

#[test]
fn test_backprop_matches_finite_difference_leaky_relu() {
    let mut net = kinked_net(Activation::LeakyRelu);
    let (inputs, targets) = xor_data();
    assert!(min_hidden_pre_activation(&net, &inputs) > 0.1);

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_softmax_backprop_matches_finite_difference() {
    let mut net = small_net(&[Activation::Tanh, Activation::Softmax], 4);
    let (inputs, _) = xor_data();
    let targets = Matrix::from_vec(4, 2, vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]).unwrap();

    let mut analytic = net.gradient_network();
    backprop(&mut net, &mut analytic, &inputs, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_cost(&mut net, &mut numeric, 1e-3, &inputs, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_q_backprop_matches_finite_difference() {
    let mut net = Network::new(&[2, 3, 2], &[Activation::Tanh, Activation::Sigmoid]).unwrap();
    net.xavier_init(&mut NetRng::new(5));
    let steps = episode();
    let indices = [3, 0, 2];
    let targets = [0.8, 0.1, 0.5];

    let mut analytic = net.gradient_network();
    q_backprop(&mut net, &mut analytic, &steps, &indices, &targets).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_q(&mut net, &mut numeric, 1e-3, &steps, &indices, &targets).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_policy_backprop_matches_finite_difference() {
    let mut net = small_net(&[Activation::Tanh, Activation::Softmax], 6);
    let steps = episode();

    let mut analytic = net.gradient_network();
    policy_backprop(&mut net, &mut analytic, &steps).unwrap();

    let mut numeric = net.gradient_network();
    finite_difference_policy(&mut net, &mut numeric, 1e-3, &steps).unwrap();

    assert_gradients_close(&analytic, &numeric);
}

#[test]
fn test_backprop_rejects_incompatible_gradient_network() {
    let mut net = small_net(&[Activation::Sigmoid, Activation::Sigmoid], 7);
    let mut grad = Network::new(&[2, 4, 1], &[]).unwrap();
    let (inputs, targets) = xor_data();
    assert!(backprop(&mut net, &mut grad, &inputs, &targets).is_err());
}

#[test]
fn test_policy_backprop_rejects_sigmoid_output() {
    let mut net = Network::new(&[2, 3, 2], &[Activation::Tanh, Activation::Sigmoid]).unwrap();
    net.xavier_init(&mut NetRng::new(6));
    let mut grad = net.gradient_network();
    assert!(matches!(
        policy_backprop(&mut net, &mut grad, &episode()),
        Err(NetError::InvalidArchitecture(_))
    ));
    assert!(grad.parameters().all(|&g| g == 0.0));
}

// =============================================================================
// Supervised Training Tests
// =============================================================================

#[test]
fn test_xor_cost_trends_down() {
    let mut net = small_net(&[Activation::Sigmoid, Activation::Sigmoid], 42);
    let mut grad = net.gradient_network();
    let (inputs, targets) = xor_data();

    let mut samples = vec![net.cost(&inputs, &targets).unwrap()];
    for iteration in 1..=4000 {
        backprop(&mut net, &mut grad, &inputs, &targets).unwrap();
        gradient_descent(&mut net, &grad, 0.5).unwrap();
        if iteration % 400 == 0 {
            samples.push(net.cost(&inputs, &targets).unwrap());
        }
    }

    for pair in samples.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-6, "cost went up: {:?}", samples);
    }
    let first = samples[0];
    let last = samples[samples.len() - 1];
    assert!(last < first, "{} -> {}", first, last);
}

// =============================================================================
// Bellman Target Tests
// =============================================================================

/// Linear 2 -> 2 network with Q(s) = [s0, s1].
fn identity_target() -> Network {
    let mut net = Network::new(&[2, 2], &[]).unwrap();
    net.layers_mut()[0]
        .weights
        .as_mut_slice()
        .copy_from_slice(&[1.0, 0.0, 0.0, 1.0]);
    net
}

#[test]
fn test_bellman_terminal_reward() {
    let steps = vec![Step::new(vec![3.0, 4.0], 0, 5.0, 0.0, true)];
    let targets = bellman_targets(&mut identity_target(), &steps, &[0], 0.99).unwrap();
    assert_eq!(targets, vec![5.0]);
}

#[test]
fn test_bellman_discounted_successor() {
    let steps = vec![
        Step::new(vec![0.0, 0.0], 0, 1.0, 0.0, false),
        Step::new(vec![2.0, -1.0], 1, 0.0, 0.0, true),
    ];
    let targets = bellman_targets(&mut identity_target(), &steps, &[0], 0.99).unwrap();
    assert!((targets[0] - 2.98).abs() < 1e-6);
}

#[test]
fn test_bellman_gamma_is_configurable() {
    let steps = vec![
        Step::new(vec![0.0, 0.0], 0, 1.0, 0.0, false),
        Step::new(vec![2.0, -1.0], 1, 0.0, 0.0, true),
    ];
    let targets = bellman_targets(&mut identity_target(), &steps, &[0], 0.5).unwrap();
    assert_eq!(targets, vec![2.0]);
}

// =============================================================================
// DQN Trainer Tests
// =============================================================================

#[test]
fn test_dqn_learns_bandit() {
    // One state; action 0 pays 1, action 1 pays 0.
    let arch = Architecture::new(&[2, 8, 2]).unwrap();
    let mut net = Network::with_activations(&arch, &[Some(Activation::Tanh), None]).unwrap();
    net.xavier_init(&mut NetRng::new(10));
    let config = TrainingConfig::default()
        .with_batch_size(16)
        .with_learning_rate(0.05)
        .with_target_sync_interval(10);
    let mut trainer = DqnTrainer::from_network(net, config);

    let state = vec![1.0, 0.0];
    let mut buffer = StepBuffer::new(64);
    for i in 0..64 {
        let action = i % 2;
        let reward = if action == 0 { 1.0 } else { 0.0 };
        buffer.push(Step::new(state.clone(), action, reward, 0.0, true));
    }

    let mut losses = Vec::new();
    for _ in 0..300 {
        if let Some(loss) = trainer.train_step(&mut buffer).unwrap() {
            losses.push(loss);
        }
    }
    assert_eq!(losses.len(), 300);
    assert!(losses[losses.len() - 1] < losses[0]);

    let q = trainer.q_values(&state).unwrap().to_vec();
    assert!(q[0] > q[1], "{:?}", q);
    assert!((q[0] - 1.0).abs() < 0.2);
    assert!(q[1].abs() < 0.2);
    assert_eq!(trainer.greedy_action(&state).unwrap().0, 0);
}

#[test]
fn test_dqn_replay_episode() {
    let config = TrainingConfig::default().with_batch_size(4).with_seed(7);
    let mut trainer = DqnTrainer::new(&[2, 6, 3], &[Activation::Relu, Activation::LeakyRelu], config).unwrap();
    let mut buffer = trainer.new_buffer();

    for episode in 0..3 {
        for t in 0..5 {
            let state = vec![t as f32 / 5.0, episode as f32];
            let (action, q) = trainer.select_action(&state).unwrap();
            assert!(action < 3);
            buffer.push(Step::new(state, action, 0.1 * t as f32, q, false));
        }
        if let Some(last) = buffer.last_mut() {
            last.terminal = true;
        }
        trainer.decay_epsilon();
    }

    let loss = trainer.train_step(&mut buffer).unwrap();
    assert!(loss.is_some());
    assert_eq!(buffer.capacity(), 10_000);
    assert!(trainer.epsilon() < 1.0);
    assert!(!trainer.online().has_non_finite());
}

#[test]
fn test_dqn_resumes_from_checkpoint() {
    let config = TrainingConfig::default().with_batch_size(4).with_seed(3);
    let mut trainer = DqnTrainer::new(&[2, 5, 2], &[Activation::Tanh, Activation::Sigmoid], config.clone()).unwrap();
    let mut buffer = trainer.new_buffer();
    for i in 0..12 {
        let state = vec![i as f32 / 12.0, 0.5];
        let (action, q) = trainer.select_action(&state).unwrap();
        buffer.push(Step::new(state, action, 0.2, q, i % 4 == 3));
    }
    trainer.train_step(&mut buffer).unwrap();
    trainer.sync_target().unwrap();

    // Checkpoint network, RNG streams and replay buffer.
    let rng = trainer.rng_state();
    let snapshot = buffer.to_bytes().unwrap();
    let mut resumed = DqnTrainer::from_network(trainer.online().clone(), config);
    resumed.restore_rng_state(&rng);
    let mut resumed_buffer = StepBuffer::from_bytes(&snapshot).unwrap();

    for _ in 0..3 {
        let a = trainer.train_step(&mut buffer).unwrap();
        let b = resumed.train_step(&mut resumed_buffer).unwrap();
        assert_eq!(a, b);
    }
    assert!(trainer.online().parameters().eq(resumed.online().parameters()));
}
