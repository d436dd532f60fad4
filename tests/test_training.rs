use mnist_sgd::data::SyntheticBatches;
use mnist_sgd::nn::{Module, Net, NUM_CLASSES};
use mnist_sgd::tensor::{functional, Device, RcTensor, TensorLike};
use mnist_sgd::train::{CancellationToken, TrainConfig, Trainer};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn net(seed: u64) -> Net<f32> {
    Net::new(&mut StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn forward_yields_ten_scores_per_image() {
    let net = net(0);
    let mut batches = SyntheticBatches::seeded(64, 9, 0);
    let batch = batches.next_batch().unwrap();
    let output = net.forward(batch.inputs).unwrap();
    assert_eq!(output.shape(), &[64, NUM_CLASSES]);
}

#[test]
fn loss_is_finite_for_every_class() {
    let net = net(1);
    let inputs = RcTensor::randn(vec![10, 1, 28, 28], &mut StdRng::seed_from_u64(1));
    let targets = RcTensor::new((0..10).collect(), vec![10]).unwrap();
    let output = net.forward(inputs).unwrap();
    let loss = functional::cross_entropy(&output, &targets)
        .unwrap()
        .elem()
        .unwrap();
    assert!(loss.is_finite());
    assert!(loss >= 0.0);
}

#[test]
fn class_ten_target_is_rejected() {
    let net = net(2);
    let inputs = RcTensor::randn(vec![2, 1, 28, 28], &mut StdRng::seed_from_u64(2));
    let targets = RcTensor::from([3i64, 10]);
    let output = net.forward(inputs).unwrap();
    assert!(functional::cross_entropy(&output, &targets).is_err());
}

#[test]
fn reports_at_first_and_every_thousandth_iteration() {
    let config = TrainConfig {
        batch_size: 1,
        max_iterations: 2001,
        ..TrainConfig::default()
    };
    let mut trainer = Trainer::new(net(3), Device::Cpu, config).unwrap();
    let mut batches = SyntheticBatches::seeded(1, 9, 3);
    let mut out = Vec::new();
    let summary = trainer
        .train(0, &mut batches, &CancellationToken::new(), &mut out)
        .unwrap();

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(summary.iterations, 2001);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[Epoch 1, Batch     1] loss: "));
    assert!(lines[1].starts_with("[Epoch 1, Batch  1001] loss: "));
    assert!(lines[2].starts_with("[Epoch 1, Batch  2001] loss: "));
    assert!(lines.iter().all(|line| line.contains(" time: ")));
}

#[test]
fn cancelling_from_another_thread_stops_training() {
    let config = TrainConfig {
        batch_size: 1,
        ..TrainConfig::default()
    };
    let mut trainer = Trainer::new(net(4), Device::Cpu, config).unwrap();
    let mut batches = SyntheticBatches::seeded(1, 9, 4);
    let cancel = CancellationToken::new();

    let handle = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        handle.cancel();
    });
    let summary = trainer
        .train(0, &mut batches, &cancel, &mut std::io::sink())
        .unwrap();
    canceller.join().unwrap();

    assert!(summary.cancelled);
    assert!(summary.iterations < TrainConfig::default().max_iterations);
}
