use std::io;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};

use mnist_sgd::nn::Net;
use mnist_sgd::tensor::Device;
use mnist_sgd::train::{CancellationToken, TrainConfig, TrainError, Trainer};

fn main() -> Result<(), TrainError> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(io::stderr)
        .init();

    let device = Device::cuda_if_available();
    let config = TrainConfig::default();
    let mut rng = StdRng::from_entropy();

    let model: Net<f32> = Net::new(&mut rng)?;
    let mut trainer = Trainer::new(model, device, config)?;
    let mut batches = trainer.batches(rng);

    let cancel = CancellationToken::new();
    let summary = trainer.train(0, &mut batches, &cancel, &mut io::stdout().lock())?;
    info!(iterations = summary.iterations, "done");
    Ok(())
}
