// Thin driver around the library: evaluates one training-mode loss on a
// seeded random batch and prints the loss and gradient shapes.
//
//   cargo run -- [config.json]
//   RUST_LOG=debug cargo run
use std::error::Error;

use ferrite_convnet::{ConvNetConfig, InputDim, Tensor, ThreeLayerConvNet};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

const BATCH_SIZE: usize = 3;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("loading config from {path}");
            ConvNetConfig::load_json(&path)?
        }
        None => ConvNetConfig {
            input_dim: InputDim::new(3, 16, 16),
            num_filters: 2,
            filter_size: 3,
            hidden_dim: 7,
            num_classes: 5,
            weight_scale: 1e-2,
            reg: 0.1,
            seed: Some(0),
        },
    };

    let net = ThreeLayerConvNet::<f32>::new(config.clone())?;

    let dim = config.input_dim;
    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
    let x = Tensor::randn(&[BATCH_SIZE, dim.channels, dim.height, dim.width], 1.0, &mut rng)?;
    let labels: Vec<usize> = (0..BATCH_SIZE).map(|i| (i * 3) % config.num_classes).collect();

    let (loss, grads) = net.loss_and_gradients(&x, &labels)?;
    println!("labels {labels:?} -> loss {loss:.6} (ln K = {:.6})", (config.num_classes as f64).ln());
    for (name, grad) in grads.iter() {
        println!("  d{name}: {:?}, max |g| = {:.3e}", grad.shape(), grad.max_abs());
    }

    Ok(())
}
