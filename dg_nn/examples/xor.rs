//! XOR problem training example.
//!
//! Trains a small MLP to learn the XOR function one step at a time.
//! XOR is a classic non-linearly separable problem that requires hidden layers.

use dg_core::Decimal;
use dg_nn::{NetworkConfig, NeuralNetwork};
use rust_decimal_macros::dec;

fn main() -> dg_nn::Result<()> {
    // XOR dataset
    let inputs = [
        [dec!(0), dec!(0)],
        [dec!(0), dec!(1)],
        [dec!(1), dec!(0)],
        [dec!(1), dec!(1)],
    ];
    let targets = [dec!(0), dec!(1), dec!(1), dec!(0)];

    // 2 -> 8 -> 1
    let config = NetworkConfig::new(2, [8, 1])
        .with_learning_rate(dec!(0.05))
        .with_seed(42);
    let mut net = NeuralNetwork::new(&config)?;

    println!("Training XOR network...\n");

    for epoch in 0..500 {
        let mut total_loss = Decimal::ZERO;

        for (input, &target) in inputs.iter().zip(targets.iter()) {
            let loss = net.step(input, &[target])?;
            total_loss += net.tape().data(loss)?;
        }

        if epoch % 50 == 0 || epoch == 499 {
            println!(
                "Epoch {:4}: avg loss = {}",
                epoch,
                (total_loss / dec!(4)).round_dp(6)
            );
        }
    }

    // Test the trained network
    println!("\nTesting trained network:");
    println!("========================");
    for (input, &target) in inputs.iter().zip(targets.iter()) {
        let prediction = net.predict(input)?[0];
        println!(
            "  {} XOR {} = {} (expected {})",
            input[0],
            input[1],
            prediction.round_dp(4),
            target
        );
    }

    Ok(())
}
