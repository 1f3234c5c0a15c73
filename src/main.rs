use simulation::{simulate, ChaosConfig};
pub mod simulation;

#[tokio::main]
async fn main() {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            LOCUS RECONCILIATION SIMULATION                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let runs = [
        ("Perfect socket", ChaosConfig::perfect(), 500),
        ("Lossy socket (10% loss)", ChaosConfig::lossy(0.1), 500),
        ("Chaotic socket", ChaosConfig::chaotic(), 1000),
        ("Chaotic socket (large)", ChaosConfig::chaotic(), 10_000),
    ];

    let mut all_converged = true;
    for (seed, (label, chaos, num_deltas)) in runs.into_iter().enumerate() {
        let stats = simulate(label, num_deltas, chaos, seed as u64 + 1).await;
        all_converged &= stats.converged;
        stats.print();
    }

    if all_converged {
        println!("\n✓ Every session converged on the server's latest Locus");
    } else {
        println!("\n✗ Some sessions did not converge");
        std::process::exit(1);
    }
}
