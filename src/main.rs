#[tokio::main]
async fn main() {
    if let Err(e) = btc_balance_checker::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
