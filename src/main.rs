#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stepwise_cli::cli::run().await
}
