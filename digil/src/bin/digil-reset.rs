#[tokio::main]
async fn main() -> anyhow::Result<()> {
    digil::cli::run().await
}
