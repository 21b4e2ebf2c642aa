#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aether_server::run().await
}
