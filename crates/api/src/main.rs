#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lyceum_api::start().await
}
