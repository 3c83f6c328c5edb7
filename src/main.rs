#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catalog_harness::run_server().await
}
