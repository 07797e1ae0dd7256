use rask_cloud_logging::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
