#[tokio::main]
async fn main() -> std::io::Result<()> {
    bike_sandbox::run_with_config().await
}
