use terraform_provider_instana::{init_logging, serve, InstanaProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Instana provider");
    serve(InstanaProvider::new()).await
}
