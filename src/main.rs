#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tryout_engine::run().await {
        eprintln!("tryout-engine fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
