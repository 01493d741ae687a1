#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tryout_engine::run_worker().await {
        eprintln!("tryout-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
