#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = ayatest_rust::run().await {
        eprintln!("ayatest-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
