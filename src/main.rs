#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cbt_exam_engine::run().await {
        eprintln!("cbt-exam-engine fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
