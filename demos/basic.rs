use seqlog::{Level, LoggerBuilder, TimeZone};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = LoggerBuilder::new("./logs", "basic")
        .level(Level::Debug)
        .time_zone(TimeZone::UTC)
        .file_mode(0o640) // Set file permissions to: owner rw, group r, others none
        .build()?;

    // Written to ./logs/basic_debug_0.log and stdout
    for i in 1..=10 {
        seqlog::debug!(logger => "request", i, "took", 12.5 * i as f64, "ms");
    }
    seqlog::info!(logger => "not written, the logger is at debug level");

    println!("current file: {}", logger.current_file().display());
    Ok(())
}
