use {
    seqlog::{LoggerBuilder, MAX_FILE_SIZE},
    std::fs::OpenOptions,
    tracing_subscriber::util::SubscriberInitExt,
};

// Shows the diagnostics the logger emits about itself: rotations at debug
// level and swallowed failures at warn level.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish()
        .try_init()?;

    let logger = LoggerBuilder::new("./logs", "tracing").build()?;
    seqlog::info!(logger => "first line");

    // Pretend the file is full. The file is sparse, so no disk space is used.
    OpenOptions::new()
        .write(true)
        .open(logger.current_file())?
        .set_len(MAX_FILE_SIZE)?;

    seqlog::info!(logger => "this line starts a new file");
    println!("health: {:?}", logger.health());
    Ok(())
}
