use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init(level: Level) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set subscriber: {e}"))
}
