use tracing_subscriber::filter::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse filter: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to open log file: {0}")]
    LogFile(#[from] std::io::Error),
}
