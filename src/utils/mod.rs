pub mod logging {
    use tracing::Level;

    /// Maps a configured level name to a tracing level. Unknown names fall back to INFO.
    pub fn parse_level(name: &str) -> Level {
        match name.trim().to_ascii_uppercase().as_str() {
            "WARNING" => Level::WARN,
            "CRITICAL" | "FATAL" => Level::ERROR,
            other => other.parse().unwrap_or(Level::INFO),
        }
    }

    /// Installs the global fmt subscriber writing to stderr. A second call is a no-op.
    pub fn init(level: &str) {
        let result = tracing_subscriber::fmt()
            .with_max_level(parse_level(level))
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        if result.is_err() {
            tracing::debug!("Logging already initialized");
        }
    }

}
