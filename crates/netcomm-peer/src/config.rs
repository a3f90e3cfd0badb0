use std::time::Duration;

use netcomm_frame::FrameConfig;

/// How long a partial frame may sit in the buffer before an
/// `Interrupted` event is raised.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Size of each stream read. Datagram endpoints read whole datagrams.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Read timeout used on datagram endpoints so a local close is noticed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Per-connection behaviour.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub stall_timeout: Duration,
    pub read_chunk_size: usize,
    pub poll_interval: Duration,
    /// Parser limits and the socket write timeout.
    pub frame: FrameConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            frame: FrameConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Override the stall timeout.
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.stall_timeout, Duration::from_secs(15));
        assert_eq!(config.read_chunk_size, 4096);
        assert_eq!(config.frame.max_text_len, netcomm_frame::TXT_MAX);
    }

    #[test]
    fn builder_overrides_stall_timeout() {
        let config = ConnectionConfig::default().with_stall_timeout(Duration::from_millis(50));
        assert_eq!(config.stall_timeout, Duration::from_millis(50));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
