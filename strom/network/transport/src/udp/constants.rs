/// Maximum size of an encoded datagram.
pub const UDP_MAX_MESSAGE_SIZE: usize = 1200;

/// Maximum number of cached discovery lookups.
pub const DISCOVERY_CACHE_MAXSIZE: usize = 50;

/// Maximum number of cached acknowledgements for inbound deduplication.
pub const ACK_CACHE_MAXSIZE: usize = 1024;

/// The retry spacing cap is a multiple of the initial retry interval.
pub const RETRY_MAX_TIMEOUT_FACTOR: u32 = 10;
