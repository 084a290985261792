use std::time::Duration;

/// Transport configuration.
#[derive(Clone)]
pub struct TransportConfig {
	/// Spacing of the first retransmissions of an unacknowledged message.
	pub retry_interval: Duration,
	/// Number of attempts at `retry_interval` before the spacing doubles.
	pub retries_before_backoff: u32,
	/// Number of pings at `nat_keepalive_timeout` spacing before a peer is
	/// marked unreachable.
	pub nat_keepalive_retries: u32,
	/// Spacing of keepalive pings.
	pub nat_keepalive_timeout: Duration,
	/// Spacing of pings towards an unreachable peer (NAT traversal).
	pub nat_invitation_timeout: Duration,
	/// Time-to-live of the discovery and acknowledgement caches.
	pub cache_ttl: Duration,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			retry_interval: Duration::from_secs(1),
			retries_before_backoff: 5,
			nat_keepalive_retries: 2,
			nat_keepalive_timeout: Duration::from_secs(5),
			nat_invitation_timeout: Duration::from_secs(15),
			cache_ttl: Duration::from_secs(60),
		}
	}
}
