use std::{
	collections::HashMap,
	sync::{
		atomic::{
			AtomicBool,
			Ordering,
		},
		Arc,
	},
	time::Duration,
};

use ethsign::SecretKey;
use parking_lot::Mutex;
use strom_network_messages::{
	decode::decode,
	messages::Message,
};
use strom_primitives::{
	signing::PrivateKey,
	types::{
		Address,
		H256,
	},
};
use tokio::time;
use web3::signing::Key;

use crate::{
	config::TransportConfig,
	udp::UdpTransport,
	DatagramSender,
	Discovery,
	HandlerError,
	MessageHandler,
};

mod service;

/// Records every datagram instead of hitting a socket.
pub(crate) struct MockSender {
	started: AtomicBool,
	accepting: AtomicBool,
	pub(crate) sent: Mutex<Vec<((String, u16), Vec<u8>)>>,
}

impl MockSender {
	pub(crate) fn new() -> Self {
		Self {
			started: AtomicBool::new(true),
			accepting: AtomicBool::new(true),
			sent: Mutex::new(vec![]),
		}
	}

	/// Returns true while `stop_accepting` has not been called.
	pub(crate) fn accepting(&self) -> bool {
		self.accepting.load(Ordering::SeqCst)
	}

	/// Returns the payloads sent so far, excluding keepalive pings.
	pub(crate) fn sent_app_datagrams(&self) -> Vec<Vec<u8>> {
		self.sent
			.lock()
			.iter()
			.filter(|(_, data)| !matches!(decode(data), Ok(Message::Ping(_))))
			.map(|(_, data)| data.clone())
			.collect()
	}

	/// Returns the payloads of sent keepalive pings.
	pub(crate) fn sent_pings(&self) -> Vec<Vec<u8>> {
		self.sent
			.lock()
			.iter()
			.filter(|(_, data)| matches!(decode(data), Ok(Message::Ping(_))))
			.map(|(_, data)| data.clone())
			.collect()
	}

	/// Returns the payloads of sent acknowledgements.
	pub(crate) fn sent_acks(&self) -> Vec<Vec<u8>> {
		self.sent
			.lock()
			.iter()
			.filter(|(_, data)| matches!(decode(data), Ok(Message::Ack(_))))
			.map(|(_, data)| data.clone())
			.collect()
	}
}

#[async_trait::async_trait]
impl DatagramSender for MockSender {
	fn start(&self) {
		self.started.store(true, Ordering::SeqCst);
	}

	async fn send(&self, host_port: (String, u16), data: Vec<u8>) {
		self.sent.lock().push((host_port, data));
	}

	fn started(&self) -> bool {
		self.started.load(Ordering::SeqCst)
	}

	fn stop_accepting(&self) {
		self.accepting.store(false, Ordering::SeqCst);
	}

	fn stop(&self) {
		self.started.store(false, Ordering::SeqCst);
	}
}

/// Static address book.
pub(crate) struct MockDiscovery {
	entries: HashMap<Address, (String, u16)>,
}

impl Discovery for MockDiscovery {
	fn get(&self, address: Address) -> Option<(String, u16)> {
		self.entries.get(&address).cloned()
	}
}

/// Records handled messages and answers with a configurable result.
pub(crate) struct MockHandler {
	pub(crate) handled: Mutex<Vec<(String, H256)>>,
	pub(crate) fail_with: Mutex<Option<HandlerError>>,
}

impl MockHandler {
	pub(crate) fn new() -> Self {
		Self { handled: Mutex::new(vec![]), fail_with: Mutex::new(None) }
	}
}

impl MessageHandler for MockHandler {
	fn on_message(&self, message: Message, echohash: H256) -> Result<(), HandlerError> {
		if let Some(error) = self.fail_with.lock().take() {
			return Err(error)
		}
		self.handled.lock().push((message.type_name().to_owned(), echohash));
		Ok(())
	}
}

pub(crate) fn private_key(seed: u8) -> PrivateKey {
	PrivateKey::new(SecretKey::from_raw(&[seed; 32]).expect("Valid key seed"))
}

pub(crate) struct TestContext {
	pub(crate) transport: UdpTransport,
	pub(crate) sender: Arc<MockSender>,
	pub(crate) handler: Arc<MockHandler>,
	pub(crate) our_address: Address,
	pub(crate) peer_key: PrivateKey,
	pub(crate) peer_address: Address,
}

pub(crate) fn make_transport(config: TransportConfig) -> TestContext {
	let our_key = private_key(9);
	let our_address = our_key.address();
	let peer_key = private_key(1);
	let peer_address = peer_key.address();

	let sender = Arc::new(MockSender::new());
	let handler = Arc::new(MockHandler::new());
	let mut entries = HashMap::new();
	entries.insert(our_address, ("127.0.0.1".to_owned(), 5000));
	entries.insert(peer_address, ("127.0.0.1".to_owned(), 5001));
	let discovery = Arc::new(MockDiscovery { entries });

	let transport = UdpTransport::new(
		config,
		our_address,
		our_key,
		sender.clone(),
		discovery,
		handler.clone(),
	);

	TestContext { transport, sender, handler, our_address, peer_key, peer_address }
}

/// Fast settings so that the retry machinery is observable within a test.
pub(crate) fn fast_config() -> TransportConfig {
	TransportConfig {
		retry_interval: Duration::from_millis(50),
		retries_before_backoff: 2,
		nat_keepalive_retries: 2,
		nat_keepalive_timeout: Duration::from_millis(30),
		nat_invitation_timeout: Duration::from_millis(30),
		cache_ttl: Duration::from_secs(60),
	}
}

/// Poll `condition` until it holds or the test times out.
pub(crate) async fn wait_until<F: Fn() -> bool>(condition: F) {
	for _ in 0..500 {
		if condition() {
			return
		}
		time::sleep(Duration::from_millis(10)).await;
	}
	panic!("Condition was not reached in time");
}
