use std::time::Duration;

use strom_network_messages::{
	decode::{
		decode,
		encode,
	},
	messages::{
		Ack,
		Message,
		Ping,
		Processed,
		SignedMessage,
	},
};
use strom_primitives::hashing::echo_hash;

use crate::{
	tests::{
		fast_config,
		make_transport,
		wait_until,
	},
	udp::NodeNetworkState,
	HandlerError,
	TransportError,
};

fn signed_processed(context: &crate::tests::TestContext, message_identifier: u64) -> Vec<u8> {
	let mut processed = Processed { message_identifier, signature: Default::default() };
	processed.sign(context.peer_key.clone()).expect("Should sign");
	encode(&Message::Processed(processed))
}

#[tokio::test]
async fn test_inbound_message_is_handled_once_and_acked() {
	let context = make_transport(fast_config());

	let data = signed_processed(&context, 1);
	context.transport.receive(data.clone()).await.expect("Should be handled");

	assert_eq!(context.handler.handled.lock().len(), 1);
	wait_until(|| context.sender.sent_acks().len() == 1).await;

	// A duplicate reception re-emits the cached ack without invoking the
	// host again.
	context.transport.receive(data.clone()).await.expect("Should be handled");
	assert_eq!(context.handler.handled.lock().len(), 1);
	wait_until(|| context.sender.sent_acks().len() == 2).await;

	let acks = context.sender.sent_acks();
	let expected_echo = echo_hash(&data, &context.our_address);
	for ack in acks {
		match decode(&ack).expect("Should decode") {
			Message::Ack(ack) => assert_eq!(ack.echo, expected_echo),
			_ => panic!("Expected an Ack"),
		}
	}
}

#[tokio::test]
async fn test_protocol_violations_are_not_acked() {
	let context = make_transport(fast_config());

	*context.handler.fail_with.lock() = Some(HandlerError::InvalidNonce);
	let data = signed_processed(&context, 1);
	context.transport.receive(data).await.expect("Violations are swallowed");

	assert!(context.handler.handled.lock().is_empty());
	assert!(context.sender.sent_acks().is_empty());

	// Unexpected host failures propagate to the caller.
	*context.handler.fail_with.lock() = Some(HandlerError::Other("boom".to_owned()));
	let data = signed_processed(&context, 2);
	let result = context.transport.receive(data).await;
	assert!(matches!(result, Err(TransportError::Other(_))));
}

#[tokio::test]
async fn test_oversize_datagrams_are_dropped() {
	let context = make_transport(fast_config());

	context
		.transport
		.receive(vec![0u8; 1300])
		.await
		.expect("Oversize datagrams are dropped");
	assert!(context.handler.handled.lock().is_empty());
}

#[tokio::test]
async fn test_control_messages_are_rejected_by_send_async() {
	let context = make_transport(fast_config());

	let ping = Message::Ping(Ping::new(1));
	assert!(matches!(
		context.transport.send_async(context.peer_address, &ping),
		Err(TransportError::Usage(_))
	));
}

#[tokio::test]
async fn test_ack_is_sent_while_queue_is_backing_off() {
	let mut config = fast_config();
	// Park the queue in a long backoff.
	config.retry_interval = Duration::from_secs(30);
	let context = make_transport(config);

	let outbound = Message::Processed(Processed {
		message_identifier: 1,
		signature: Default::default(),
	});
	let _result = context
		.transport
		.send_async(context.peer_address, &outbound)
		.expect("Should enqueue");
	wait_until(|| !context.sender.sent_app_datagrams().is_empty()).await;

	// An inbound message from the same peer must still be acknowledged
	// right away; acks never wait behind the queue head.
	let data = signed_processed(&context, 2);
	context.transport.receive(data).await.expect("Should be handled");
	wait_until(|| context.sender.sent_acks().len() == 1).await;
}

#[tokio::test]
async fn test_ping_acks_resolve_out_of_order() {
	let context = make_transport(fast_config());
	let handle = context.transport.handle();

	let ping_1 = handle.get_ping(1).expect("Should sign");
	let ping_2 = handle.get_ping(2).expect("Should sign");

	let result_1 = handle.send_raw_with_result(&ping_1, context.peer_address).await;
	let result_2 = handle.send_raw_with_result(&ping_2, context.peer_address).await;

	// The ack for the second ping arrives first.
	let ack = Message::Ack(Ack {
		sender: context.peer_address,
		echo: echo_hash(&ping_2, &context.peer_address),
	});
	context.transport.receive(encode(&ack)).await.expect("Should be processed");

	assert!(result_2.wait().await);
	assert!(!result_1.ready());
}

#[tokio::test]
async fn test_healthcheck_infers_reachability() {
	let context = make_transport(fast_config());

	let events = context.transport.get_health_events(context.peer_address);
	// The supervisor starts optimistic.
	wait_until(|| events.event_healthy.is_set()).await;

	// No ack for `nat_keepalive_retries` pings marks the peer unreachable.
	wait_until(|| events.event_unhealthy.is_set()).await;
	assert!(!events.event_healthy.is_set());
	assert_eq!(
		context.transport.network_state(context.peer_address),
		NodeNetworkState::Unreachable
	);

	// An answered invitation ping recovers the peer.
	let last_ping = context.sender.sent_pings().pop().expect("Pings were sent");
	let ack = Message::Ack(Ack {
		sender: context.peer_address,
		echo: echo_hash(&last_ping, &context.peer_address),
	});
	context.transport.receive(encode(&ack)).await.expect("Should be processed");

	wait_until(|| events.event_healthy.is_set()).await;
	assert!(!events.event_unhealthy.is_set());
	assert_eq!(
		context.transport.network_state(context.peer_address),
		NodeNetworkState::Reachable
	);
}
