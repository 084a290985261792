#![warn(clippy::missing_docs_in_private_items)]

use crate::types::{
	MediationPairState,
	RouteState,
};

/// Makes sure we filter routes that have already been used.
///
/// So in a setup like this, we want to make sure that node 2, having tried to
/// route the transfer through 3 will also try 5 before sending it backwards
/// to 1
///
/// 1 -> 2 -> 3 -> 4
///      v         ^
///      5 -> 6 -> 7
pub fn filter_used_routes(
	transfers_pair: &[MediationPairState],
	routes: Vec<RouteState>,
) -> Vec<RouteState> {
	routes
		.into_iter()
		.filter(|route| {
			!transfers_pair.iter().any(|pair| {
				pair.payer_transfer.balance_proof.channel_identifier == route.channel_identifier ||
					pair.payee_transfer.balance_proof.channel_identifier ==
						route.channel_identifier
			})
		})
		.collect()
}
