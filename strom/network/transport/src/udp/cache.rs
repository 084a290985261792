#![warn(clippy::missing_docs_in_private_items)]

use std::{
	hash::Hash,
	num::NonZeroUsize,
	time::Duration as StdDuration,
};

use chrono::{
	offset::Local,
	DateTime,
	Duration,
};
use lru::LruCache;

/// A bounded LRU map whose entries expire after a fixed time-to-live.
pub(crate) struct TtlCache<K: Hash + Eq, V> {
	cache: LruCache<K, (DateTime<Local>, V)>,
	ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
	pub(crate) fn new(maxsize: usize, ttl: StdDuration) -> Self {
		Self {
			cache: LruCache::new(NonZeroUsize::new(maxsize).expect("Cache size must not be zero")),
			ttl: Duration::from_std(ttl).expect("TTL should fit"),
		}
	}

	pub(crate) fn get(&mut self, key: &K) -> Option<V> {
		let expired = match self.cache.peek(key) {
			Some((inserted_at, _)) => *inserted_at + self.ttl <= Local::now(),
			None => return None,
		};
		if expired {
			self.cache.pop(key);
			return None
		}
		self.cache.get(key).map(|(_, value)| value.clone())
	}

	pub(crate) fn insert(&mut self, key: K, value: V) {
		self.cache.put(key, (Local::now(), value));
	}
}
