use std::cmp::Ordering;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("top-k selection needs a capacity of at least one")]
pub struct ZeroCapacity;

/// Keeps the `k` best elements seen so far, ordered best first by `comparator`.
///
/// Once full, a new element only gets in if it ranks strictly better than the current worst one,
/// so among equally ranked elements the ones that arrived first stay.
pub struct BoundedTopK<T, F> {
	capacity: usize,
	items: Vec<T>,
	comparator: F,
}

impl<T, F> BoundedTopK<T, F>
where
	F: Fn(&T, &T) -> Ordering,
{
	pub fn new(capacity: usize, comparator: F) -> Result<Self, ZeroCapacity> {
		if capacity == 0 {
			return Err(ZeroCapacity);
		}

		Ok(Self {
			capacity,
			items: Vec::with_capacity(capacity.min(1024)),
			comparator,
		})
	}

	/// Returns whether `item` was kept.
	pub fn add(&mut self, item: T) -> bool {
		if self.items.len() >= self.capacity {
			let Some(worst) = self.items.last() else {
				return false;
			};
			if (self.comparator)(&item, worst) != Ordering::Less {
				return false;
			}
			self.items.pop();
		}

		// Equal elements are placed behind the ones already held.
		let position = self
			.items
			.partition_point(|held| (self.comparator)(held, &item) != Ordering::Greater);
		self.items.insert(position, item);

		true
	}

	#[must_use]
	pub const fn capacity(&self) -> usize {
		self.capacity
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.items.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	#[must_use]
	pub fn worst(&self) -> Option<&T> {
		self.items.last()
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.items.iter()
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<T> {
		self.items
	}
}

impl<T, F> Extend<T> for BoundedTopK<T, F>
where
	F: Fn(&T, &T) -> Ordering,
{
	fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
		for item in iter {
			self.add(item);
		}
	}
}

#[cfg(test)]
mod tests {
	use rand::{seq::SliceRandom, Rng};

	use super::*;

	#[test]
	fn zero_capacity_is_rejected() {
		assert!(BoundedTopK::new(0, |a: &u32, b: &u32| a.cmp(b)).is_err());
	}

	#[test]
	fn holds_true_top_k() {
		let mut rng = rand::thread_rng();

		for k in 1..=12 {
			for n in [0, 1, k, 3 * k, 100] {
				let values = (0..n).map(|_| rng.gen_range(0..50)).collect::<Vec<u32>>();

				let mut topk = BoundedTopK::new(k, |a: &u32, b: &u32| a.cmp(b)).unwrap();
				for v in &values {
					topk.add(*v);
					assert!(topk.len() <= k);
				}

				let mut expected = values.clone();
				expected.sort_unstable();
				expected.truncate(k);

				assert_eq!(topk.into_vec(), expected);
			}
		}
	}

	#[test]
	fn incumbent_wins_ties() {
		let by_distance = |a: &(u32, f32), b: &(u32, f32)| a.1.total_cmp(&b.1);
		let mut topk = BoundedTopK::new(3, by_distance).unwrap();

		topk.extend([(0, 0.1), (1, 0.5), (2, 0.3)]);
		let before = topk.iter().copied().collect::<Vec<_>>();

		assert!(!topk.add((3, 0.5)));
		assert!(!topk.add((4, 0.9)));
		assert_eq!(topk.iter().copied().collect::<Vec<_>>(), before);

		assert!(topk.add((5, 0.2)));
		assert_eq!(
			topk.into_vec().iter().map(|(id, _)| *id).collect::<Vec<_>>(),
			vec![0, 5, 2]
		);
	}

	#[test]
	fn duplicates_coexist_below_capacity() {
		let mut topk = BoundedTopK::new(4, |a: &(u32, u32), b: &(u32, u32)| a.1.cmp(&b.1)).unwrap();

		let mut items = vec![(0, 1), (1, 1), (2, 1)];
		items.shuffle(&mut rand::thread_rng());
		topk.extend(items.iter().copied());

		// Equal ranks keep arrival order.
		assert_eq!(topk.into_vec(), items);
	}
}
