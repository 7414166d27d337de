use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// An unbounded queue that can be closed with an error.
///
/// Items pushed before the close are still drained; once empty, `pop`
/// returns the close cause.
pub struct Queue<T, E: Clone> {
	state: Arc<Mutex<State<T, E>>>,
	notify: Arc<Notify>,
}

impl<T, E: Clone> Clone for Queue<T, E> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			notify: self.notify.clone(),
		}
	}
}

impl<T, E: Clone> Default for Queue<T, E> {
	fn default() -> Self {
		Self {
			state: Default::default(),
			notify: Default::default(),
		}
	}
}

struct State<T, E: Clone> {
	queue: VecDeque<T>,
	closed: Result<(), E>,
}

impl<T, E: Clone> Default for State<T, E> {
	fn default() -> Self {
		Self {
			queue: Default::default(),
			closed: Ok(()),
		}
	}
}

impl<T, E: Clone> Queue<T, E> {
	pub fn push(&self, item: T) -> Result<(), E> {
		{
			let mut state = self.state.lock().unwrap();
			state.closed.clone()?;
			state.queue.push_back(item);
		}

		self.notify.notify_waiters();
		Ok(())
	}

	pub async fn pop(&self) -> Result<T, E> {
		loop {
			// Register for a wakeup before checking, so a concurrent push is not lost.
			let notified = self.notify.notified();

			{
				let mut state = self.state.lock().unwrap();
				if let Some(item) = state.queue.pop_front() {
					return Ok(item);
				}
				state.closed.clone()?;
			}

			notified.await;
		}
	}

	pub fn close(&self, err: E) -> Result<(), E> {
		{
			let mut state = self.state.lock().unwrap();
			state.closed.clone()?;
			state.closed = Err(err);
		}

		self.notify.notify_waiters();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use futures::FutureExt;

	use super::*;

	#[tokio::test]
	async fn order() {
		let queue: Queue<u32, u32> = Default::default();

		queue.push(1).unwrap();
		queue.push(2).unwrap();

		assert_eq!(queue.pop().await, Ok(1));
		assert_eq!(queue.pop().await, Ok(2));
		assert!(queue.pop().now_or_never().is_none());
	}

	#[tokio::test]
	async fn close_drains() {
		let queue: Queue<u32, u32> = Default::default();

		queue.push(1).unwrap();
		queue.close(42).unwrap();

		// Items pushed before the close are still delivered.
		assert_eq!(queue.pop().await, Ok(1));
		assert_eq!(queue.pop().await, Err(42));

		assert_eq!(queue.push(2), Err(42));
		assert_eq!(queue.close(43), Err(42));
	}

	#[tokio::test]
	async fn wakes_waiter() {
		let queue: Queue<u32, u32> = Default::default();

		let waiter = tokio::spawn({
			let queue = queue.clone();
			async move { queue.pop().await }
		});

		tokio::task::yield_now().await;
		queue.push(7).unwrap();

		assert_eq!(waiter.await.unwrap(), Ok(7));
	}
}
