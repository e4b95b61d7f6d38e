use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Assistant message ids mapped to the execution that produced them.
///
/// Lets clients send feedback with only the `message_id` they were shown.
/// Bounded; the oldest messages are forgotten first.
pub struct MessageIndex {
    capacity: usize,
    inner: Mutex<(HashMap<String, Uuid>, VecDeque<String>)>,
}

impl MessageIndex {
    /// Index holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }

    /// Remember which execution produced `message_id`.
    pub fn record(&self, message_id: impl Into<String>, execution_id: Uuid) {
        let message_id = message_id.into();
        let mut guard = self.inner.lock();
        let (map, order) = &mut *guard;
        if map.insert(message_id.clone(), execution_id).is_none() {
            order.push_back(message_id);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                map.remove(&oldest);
            }
        }
    }

    /// Execution that produced `message_id`, if still indexed.
    pub fn execution_for(&self, message_id: &str) -> Option<Uuid> {
        self.inner.lock().0.get(message_id).copied()
    }
}
