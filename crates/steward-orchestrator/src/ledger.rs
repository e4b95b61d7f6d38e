use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use steward_core::ExecutionRecord;
use uuid::Uuid;

/// Default number of executions kept for feedback lookups.
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

struct LedgerInner {
    records: HashMap<Uuid, ExecutionRecord>,
    order: VecDeque<Uuid>,
}

/// Bounded map of recent executions, oldest evicted first.
///
/// Feedback arrives after the request has finished; the ledger is how the
/// feedback path finds which agent produced a given execution.
pub struct ExecutionLedger {
    capacity: usize,
    inner: Mutex<LedgerInner>,
}

impl ExecutionLedger {
    /// Ledger keeping the newest `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LedgerInner {
                records: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Store `record`, evicting the oldest when full.
    pub fn record(&self, record: ExecutionRecord) {
        let mut inner = self.inner.lock();
        if inner.records.insert(record.execution_id, record.clone()).is_none() {
            inner.order.push_back(record.execution_id);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.records.remove(&oldest);
            }
        }
    }

    /// Record for `execution_id`, if still held.
    pub fn get(&self, execution_id: &Uuid) -> Option<ExecutionRecord> {
        self.inner.lock().records.get(execution_id).cloned()
    }

    /// Number of held records.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExecutionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}
