use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "dedlog";

pub const FLUSH_PERIOD: Duration = Duration::from_secs(5);

/// One aggregated warning.
struct LogEntry {
    source: &'static str,
    reason: String,
    last_detail: String,
    count: usize,
}

static WARN_CH: once_cell::sync::Lazy<Mutex<Option<mpsc::Sender<LogEntry>>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(None));

fn sender() -> Option<mpsc::Sender<LogEntry>> {
    WARN_CH.try_lock().ok().and_then(|guard| guard.clone())
}

fn set_sender(tx: Option<mpsc::Sender<LogEntry>>) {
    if let Ok(mut guard) = WARN_CH.lock() {
        *guard = tx;
    }
}

/// Records a warning. Repeats of the same `(source, reason)` are folded into one line per
/// flush period. Logs immediately when no dedup logger is running.
pub fn warn(source: &'static str, reason: &str, detail: &str) {
    let entry = LogEntry {
        source,
        reason: reason.to_string(),
        last_detail: detail.to_string(),
        count: 1,
    };
    match sender() {
        Some(tx) => {
            if let Err(mpsc::error::TrySendError::Full(entry)) = tx.try_send(entry) {
                emit(&entry);
            }
        }
        None => emit(&entry),
    }
}

fn emit(entry: &LogEntry) {
    tracing::warn!(
        component = COMPONENT,
        source = entry.source,
        count = entry.count,
        detail = %entry.last_detail,
        "{}", entry.reason
    );
}

fn flush(entries: &DashMap<(&'static str, String), LogEntry>) {
    for entry in entries.iter() {
        emit(entry.value());
    }
    entries.clear();
}

/// Runs the aggregator until `ctx` is cancelled, flushing every `period`.
pub async fn start_dedup_logger(ctx: CancellationToken, period: Duration) {
    let (tx, mut rx) = mpsc::channel::<LogEntry>(1024);
    set_sender(Some(tx));

    let pending: DashMap<(&'static str, String), LogEntry> = DashMap::new();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            entry = rx.recv() => {
                let Some(entry) = entry else { break };
                let key = (entry.source, entry.reason.clone());
                if let Some(mut existing) = pending.get_mut(&key) {
                    existing.count += 1;
                    existing.last_detail = entry.last_detail;
                } else {
                    pending.insert(key, entry);
                }
            }
            _ = interval.tick() => flush(&pending),
        }
    }

    set_sender(None);
    while let Ok(entry) = rx.try_recv() {
        emit(&entry);
    }
    flush(&pending);
}
