// Builders for raw ledger events as the node reports them.

use crate::error::LedgerError;
use crate::ledger::RawChainEvent;

pub fn raw_event(height: u64, module: &str, action: &str, attrs: &[(&str, String)]) -> RawChainEvent {
    let mut attributes = vec![
        ("module".to_string(), module.to_string()),
        ("action".to_string(), action.to_string()),
    ];
    attributes.extend(attrs.iter().map(|(k, v)| (k.to_string(), v.clone())));
    RawChainEvent::new(height, "message", attributes)
}

pub fn order_created(height: u64, owner: &str, dseq: u64) -> Result<RawChainEvent, LedgerError> {
    Ok(raw_event(
        height,
        "market",
        "order-created",
        &[
            ("owner", owner.to_string()),
            ("dseq", dseq.to_string()),
            ("gseq", "1".to_string()),
            ("oseq", "1".to_string()),
        ],
    ))
}

pub fn lease_created(height: u64, owner: &str, dseq: u64, provider: &str) -> Result<RawChainEvent, LedgerError> {
    Ok(raw_event(
        height,
        "market",
        "lease-created",
        &[
            ("owner", owner.to_string()),
            ("dseq", dseq.to_string()),
            ("gseq", "1".to_string()),
            ("oseq", "1".to_string()),
            ("provider", provider.to_string()),
            ("price-denom", "uakt".to_string()),
            ("price-amount", "1.5".to_string()),
        ],
    ))
}
