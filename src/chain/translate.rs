//! Raw ledger events to [`Event`]s.

use crate::ledger::RawChainEvent;
use crate::model::{
    Address, BidId, DeploymentId, Event, GroupId, LeaseId, OrderId, Price,
};

pub const MESSAGE_EVENT: &str = "message";
pub const MODULE_DEPLOYMENT: &str = "deployment";
pub const MODULE_MARKET: &str = "market";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("{action}: missing attribute {key}")]
    Missing { action: String, key: &'static str },
    #[error("{action}: attribute {key}={value:?} is not a number")]
    NotANumber {
        action: String,
        key: &'static str,
        value: String,
    },
}

/// Typed event for `raw`, `Ok(None)` when it is not a deployment or market event.
pub fn translate(raw: &RawChainEvent) -> Result<Option<Event>, TranslateError> {
    if raw.kind != MESSAGE_EVENT {
        return Ok(None);
    }
    match raw.attr("module") {
        Some(MODULE_DEPLOYMENT) | Some(MODULE_MARKET) => {}
        _ => return Ok(None),
    }
    let Some(action) = raw.attr("action") else {
        return Ok(None);
    };
    let attrs = Attrs { raw, action };

    let event = match action {
        "deployment-created" => Event::DeploymentCreated {
            id: attrs.deployment()?,
        },
        "deployment-updated" => Event::DeploymentUpdated {
            id: attrs.deployment()?,
        },
        "deployment-closed" => Event::DeploymentClosed {
            id: attrs.deployment()?,
        },
        "group-closed" => Event::GroupClosed { id: attrs.group()? },
        "order-created" => Event::OrderCreated { id: attrs.order()? },
        "order-closed" => Event::OrderClosed { id: attrs.order()? },
        "bid-created" => Event::BidCreated {
            id: attrs.bid()?,
            price: attrs.price()?,
        },
        "bid-closed" => Event::BidClosed {
            id: attrs.bid()?,
            price: attrs.price()?,
        },
        "lease-created" => Event::LeaseCreated {
            id: attrs.lease()?,
            price: attrs.price()?,
        },
        "lease-closed" => Event::LeaseClosed {
            id: attrs.lease()?,
            price: attrs.price()?,
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

struct Attrs<'a> {
    raw: &'a RawChainEvent,
    action: &'a str,
}

impl Attrs<'_> {
    fn get(&self, key: &'static str) -> Result<&str, TranslateError> {
        self.raw
            .attr(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TranslateError::Missing {
                action: self.action.to_string(),
                key,
            })
    }

    fn number<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, TranslateError> {
        let value = self.get(key)?;
        value.parse().map_err(|_| TranslateError::NotANumber {
            action: self.action.to_string(),
            key,
            value: value.to_string(),
        })
    }

    fn deployment(&self) -> Result<DeploymentId, TranslateError> {
        Ok(DeploymentId::new(
            Address::new(self.get("owner")?),
            self.number("dseq")?,
        ))
    }

    fn group(&self) -> Result<GroupId, TranslateError> {
        Ok(GroupId {
            deployment: self.deployment()?,
            gseq: self.number("gseq")?,
        })
    }

    fn order(&self) -> Result<OrderId, TranslateError> {
        Ok(OrderId::new(
            self.deployment()?,
            self.number("gseq")?,
            self.number("oseq")?,
        ))
    }

    fn provider(&self) -> Result<Address, TranslateError> {
        self.get("provider").map(Address::new)
    }

    fn bid(&self) -> Result<BidId, TranslateError> {
        Ok(BidId {
            order: self.order()?,
            provider: self.provider()?,
        })
    }

    fn lease(&self) -> Result<LeaseId, TranslateError> {
        Ok(LeaseId::new(self.order()?, self.provider()?))
    }

    fn price(&self) -> Result<Price, TranslateError> {
        Ok(Price::new(self.get("price-amount")?, self.get("price-denom")?))
    }
}
