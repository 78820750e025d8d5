//! [`Ledger`] over a CometBFT RPC node and the chain's REST API.
//!
//! Events are obtained by polling `/block_results` block by block, which survives
//! node restarts without websocket session state.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use hyper::Uri;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{EventStream, Ledger, Provider, RawChainEvent, TxReceipt};
use crate::error::LedgerError;
use crate::http::{make_get_request, HyperClient, RequestError, Response};
use crate::model::Address;

const COMPONENT: &str = "ledger";
const PROVIDER_PATH: &str = "akash/provider/v1beta3/providers/";

#[derive(Clone)]
pub struct RpcLedger {
    client: HyperClient,
    rpc: Url,
    api: Url,
    poll_interval: Duration,
    timeout: Duration,
}

impl RpcLedger {
    pub fn new(
        client: HyperClient,
        rpc_addr: &str,
        api_addr: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            client,
            rpc: base_url(rpc_addr)?,
            api: base_url(api_addr)?,
            poll_interval,
            timeout,
        })
    }

    async fn get(&self, url: Url) -> Result<Response, LedgerError> {
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| LedgerError::Decode(format!("uri {url}: {e}")))?;
        make_get_request(&self.client, uri, self.timeout)
            .await
            .map_err(transport)
    }

    async fn rpc_call<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, LedgerError> {
        let resp = self.get(url).await?;
        if !resp.is_success() {
            return Err(LedgerError::Status {
                status: resp.status,
                body: resp.text(),
            });
        }
        let envelope: RpcEnvelope<T> = serde_json::from_slice(&resp.body)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        if let Some(err) = envelope.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: match err.data {
                    Some(data) if !data.is_empty() => format!("{}: {}", err.message, data),
                    _ => err.message,
                },
            });
        }
        envelope
            .result
            .ok_or_else(|| LedgerError::Decode("rpc response without result".into()))
    }

    async fn block_events(&self, height: u64, txs_only: bool) -> Result<Vec<RawChainEvent>, LedgerError> {
        let mut url = join(&self.rpc, "block_results")?;
        url.query_pairs_mut().append_pair("height", &height.to_string());
        let res: BlockResults = self.rpc_call(url).await?;

        let mut out = Vec::new();
        let mut push = |events: Vec<AbciEvent>| {
            for ev in events {
                out.push(ev.into_raw(height));
            }
        };
        for tx in res.txs_results.unwrap_or_default() {
            // failed txs still carry events but nothing they describe happened
            if tx.code == 0 {
                push(tx.events);
            }
        }
        if !txs_only {
            push(res.begin_block_events.unwrap_or_default());
            push(res.end_block_events.unwrap_or_default());
            push(res.finalize_block_events.unwrap_or_default());
        }
        Ok(out)
    }
}

/// Polling cursor behind [`RpcLedger::subscribe`].
struct Cursor {
    ledger: RpcLedger,
    next_height: u64,
    txs_only: bool,
    pending: VecDeque<RawChainEvent>,
    done: bool,
}

impl Cursor {
    async fn next(&mut self) -> Option<Result<RawChainEvent, LedgerError>> {
        loop {
            if self.done {
                return None;
            }
            if let Some(ev) = self.pending.pop_front() {
                return Some(Ok(ev));
            }
            let latest = match self.ledger.latest_height().await {
                Ok(h) => h,
                Err(e) => return Some(self.fail(e)),
            };
            if self.next_height == 0 {
                self.next_height = latest;
            }
            if self.next_height > latest {
                tokio::time::sleep(self.ledger.poll_interval).await;
                continue;
            }
            match self.ledger.block_events(self.next_height, self.txs_only).await {
                Ok(events) => {
                    debug!(
                        component = COMPONENT,
                        event = "block",
                        height = self.next_height,
                        events = events.len(),
                        "block results fetched"
                    );
                    self.pending.extend(events);
                    self.next_height += 1;
                }
                Err(e) => return Some(self.fail(e)),
            }
        }
    }

    fn fail(&mut self, e: LedgerError) -> Result<RawChainEvent, LedgerError> {
        self.done = true;
        Err(e)
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn subscribe(&self, topic: &str, from_height: u64) -> Result<EventStream, LedgerError> {
        // fail fast when the node is unreachable
        let latest = self.latest_height().await?;
        debug!(
            component = COMPONENT,
            event = "subscribe",
            topic,
            from_height,
            latest,
            "subscribing to block events"
        );
        let cursor = Cursor {
            ledger: self.clone(),
            next_height: from_height,
            txs_only: topic.contains("'Tx'"),
            pending: VecDeque::new(),
            done: false,
        };
        let stream = futures::stream::unfold(cursor, |mut cursor| async move {
            let item = cursor.next().await?;
            Some((item, cursor))
        });
        Ok(stream.boxed())
    }

    async fn provider(&self, address: &Address) -> Result<Provider, LedgerError> {
        let url = join(&self.api, &format!("{PROVIDER_PATH}{address}"))?;
        let resp = self.get(url).await?;
        if resp.status == 404 {
            return Err(LedgerError::ProviderNotFound(address.to_string()));
        }
        if !resp.is_success() {
            return Err(LedgerError::Status {
                status: resp.status,
                body: resp.text(),
            });
        }
        let body: ProviderResponse =
            serde_json::from_slice(&resp.body).map_err(|e| LedgerError::Decode(e.to_string()))?;
        if body.provider.host_uri.is_empty() {
            return Err(LedgerError::Decode(format!(
                "provider {address} has no host uri"
            )));
        }
        Ok(Provider {
            owner: Address::new(body.provider.owner),
            host_uri: body.provider.host_uri,
        })
    }

    async fn latest_height(&self) -> Result<u64, LedgerError> {
        let status: StatusResult = self.rpc_call(join(&self.rpc, "status")?).await?;
        parse_u64(&status.sync_info.latest_block_height)
    }

    async fn broadcast(&self, signed_tx: &[u8]) -> Result<TxReceipt, LedgerError> {
        let mut url = join(&self.rpc, "broadcast_tx_sync")?;
        url.query_pairs_mut()
            .append_pair("tx", &format!("0x{}", hex::encode_upper(signed_tx)));
        let res: BroadcastResult = self.rpc_call(url).await?;
        if res.code != 0 {
            return Err(LedgerError::TxRejected {
                code: res.code,
                log: res.log,
            });
        }
        Ok(TxReceipt {
            hash: res.hash,
            code: res.code,
            log: res.log,
        })
    }
}

fn transport(e: RequestError) -> LedgerError {
    LedgerError::Transport(e.to_string())
}

fn base_url(addr: &str) -> Result<Url, LedgerError> {
    let mut url = Url::parse(addr).map_err(|e| LedgerError::Decode(format!("address {addr}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url, LedgerError> {
    base.join(path)
        .map_err(|e| LedgerError::Decode(format!("join {base} {path}: {e}")))
}

fn parse_u64(s: &str) -> Result<u64, LedgerError> {
    s.parse()
        .map_err(|_| LedgerError::Decode(format!("invalid height {s:?}")))
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct BlockResults {
    #[serde(default)]
    txs_results: Option<Vec<TxResult>>,
    #[serde(default)]
    begin_block_events: Option<Vec<AbciEvent>>,
    #[serde(default)]
    end_block_events: Option<Vec<AbciEvent>>,
    #[serde(default)]
    finalize_block_events: Option<Vec<AbciEvent>>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    events: Vec<AbciEvent>,
}

#[derive(Deserialize)]
struct AbciEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Vec<AbciAttribute>,
}

#[derive(Deserialize)]
struct AbciAttribute {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

impl AbciEvent {
    fn into_raw(self, height: u64) -> RawChainEvent {
        RawChainEvent {
            height,
            kind: self.kind,
            attributes: self
                .attributes
                .into_iter()
                .map(|a| (a.key, a.value.unwrap_or_default()))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct BroadcastResult {
    code: u32,
    #[serde(default)]
    log: String,
    hash: String,
}

#[derive(Deserialize)]
struct ProviderResponse {
    provider: ProviderBody,
}

#[derive(Deserialize)]
struct ProviderBody {
    owner: String,
    #[serde(default)]
    host_uri: String,
}
