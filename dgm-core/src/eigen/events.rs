use std::sync::Arc;

use ethers::{
    contract::{parse_log, EthLogDecode, LogMeta},
    providers::{Middleware, Provider, Ws},
    types::{Address, BlockNumber, Filter, FilterBlockOption, Log, TransactionReceipt},
};
use futures::{stream, Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::error::DgmError;

/// Block span requested per `eth_getLogs` call when walking history.
pub const PAGE_SIZE: u64 = 50_000;

/// Capacity of the channel between a subscription task and its consumer.
pub const WATCHER_CAPACITY: usize = 256;

/// A decoded log together with where it was emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WatchedEvent<E> {
    pub event: E,
    pub meta: LogMeta,
    /// Set when the node retracts a previously delivered log after a reorg.
    pub removed: bool,
}

pub fn decode_log<E: EthLogDecode>(log: Log) -> Result<WatchedEvent<E>, DgmError> {
    let mined = log.block_hash.is_some() &&
        log.block_number.is_some() &&
        log.transaction_hash.is_some() &&
        log.transaction_index.is_some() &&
        log.log_index.is_some();
    if !mined {
        return Err(DgmError::Decode("log is still pending".into()));
    }
    let meta = LogMeta::from(&log);
    let removed = log.removed.unwrap_or(false);
    let event = parse_log::<E>(log)?;
    Ok(WatchedEvent { event, meta, removed })
}

/// Decodes the logs `contract` emitted in a mined transaction, skipping logs of other events.
pub fn events_in_receipt<E: EthLogDecode>(
    receipt: &TransactionReceipt,
    contract: Address,
) -> Vec<E> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .filter_map(|log| parse_log::<E>(log.clone()).ok())
        .collect()
}

/// Streams every log matching `filter`, fetched in block pages of `page_size` and decoded as
/// `E`. Pages cover the filter's `from_block` (genesis when unset) up to its `to_block`, or
/// the chain head read once when that is unset or `latest`. Filters pinned to a block hash or
/// to other block tags yield a single `LogQuery` error.
pub fn event_history<'a, M, E>(
    client: &'a M,
    filter: &Filter,
    page_size: u64,
) -> impl Stream<Item = Result<WatchedEvent<E>, DgmError>> + 'a
where
    M: Middleware,
    E: EthLogDecode + 'a,
{
    let filter = filter.clone();
    let range = block_range(&filter);

    stream::once(async move {
        let (from_block, to_block) = range?;
        let to_block = match to_block {
            Some(to_block) => to_block,
            None => client
                .get_block_number()
                .await
                .map_err(|e| DgmError::LogQuery(e.to_string()))?
                .as_u64(),
        };
        Ok::<_, DgmError>((from_block, to_block))
    })
    .map_ok(move |(from_block, to_block)| {
        stream::iter(pages(from_block, to_block, page_size)).map(Ok::<_, DgmError>)
    })
    .try_flatten()
    .and_then(move |(start, end)| {
        let page = filter.clone().from_block(start).to_block(end);
        async move {
            debug!("fetching logs for blocks {start}..={end}");
            client.get_logs(&page).await.map_err(|e| DgmError::LogQuery(e.to_string()))
        }
    })
    .map_ok(|logs| stream::iter(logs.into_iter().map(decode_log::<E>)))
    .try_flatten()
}

/// The numeric `(from, to)` bounds of `filter`, `to` being `None` when it runs to the head.
fn block_range(filter: &Filter) -> Result<(u64, Option<u64>), DgmError> {
    let FilterBlockOption::Range { from_block, to_block } = &filter.block_option else {
        return Err(DgmError::LogQuery("cannot page a filter pinned to a block hash".into()));
    };
    let from_block = match from_block {
        None | Some(BlockNumber::Earliest) => 0,
        Some(BlockNumber::Number(n)) => n.as_u64(),
        Some(tag) => return Err(DgmError::LogQuery(format!("cannot page from block {tag:?}"))),
    };
    let to_block = match to_block {
        None | Some(BlockNumber::Latest) => None,
        Some(BlockNumber::Number(n)) => Some(n.as_u64()),
        Some(tag) => return Err(DgmError::LogQuery(format!("cannot page up to block {tag:?}"))),
    };
    Ok((from_block, to_block))
}

/// Inclusive block ranges of at most `size` blocks covering `from..=to`.
fn pages(from: u64, to: u64, size: u64) -> impl Iterator<Item = (u64, u64)> {
    let size = size.max(1);
    let count = if from > to { 0 } else { (to - from) / size + 1 };
    (0..count).map(move |i| {
        let start = from + i * size;
        (start, start.saturating_add(size - 1).min(to))
    })
}

/// Collects `event_history` into a vector, failing on the first bad page or log.
pub async fn query_events<M, E>(
    client: &M,
    filter: &Filter,
) -> Result<Vec<WatchedEvent<E>>, DgmError>
where
    M: Middleware,
    E: EthLogDecode,
{
    let events: Vec<WatchedEvent<E>> =
        event_history(client, filter, PAGE_SIZE).try_collect().await?;
    debug!("fetched {} events", events.len());
    Ok(events)
}

/// A live log subscription running on its own task. Decoded events queue up in a bounded
/// channel until the consumer pulls them with `next`.
pub struct EventWatcher<E> {
    rx: mpsc::Receiver<Result<WatchedEvent<E>, DgmError>>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), DgmError>>,
}

impl<E> EventWatcher<E>
where
    E: EthLogDecode + Send + 'static,
{
    pub fn spawn(provider: Arc<Provider<Ws>>, filter: Filter) -> Self {
        Self::with_capacity(provider, filter, WATCHER_CAPACITY)
    }

    pub fn with_capacity(provider: Arc<Provider<Ws>>, filter: Filter, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(watch_logs(provider, filter, tx, stop_rx));
        Self { rx, stop: Some(stop_tx), task }
    }

    /// The next event, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Result<WatchedEvent<E>, DgmError>> {
        self.rx.recv().await
    }

    /// Cancels the subscription on the node and waits for the task to exit.
    pub async fn unsubscribe(mut self) -> Result<(), DgmError> {
        if let Some(stop) = self.stop.take() {
            _ = stop.send(());
        }
        self.rx.close();
        match self.task.await {
            Ok(res) => res,
            Err(e) => Err(DgmError::Watcher(e.to_string())),
        }
    }
}

async fn watch_logs<E: EthLogDecode>(
    provider: Arc<Provider<Ws>>,
    filter: Filter,
    tx: mpsc::Sender<Result<WatchedEvent<E>, DgmError>>,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), DgmError> {
    let mut stream = provider.subscribe_logs(&filter).await?;
    let id = stream.id;
    info!("subscribed to logs, subscription id {id}");

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tx.closed() => break,
            log = stream.next() => {
                let Some(log) = log else {
                    warn!("log subscription {id} closed by the transport");
                    let closed = DgmError::Watcher("subscription closed by transport".into());
                    _ = tx.send(Err(closed)).await;
                    return Ok(());
                };
                if tx.send(decode_log(log)).await.is_err() {
                    break;
                }
            }
        }
    }

    stream.unsubscribe().await?;
    debug!("unsubscribed from {id}");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::eigen::{
        contracts::{
            DelegationManagerAbiEvents, SlashingWithdrawalQueuedFilter, StakerDelegatedFilter,
            HOLESKY_DELEGATION_MANAGER,
        },
        withdrawal::{
            tests::{fixed_root, fixed_withdrawal},
            QueuedWithdrawal,
        },
    };
    use ethers::{
        abi::{encode, Token, Tokenizable},
        contract::EthEvent,
        providers::Provider,
        types::{H256, U256, U64},
    };

    pub(crate) fn mined_log(topics: Vec<H256>, data: Vec<u8>) -> Log {
        Log {
            address: HOLESKY_DELEGATION_MANAGER,
            topics,
            data: data.into(),
            block_hash: Some(H256::repeat_byte(0xbb)),
            block_number: Some(U64::from(1_000_000)),
            transaction_hash: Some(H256::repeat_byte(0xcc)),
            transaction_index: Some(U64::from(3)),
            log_index: Some(U256::from(9)),
            removed: Some(false),
            ..Default::default()
        }
    }

    pub(crate) fn staker_delegated_log(staker: Address, operator: Address) -> Log {
        mined_log(
            vec![StakerDelegatedFilter::signature(), H256::from(staker), H256::from(operator)],
            vec![],
        )
    }

    pub(crate) fn withdrawal_queued_log() -> Log {
        let withdrawal = fixed_withdrawal();
        let shares = withdrawal.scaled_shares.iter().map(|s| Token::Uint(*s)).collect();
        let data = encode(&[
            Token::FixedBytes(fixed_root().as_bytes().to_vec()),
            withdrawal.into_token(),
            Token::Array(shares),
        ]);
        mined_log(vec![SlashingWithdrawalQueuedFilter::signature()], data)
    }

    #[test]
    fn test_decode_indexed_only_event() {
        let staker = Address::repeat_byte(0x11);
        let operator = Address::repeat_byte(0x22);
        let decoded: WatchedEvent<StakerDelegatedFilter> =
            decode_log(staker_delegated_log(staker, operator)).unwrap();
        assert_eq!(decoded.event, StakerDelegatedFilter { staker, operator });
        assert_eq!(decoded.meta.block_number, U64::from(1_000_000));
        assert_eq!(decoded.meta.transaction_hash, H256::repeat_byte(0xcc));
        assert!(!decoded.removed);
    }

    #[test]
    fn test_decode_tuple_event_through_enum() {
        let decoded: WatchedEvent<DelegationManagerAbiEvents> =
            decode_log(withdrawal_queued_log()).unwrap();
        let DelegationManagerAbiEvents::SlashingWithdrawalQueuedFilter(event) = decoded.event else {
            panic!("decoded to the wrong event");
        };
        assert_eq!(event.withdrawal, fixed_withdrawal());
        assert_eq!(QueuedWithdrawal::from_event(event).unwrap().root, fixed_root());
    }

    #[test]
    fn test_foreign_log_fails() {
        let log = mined_log(vec![H256::repeat_byte(0x01)], vec![]);
        assert!(decode_log::<DelegationManagerAbiEvents>(log.clone()).is_err());
        assert!(decode_log::<StakerDelegatedFilter>(withdrawal_queued_log()).is_err());
    }

    #[test]
    fn test_pending_log_is_rejected() {
        let mut log = staker_delegated_log(Address::zero(), Address::zero());
        log.block_number = None;
        assert!(matches!(
            decode_log::<StakerDelegatedFilter>(log),
            Err(DgmError::Decode(_))
        ));
    }

    #[test]
    fn test_events_in_receipt() {
        let mut foreign = withdrawal_queued_log();
        foreign.address = Address::repeat_byte(0x99);
        let receipt = TransactionReceipt {
            logs: vec![
                staker_delegated_log(Address::repeat_byte(0x11), Address::repeat_byte(0x22)),
                withdrawal_queued_log(),
                foreign,
            ],
            ..Default::default()
        };
        let queued: Vec<SlashingWithdrawalQueuedFilter> =
            events_in_receipt(&receipt, HOLESKY_DELEGATION_MANAGER);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].withdrawal_root, fixed_root().0);
    }

    #[test]
    fn test_pages_cover_range() {
        assert_eq!(pages(0, 9, 5).collect::<Vec<_>>(), vec![(0, 4), (5, 9)]);
        assert_eq!(pages(100, 110, 50_000).collect::<Vec<_>>(), vec![(100, 110)]);
        assert_eq!(pages(3, 3, 0).collect::<Vec<_>>(), vec![(3, 3)]);
        assert_eq!(pages(10, 9, 5).count(), 0);
    }

    #[tokio::test]
    async fn test_history_stops_at_to_block() {
        let (provider, mock) = Provider::mocked();
        let staker = Address::repeat_byte(0x11);
        let log = staker_delegated_log(staker, Address::repeat_byte(0x22));
        mock.push::<Vec<Log>, _>(vec![log]).unwrap();

        let filter = Filter::new().address(HOLESKY_DELEGATION_MANAGER).from_block(100);
        let events: Vec<WatchedEvent<StakerDelegatedFilter>> =
            query_events(&provider, &filter.clone().to_block(110)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.staker, staker);

        mock.assert_request("eth_getLogs", [filter.from_block(100).to_block(110)]).unwrap();
        assert!(mock.assert_request("eth_getLogs", ()).is_err());
    }

    #[tokio::test]
    async fn test_open_history_pages_up_to_head() {
        let (provider, mock) = Provider::mocked();
        // Mock responses are served last-in first-out.
        mock.push::<Vec<Log>, _>(Vec::new()).unwrap();
        mock.push::<Vec<Log>, _>(vec![withdrawal_queued_log()]).unwrap();
        mock.push::<U64, _>(U64::from(7)).unwrap();

        let filter = Filter::new().address(HOLESKY_DELEGATION_MANAGER).from_block(0);
        let events: Vec<_> = event_history::<_, DelegationManagerAbiEvents>(&provider, &filter, 5)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        mock.assert_request("eth_blockNumber", ()).unwrap();
        mock.assert_request("eth_getLogs", [filter.clone().from_block(0).to_block(4)]).unwrap();
        mock.assert_request("eth_getLogs", [filter.from_block(5).to_block(7)]).unwrap();
    }

    #[tokio::test]
    async fn test_history_rejects_non_numeric_ranges() {
        let (provider, mock) = Provider::mocked();
        let pinned = Filter::new().at_block_hash(H256::repeat_byte(0xbb));
        let from_latest = Filter::new().from_block(BlockNumber::Latest);
        let to_pending = Filter::new().from_block(1).to_block(BlockNumber::Pending);
        for filter in [pinned, from_latest, to_pending] {
            let result = query_events::<_, StakerDelegatedFilter>(&provider, &filter).await;
            assert!(matches!(result, Err(DgmError::LogQuery(_))), "{filter:?}");
        }
        assert!(mock.assert_request("eth_getLogs", ()).is_err());
    }

    #[test]
    fn test_latest_to_block_runs_to_head() {
        let filter = Filter::new().from_block(5).to_block(BlockNumber::Latest);
        assert_eq!(block_range(&filter).unwrap(), (5, None));
        assert_eq!(block_range(&Filter::new()).unwrap(), (0, None));
    }

    #[tokio::test]
    async fn test_history_surfaces_bad_log() {
        let (provider, mock) = Provider::mocked();
        let foreign = mined_log(vec![H256::repeat_byte(0x01)], vec![]);
        mock.push::<Vec<Log>, _>(vec![foreign]).unwrap();
        let filter = Filter::new().from_block(1).to_block(2);
        let result = query_events::<_, StakerDelegatedFilter>(&provider, &filter).await;
        assert!(result.is_err());
    }
}
