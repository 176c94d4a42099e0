//! End-to-end dispatch behaviour against an in-memory chain and escalator

use async_trait::async_trait;
use ethers::types::{Address, Transaction, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tesseract_dispatcher::{
    AdmissionGate, BoxError, DispatchError, Dispatcher, EscalationOptions, NonceSource,
    SubmissionOptions,
};

const CHAIN: u64 = 31337;

/// Mempool-aware chain: accepts exactly the next nonce per account
#[derive(Default)]
struct FakeChain {
    next: Mutex<HashMap<Address, u64>>,
    queries: AtomicUsize,
}

impl FakeChain {
    fn with_nonce(account: Address, nonce: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.next.lock().unwrap().insert(account, nonce);
        Arc::new(chain)
    }

    fn submit(&self, from: Address, nonce: u64) -> Result<Transaction, BoxError> {
        let mut next = self.next.lock().unwrap();
        let expected = next.entry(from).or_insert(0);
        if nonce < *expected {
            return Err(
                format!("nonce too low: next nonce {}, tx nonce {}", expected, nonce).into(),
            );
        }
        if nonce > *expected {
            return Err("nonce gap".into());
        }
        *expected += 1;
        Ok(Transaction {
            from,
            nonce: U256::from(nonce),
            hash: H256::from_low_u64_be((nonce << 8) | u64::from(from.as_bytes()[0])),
            ..Default::default()
        })
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NonceSource for FakeChain {
    async fn pending_nonce_at(&self, chain_id: u64, account: Address) -> Result<u64, BoxError> {
        assert_eq!(chain_id, CHAIN);
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.next.lock().unwrap().get(&account).copied().unwrap_or(0))
    }
}

#[derive(Default)]
struct FakeEscalator {
    queue_full: bool,
    reject_inserts: bool,
    tracked: Mutex<Vec<(H256, Address)>>,
}

#[async_trait]
impl AdmissionGate for FakeEscalator {
    async fn can_queue(&self, _sender: Address) -> Result<bool, BoxError> {
        Ok(!self.queue_full)
    }

    async fn can_sign(&self, _sender: Address) -> bool {
        true
    }

    async fn insert_initial(
        &self,
        tx: &Transaction,
        _opts: &EscalationOptions,
        sender: Address,
    ) -> Result<(), BoxError> {
        if self.reject_inserts {
            return Err("escalator is shutting down".into());
        }
        self.tracked.lock().unwrap().push((tx.hash, sender));
        Ok(())
    }
}

fn account(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn opts(sender: Address) -> SubmissionOptions {
    SubmissionOptions::new(sender, EscalationOptions::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_get_contiguous_nonces() {
    let sender = account(0xa1);
    let chain = FakeChain::with_nonce(sender, 100);
    let escalator = Arc::new(FakeEscalator::default());
    let dispatcher = Arc::new(Dispatcher::new(escalator.clone(), chain.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let chain = chain.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(CHAIN, &opts(sender), |nonce| {
                        let result = chain.submit(sender, nonce);
                        async move { result }
                    })
                    .await
            })
        })
        .collect();

    let mut nonces: Vec<u64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().nonce.as_u64())
        .collect();
    nonces.sort_unstable();

    assert_eq!(nonces, (100..116).collect::<Vec<_>>());
    assert_eq!(chain.queries(), 1);
    assert_eq!(dispatcher.cached_nonce(sender).await, Some(116));
    assert_eq!(escalator.tracked.lock().unwrap().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatches_serialize_across_accounts() {
    let chain = Arc::new(FakeChain::default());
    let escalator = Arc::new(FakeEscalator::default());
    let dispatcher = Arc::new(Dispatcher::new(escalator, chain.clone()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (1..=8u8)
        .map(|byte| {
            let dispatcher = dispatcher.clone();
            let chain = chain.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                let sender = account(byte);
                dispatcher
                    .dispatch(CHAIN, &opts(sender), move |nonce| {
                        let chain = chain.clone();
                        let in_flight = in_flight.clone();
                        let peak = peak.clone();
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            chain.submit(sender, nonce)
                        }
                    })
                    .await
            })
        })
        .collect();

    for joined in futures::future::join_all(handles).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(chain.queries(), 8);
}

#[tokio::test]
async fn stale_cache_recovers_after_external_send() {
    let sender = account(0xb2);
    let chain = FakeChain::with_nonce(sender, 5);
    let dispatcher = Dispatcher::new(Arc::new(FakeEscalator::default()), chain.clone());
    let send = |nonce| {
        let result = chain.submit(sender, nonce);
        async move { result }
    };

    dispatcher.dispatch(CHAIN, &opts(sender), send).await.unwrap();
    assert_eq!(dispatcher.cached_nonce(sender).await, Some(6));

    // Another process sends two transactions behind our back
    chain.submit(sender, 6).unwrap();
    chain.submit(sender, 7).unwrap();

    let tx = dispatcher.dispatch(CHAIN, &opts(sender), send).await.unwrap();
    assert_eq!(tx.nonce, U256::from(8));
    assert_eq!(chain.queries(), 2);
    assert_eq!(dispatcher.cached_nonce(sender).await, Some(9));
}

#[tokio::test]
async fn queue_full_has_no_side_effects() {
    let sender = account(0xc3);
    let chain = FakeChain::with_nonce(sender, 1);
    let escalator = Arc::new(FakeEscalator {
        queue_full: true,
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(escalator.clone(), chain.clone());
    let calls = AtomicUsize::new(0);

    let err = dispatcher
        .dispatch(CHAIN, &opts(sender), |nonce| {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = chain.submit(sender, nonce);
            async move { result }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::QueueFull));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(chain.queries(), 0);

    let forced = opts(sender).with_force_queue(true);
    let tx = dispatcher
        .dispatch(CHAIN, &forced, |nonce| {
            let result = chain.submit(sender, nonce);
            async move { result }
        })
        .await
        .unwrap();
    assert_eq!(tx.nonce, U256::from(1));
    assert_eq!(escalator.tracked.lock().unwrap()[0], (tx.hash, sender));
}

#[tokio::test]
async fn rejected_registration_still_returns_transaction() {
    let sender = account(0xd4);
    let chain = FakeChain::with_nonce(sender, 0);
    let escalator = Arc::new(FakeEscalator {
        reject_inserts: true,
        ..Default::default()
    });
    let mut dispatcher = Dispatcher::new(escalator, chain.clone());
    let sunk = Arc::new(Mutex::new(Vec::new()));
    let sink = sunk.clone();
    dispatcher.attach_error_sink(move |err| sink.lock().unwrap().push(err.kind()));
    let mut events = dispatcher.subscribe();

    let tx = dispatcher
        .dispatch(CHAIN, &opts(sender), |nonce| {
            let result = chain.submit(sender, nonce);
            async move { result }
        })
        .await
        .unwrap();

    assert_eq!(tx.nonce, U256::zero());
    assert_eq!(*sunk.lock().unwrap(), vec!["registration"]);

    assert_eq!(events.recv().await.unwrap().name(), "Dispatched");
    assert_eq!(events.recv().await.unwrap().name(), "RegistrationFailed");
}

#[test]
fn sequential_nonces_on_blocking_runtime() {
    let sender = account(0xe5);
    let chain = FakeChain::with_nonce(sender, 7);
    let dispatcher = Dispatcher::new(Arc::new(FakeEscalator::default()), chain.clone());

    let nonces: Vec<u64> = (0..5)
        .map(|_| {
            tokio_test::block_on(dispatcher.dispatch(CHAIN, &opts(sender), |nonce| {
                let result = chain.submit(sender, nonce);
                async move { result }
            }))
            .unwrap()
            .nonce
            .as_u64()
        })
        .collect();

    assert_eq!(nonces, vec![7, 8, 9, 10, 11]);
    assert_eq!(chain.queries(), 1);
}
