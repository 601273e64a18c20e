use crate::{retry, BreakerConfig, Bulkhead, CircuitBreaker, Error, Result, RetryPolicy};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

const MIN_MESSAGE_BYTES: usize = 4 << 20;
const MAX_MESSAGE_BYTES: usize = 20 << 20;

/// Per-peer channel and resilience configuration.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub name: String,
    /// One or more `http(s)://host:port` backend addresses.
    pub addresses: Vec<String>,
    pub tls: bool,
    pub connect_timeout: Duration,
    /// Heartbeat after this much idleness.
    pub keep_alive_interval: Duration,
    /// Tear the connection down if a heartbeat isn't acked within this.
    pub keep_alive_timeout: Duration,
    /// Default per-call deadline; callers may override per call.
    pub default_deadline: Duration,
    /// Soft limit after which an in-flight call is cancelled locally,
    /// independent of the per-call deadline.
    pub time_limit: Duration,
    /// Maximum inbound message size; clamped to 4..=20 MiB.
    pub max_message_bytes: usize,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
    pub bulkhead_limit: usize,
    pub bulkhead_wait: Duration,
}

impl PeerConfig {
    pub fn new(name: impl Into<String>, addresses: Vec<String>) -> Self {
        Self {
            name: name.into(),
            addresses,
            tls: false,
            connect_timeout: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(10),
            default_deadline: Duration::from_secs(10),
            time_limit: Duration::from_secs(10),
            max_message_bytes: 16 << 20,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
            bulkhead_limit: 10,
            bulkhead_wait: Duration::from_secs(1),
        }
    }
}

/// A long-lived, shared handle to one named callee: lazily-dialed
/// channels balanced round-robin, guarded by a bulkhead, a circuit
/// breaker, transport retries, and a soft time limit, in that order.
pub struct Peer {
    config: PeerConfig,
    channels: Vec<Channel>,
    next: AtomicUsize,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
}

impl Peer {
    pub fn new(mut config: PeerConfig) -> Result<Self> {
        if config.addresses.is_empty() {
            return Err(Error::InvalidEndpoint("<no addresses>".to_string()));
        }
        config.max_message_bytes = config
            .max_message_bytes
            .clamp(MIN_MESSAGE_BYTES, MAX_MESSAGE_BYTES);

        let channels = config
            .addresses
            .iter()
            .map(|address| dial_channel(address, &config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            breaker: CircuitBreaker::new(config.name.clone(), config.breaker.clone()),
            bulkhead: Bulkhead::new(
                config.name.clone(),
                config.bulkhead_limit,
                config.bulkhead_wait,
            ),
            channels,
            next: AtomicUsize::new(0),
            config,
        })
    }

    /// Round-robin pick of a backend channel. Channels are internally
    /// thread-safe and shared across all concurrent callers.
    pub fn channel(&self) -> Channel {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        self.channels[index].clone()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn default_deadline(&self) -> Duration {
        self.config.default_deadline
    }

    pub fn max_message_bytes(&self) -> usize {
        self.config.max_message_bytes
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Place one guarded call. Decoration order is bulkhead, then circuit
    /// breaker, then retries, then the soft time limit around each
    /// attempt; cancellation of the returned future releases the
    /// bulkhead slot.
    pub async fn call<T, F, Fut>(&self, idempotent: bool, mut op: F) -> Result<T>
    where
        F: FnMut(Channel) -> Fut,
        Fut: Future<Output = std::result::Result<T, tonic::Status>>,
    {
        let _slot = self.bulkhead.acquire().await?;
        self.breaker.try_acquire()?;

        let result = retry(&self.config.retry, idempotent, || {
            let attempt = op(self.channel());
            let time_limit = self.config.time_limit;
            let name = self.config.name.clone();
            async move {
                match tokio::time::timeout(time_limit, attempt).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(status)) => Err(Error::Grpc(status)),
                    Err(_) => Err(Error::TimeLimit(name)),
                }
            }
        })
        .await;

        self.breaker.record(result.is_ok());
        result
    }
}

fn dial_channel(address: &str, config: &PeerConfig) -> Result<Channel> {
    let mut endpoint = Endpoint::from_shared(address.to_string())
        .map_err(|_| Error::InvalidEndpoint(address.to_string()))?
        .connect_timeout(config.connect_timeout)
        .http2_keep_alive_interval(config.keep_alive_interval)
        .keep_alive_timeout(config.keep_alive_timeout)
        .keep_alive_while_idle(true);

    if config.tls {
        endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
    }

    // Dial lazily: the channel connects on first use and transparently
    // re-establishes after failures.
    Ok(endpoint.connect_lazy())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn peer() -> Peer {
        let mut config = PeerConfig::new(
            "identity",
            vec!["http://127.0.0.1:1".to_string()],
        );
        config.bulkhead_wait = Duration::from_millis(10);
        Peer::new(config).unwrap()
    }

    #[test]
    fn rejects_empty_and_invalid_addresses() {
        assert!(matches!(
            Peer::new(PeerConfig::new("identity", vec![])),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Peer::new(PeerConfig::new("identity", vec!["\u{0}".to_string()])),
            Err(Error::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn message_size_is_clamped() {
        let mut config = PeerConfig::new("identity", vec!["http://127.0.0.1:1".to_string()]);
        config.max_message_bytes = 1;
        assert_eq!(Peer::new(config).unwrap().max_message_bytes(), 4 << 20);

        let mut config = PeerConfig::new("identity", vec!["http://127.0.0.1:1".to_string()]);
        config.max_message_bytes = usize::MAX;
        assert_eq!(Peer::new(config).unwrap().max_message_bytes(), 20 << 20);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_calls_are_retried_then_recorded() {
        let peer = peer();
        let calls = AtomicUsize::new(0);

        let result: Result<()> = peer
            .call(true, |_channel| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(tonic::Status::unavailable("down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_open_the_breaker() {
        let peer = peer();

        for _ in 0..5 {
            let _: Result<()> = peer
                .call(false, |_channel| async {
                    Err(tonic::Status::unavailable("down"))
                })
                .await;
        }

        let result: Result<()> = peer.call(false, |_channel| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::CircuitOpen(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_hit_the_time_limit() {
        let mut config = PeerConfig::new("identity", vec!["http://127.0.0.1:1".to_string()]);
        config.time_limit = Duration::from_secs(1);
        config.retry.max_attempts = 1;
        let peer = Peer::new(config).unwrap();

        let result: Result<()> = peer
            .call(true, |_channel| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::TimeLimit(_))));
        assert_eq!(
            result.unwrap_err().into_status().code(),
            tonic::Code::DeadlineExceeded
        );
    }

    #[tokio::test]
    async fn bulkhead_bounds_concurrent_calls() {
        let mut config = PeerConfig::new("identity", vec!["http://127.0.0.1:1".to_string()]);
        config.bulkhead_limit = 1;
        config.bulkhead_wait = Duration::from_millis(10);
        let peer = std::sync::Arc::new(Peer::new(config).unwrap());

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let holder = tokio::spawn({
            let peer = peer.clone();
            let mut release_rx = Some(release_rx);
            async move {
                peer.call(false, move |_channel| {
                    let release_rx = release_rx.take();
                    async move {
                        if let Some(release_rx) = release_rx {
                            let _ = release_rx.await;
                        }
                        Ok(())
                    }
                })
                .await
            }
        });

        // Let the holder occupy the only slot.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result: Result<()> = peer.call(false, |_channel| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::BulkheadFull(_))));

        let _ = release_tx.send(());
        holder.await.unwrap().unwrap();
    }
}
