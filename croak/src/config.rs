use std::time::Duration;

/// Transmission parameters of CON messages (RFC7252 section 4.8)
///
/// `croak` doesn't retransmit; these only feed the derived
/// [`Config::exchange_lifetime`] used to retain exchanges for deduplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Con {
  /// `ACK_TIMEOUT`
  ///
  /// Defaults to 2 seconds.
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Con;
  ///
  /// assert_eq!(Con::default().ack_timeout, Duration::from_secs(2));
  /// ```
  pub ack_timeout: Duration,
  /// `ACK_RANDOM_FACTOR`
  ///
  /// Defaults to 1.5
  /// ```
  /// use croak::config::Con;
  ///
  /// assert_eq!(Con::default().ack_random_factor, 1.5);
  /// ```
  pub ack_random_factor: f32,
  /// `MAX_RETRANSMIT`
  ///
  /// Defaults to 4 attempts.
  /// ```
  /// use croak::config::Con;
  ///
  /// assert_eq!(Con::default().max_retransmit, 4);
  /// ```
  pub max_retransmit: u32,
  /// `MAX_LATENCY`; the maximum time a datagram is expected
  /// to take from the start of its transmission to the completion of its reception.
  ///
  /// Defaults to 100 seconds.
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Con;
  ///
  /// assert_eq!(Con::default().max_latency, Duration::from_secs(100));
  /// ```
  pub max_latency: Duration,
  /// `PROCESSING_DELAY`; the time a node takes to turn around a CON into an ACK.
  ///
  /// Defaults to [`Con::ack_timeout`].
  pub processing_delay: Duration,
}

impl Default for Con {
  fn default() -> Self {
    Con { ack_timeout: Duration::from_secs(2),
          ack_random_factor: 1.5,
          max_retransmit: 4,
          max_latency: Duration::from_secs(100),
          processing_delay: Duration::from_secs(2) }
  }
}

impl Con {
  /// `MAX_TRANSMIT_SPAN`: `ACK_TIMEOUT * ((2 ** MAX_RETRANSMIT) - 1) * ACK_RANDOM_FACTOR`
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Con;
  ///
  /// assert_eq!(Con::default().max_transmit_span(), Duration::from_secs(45));
  /// ```
  pub fn max_transmit_span(&self) -> Duration {
    let attempts = 2u32.saturating_pow(self.max_retransmit).saturating_sub(1);
    self.ack_timeout
        .mul_f32(attempts as f32 * self.ack_random_factor)
  }
}

/// Strategies for retaining exchanges in order to detect duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupStrategy {
  /// One map, periodically swept for exchanges older than the exchange lifetime.
  ///
  /// Retention is exact (within one sweep interval).
  Sweep,
  /// Three maps in a ring rotated every exchange lifetime; the oldest is dropped wholesale.
  ///
  /// Eviction is O(1), retention is between one and two periods.
  CropRotation,
}

/// Configuration of the deduplicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dedup {
  /// Which strategy to use
  ///
  /// Defaults to [`DedupStrategy::Sweep`].
  /// ```
  /// use croak::config::{Dedup, DedupStrategy};
  ///
  /// assert_eq!(Dedup::default().strategy, DedupStrategy::Sweep);
  /// ```
  pub strategy: DedupStrategy,
  /// How often the [`DedupStrategy::Sweep`] worker scans for expired exchanges
  ///
  /// Defaults to 10 seconds.
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Dedup;
  ///
  /// assert_eq!(Dedup::default().sweep_interval, Duration::from_secs(10));
  /// ```
  pub sweep_interval: Duration,
  /// How often [`DedupStrategy::CropRotation`] rotates its buckets.
  ///
  /// `None` (the default) rotates every [`Config::exchange_lifetime`].
  pub rotation_period: Option<Duration>,
}

impl Default for Dedup {
  fn default() -> Self {
    Dedup { strategy: DedupStrategy::Sweep,
            sweep_interval: Duration::from_secs(10),
            rotation_period: None }
  }
}

/// Configuration of proxy forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forward {
  /// How long to wait for the origin server's response to a forwarded CoAP request
  ///
  /// Defaults to [`Forward::DEFAULT_COAP_TIMEOUT`].
  pub coap_timeout: Duration,
  /// Deadline for a forwarded HTTP request
  ///
  /// Defaults to [`Forward::DEFAULT_HTTP_TIMEOUT`].
  pub http_timeout: Duration,
}

impl Forward {
  /// 45 seconds; one `MAX_TRANSMIT_SPAN` with the default transmission parameters
  pub const DEFAULT_COAP_TIMEOUT: Duration = Duration::from_secs(45);
  /// 30 seconds
  pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for Forward {
  fn default() -> Self {
    Forward { coap_timeout: Self::DEFAULT_COAP_TIMEOUT,
              http_timeout: Self::DEFAULT_HTTP_TIMEOUT }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// See [`Con`]
  pub con: Con,
  /// See [`Dedup`]
  pub dedup: Dedup,
  /// See [`Forward`]
  pub forward: Forward,
  /// Replace the derived [`Config::exchange_lifetime`]
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Config;
  ///
  /// let cfg = Config { exchange_lifetime_override: Some(Duration::from_millis(50)),
  ///                    ..Config::default() };
  /// assert_eq!(cfg.exchange_lifetime(), Duration::from_millis(50));
  /// ```
  pub exchange_lifetime_override: Option<Duration>,
  /// How long a duplicate request waits for the original exchange's response
  /// before giving up silently.
  ///
  /// Defaults to 5 seconds.
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Config;
  ///
  /// assert_eq!(Config::default().duplicate_wait, Duration::from_secs(5));
  /// ```
  pub duplicate_wait: Duration,
  /// Port bound when a server is started without any endpoints.
  ///
  /// Defaults to 5683.
  /// ```
  /// use croak::config::Config;
  ///
  /// assert_eq!(Config::default().default_port, 5683);
  /// ```
  pub default_port: u16,
}

impl Default for Config {
  fn default() -> Self {
    Config { con: Con::default(),
             dedup: Dedup::default(),
             forward: Forward::default(),
             exchange_lifetime_override: None,
             duplicate_wait: Duration::from_secs(5),
             default_port: 5683 }
  }
}

impl Config {
  /// `EXCHANGE_LIFETIME`: `MAX_TRANSMIT_SPAN + 2 * MAX_LATENCY + PROCESSING_DELAY`
  ///
  /// ```
  /// use std::time::Duration;
  ///
  /// use croak::config::Config;
  ///
  /// assert_eq!(Config::default().exchange_lifetime(), Duration::from_secs(247));
  /// ```
  pub fn exchange_lifetime(&self) -> Duration {
    self.exchange_lifetime_override.unwrap_or_else(|| {
                                      self.con.max_transmit_span()
                                      + (2 * self.con.max_latency)
                                      + self.con.processing_delay
                                    })
  }

  /// Period of crop rotation
  pub fn rotation_period(&self) -> Duration {
    self.dedup
        .rotation_period
        .unwrap_or_else(|| self.exchange_lifetime())
  }
}
