use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `steerbot`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum SteerError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Task registry ────────────────────────────────────────────────────
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    // ── Protocol client ──────────────────────────────────────────────────
    #[error("client: {0}")]
    Client(#[from] ClientError),

    // ── Delivery ─────────────────────────────────────────────────────────
    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Task registry errors ───────────────────────────────────────────────────

/// Errors surfaced to callers of the registry's mutation API. These never
/// crash the registry; a persistence failure is the only fatal defect and is
/// reported synchronously to the mutation caller.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("task {0} not found")]
    NotFound(String),

    #[error("invalid task config: {0}")]
    InvalidConfig(String),

    #[error("failed to persist task store: {0}")]
    Persist(String),
}

// ─── Protocol client errors ─────────────────────────────────────────────────

/// Error classification for the underlying chat-protocol client.
///
/// `FloodWait` is the server's backpressure signal and is recovered locally by
/// the delivery executor; `Rpc` covers transient failures that are retried
/// with backoff; `NotFound` means the identifier does not resolve to a chat.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("flood wait: retry after {0}s")]
    FloodWait(u64),

    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("rpc: {0}")]
    Rpc(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

// ─── Delivery errors ────────────────────────────────────────────────────────

/// Terminal per-message delivery outcomes. None of these stop the task; they
/// are recorded in its statistics and the task keeps running.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("target chat {0} could not be resolved")]
    TargetUnresolved(String),

    #[error("delivery abandoned: task stopping")]
    Cancelled,

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
