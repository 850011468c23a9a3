//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the Token custom resource
pub const API_GROUP: &str = "serviceaccount.kubetrail.io";

/// Finalizer added to every Token before any secret is issued for it
pub const TOKEN_FINALIZER: &str = "serviceaccount.kubetrail.io/finalizer";

/// Field manager name used for server-side writes and events
pub const CONTROLLER_NAME: &str = "token-rotation-controller";

/// Service account name used when a Token does not name one
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "default";

/// Literal segment between the Token name and the random suffix of a secret name
pub const SECRET_NAME_SEGMENT: &str = "token";

/// Number of random characters appended to generated secret names
pub const SECRET_NAME_SUFFIX_LEN: usize = 5;

/// Attempts at drawing a suffix that does not clash with a listed secret
pub const SECRET_NAME_MAX_ATTEMPTS: usize = 8;

/// Secret type for service account tokens
pub const SERVICE_ACCOUNT_TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";

/// Annotation binding a token secret to its service account
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Lower bound enforced by admission on both rotation and grace periods (seconds)
pub const MIN_PERIOD_SECONDS: i64 = 600;

/// Condition types
pub const CONDITION_TYPE_OBJECT: &str = "object";
pub const CONDITION_TYPE_CREDENTIAL: &str = "credential";

/// Condition and status reasons
pub const REASON_OBJECT_INITIALIZED: &str = "ObjectInitialized";
pub const REASON_OBJECT_MARKED_FOR_DELETION: &str = "ObjectMarkedForDeletion";
pub const REASON_FINALIZER_ADDED: &str = "FinalizerAdded";
pub const REASON_CREATED_TOKEN: &str = "CreatedToken";

/// Status messages
pub const MESSAGE_OBJECT_INITIALIZED: &str = "object initialized";
pub const MESSAGE_MARKED_FOR_DELETION: &str = "object is marked for deletion";
pub const MESSAGE_CREATED_TOKEN: &str = "created service account token";

/// Default steady-state requeue interval after a clean pass (seconds)
pub const DEFAULT_RECONCILE_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff floor for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff ceiling for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default requeue after an optimistic concurrency conflict (seconds)
pub const DEFAULT_CONFLICT_REQUEUE_SECS: u64 = 2;

/// Default minimum interval between two identical events for one Token (seconds)
pub const DEFAULT_EVENT_DEBOUNCE_SECS: u64 = 300;

/// Default limit on concurrently running reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default HTTPS port for admission webhooks
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Default webhook TLS certificate path
pub const DEFAULT_WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";

/// Default webhook TLS private key path
pub const DEFAULT_WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
