//! Core of the scriptgate daemon: the authentication/lockout guard and the
//! pipeline that turns a requested script name into a streamed subprocess.
//!
//! The HTTP surface lives in `scriptgate-server`; everything here is
//! transport-agnostic and driven through plain Rust types.

pub mod auth;
pub mod error;
pub mod guard;
pub mod limiter;
pub mod lister;
pub mod notify;
pub mod resolver;
pub mod streamer;

pub use auth::{AuthDecision, AuthGate};
pub use error::{ExecutionError, ResolveError};
pub use guard::{CredentialGuard, ExitProcess, LOCKOUT_EXIT_CODE, LockoutAction, LockoutPolicy};
pub use limiter::{ExecutionLimiter, ExecutionPermit};
pub use lister::{SCRIPT_EXTENSIONS, list_scripts};
pub use notify::{NotifyEvent, Notifier, NtfyNotifier, spawn_notification};
pub use resolver::{ScriptPath, ScriptResolver};
pub use streamer::{
    CHUNK_SIZE, DEFAULT_SHELL, ExecutionOutcome, ExecutionSession, ProcessStreamer, ResponseSink,
};
