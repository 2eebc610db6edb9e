// Totems Agent Engine — Duplicate Guard
// Prevents silent re-execution of an identical write action within a
// session, while allowing deliberate repeats after explicit confirmation.
//
// The fingerprint is a pure function of the action name and its normalized
// argument map — no timestamp, no nonce. Two genuinely intentional identical
// transfers in one session are indistinguishable from an accidental
// double-submission and always require confirmation. That is the intended
// trade-off for an agent holding signing authority.
//
// `ConfirmationGate::request` is the one designed suspension point in the
// engine: it parks the in-flight agent turn on a oneshot channel until a
// human answers through whatever surface the shell attached.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

// ── Confirmation gate ──────────────────────────────────────────────────

/// A pending yes/no question for the user: "this exact action already ran —
/// run it again?". Delivered to the attached surface; resolved exactly once.
/// Dropping the request unresolved counts as a decline.
pub struct ConfirmationRequest {
    pub action: String,
    pub params: Value,
    responder: oneshot::Sender<bool>,
}

impl ConfirmationRequest {
    pub fn resolve(self, approved: bool) {
        // The requester may have been cancelled meanwhile; nothing to do then.
        let _ = self.responder.send(approved);
    }

    pub fn approve(self) {
        self.resolve(true);
    }

    pub fn decline(self) {
        self.resolve(false);
    }
}

/// The bidirectional request/response channel between the engine and the UI
/// surface. At most one request is outstanding at any instant; a second
/// requester queues behind the async mutex until the first is resolved.
pub struct ConfirmationGate {
    surface: Mutex<Option<mpsc::UnboundedSender<ConfirmationRequest>>>,
    serial: AsyncMutex<()>,
    timeout: Mutex<Option<Duration>>,
}

impl ConfirmationGate {
    /// A gate with no surface attached and no timeout. Until `attach` is
    /// called, every request fails closed (declined).
    pub fn new() -> Self {
        ConfirmationGate {
            surface: Mutex::new(None),
            serial: AsyncMutex::new(()),
            timeout: Mutex::new(None),
        }
    }

    /// A gate whose requests resolve to "declined" after `timeout` with no
    /// human answer, so an abandoned dialog cannot pin the session forever.
    pub fn with_timeout(timeout: Duration) -> Self {
        let gate = Self::new();
        *gate.timeout.lock() = Some(timeout);
        gate
    }

    /// Change the answer timeout. `None` waits indefinitely (the default).
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock() = timeout;
    }

    /// Attach a UI surface. Returns the receiving end the shell listens on;
    /// replaces any previously attached surface. Dropping the receiver
    /// resolves any in-flight request as declined.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<ConfirmationRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.surface.lock() = Some(tx);
        rx
    }

    /// Detach the surface. Subsequent requests fail closed.
    pub fn detach(&self) {
        *self.surface.lock() = None;
    }

    /// Ask the human. Suspends until answered, the surface goes away, or the
    /// optional timeout elapses — everything but an explicit "yes" is "no".
    pub(crate) async fn request(&self, action: &str, params: &Value) -> bool {
        let _serial = self.serial.lock().await;

        let sender = self.surface.lock().clone();
        let Some(sender) = sender else {
            warn!(
                "[engine] No confirmation surface attached — declining duplicate {}",
                action
            );
            return false;
        };

        let (tx, rx) = oneshot::channel();
        let request = ConfirmationRequest {
            action: action.to_string(),
            params: params.clone(),
            responder: tx,
        };
        if sender.send(request).is_err() {
            warn!(
                "[engine] Confirmation surface closed — declining duplicate {}",
                action
            );
            return false;
        }

        let timeout = *self.timeout.lock();
        let answer = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result.unwrap_or(false),
                Err(_) => {
                    warn!(
                        "[engine] Confirmation timeout ({:?}) for {} — declining",
                        limit, action
                    );
                    false
                }
            },
            // The human may take arbitrarily long; a dropped responder
            // (dialog dismissed, UI torn down) still resolves as declined.
            None => rx.await.unwrap_or(false),
        };

        info!(
            "[engine] Duplicate {} {} by user",
            action,
            if answer { "confirmed" } else { "declined" }
        );
        answer
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

// ── Fingerprinting ─────────────────────────────────────────────────────

/// Canonical JSON: object keys recursively sorted, arrays in order. Keeps
/// the fingerprint independent of the key order a given model happens to
/// emit arguments in.
fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                canonical_json(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Deterministic key for `(action, arguments)`.
pub(crate) fn fingerprint(action: &str, args: &Value) -> String {
    let mut canon = String::new();
    canonical_json(args, &mut canon);

    let mut hasher = Sha256::new();
    hasher.update(action.as_bytes());
    hasher.update([0u8]); // separator so ("ab","c") != ("a","bc")
    hasher.update(canon.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ── Duplicate guard ────────────────────────────────────────────────────

/// Outcome of a pre-execution duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// First time this exact call is seen this session — run it.
    Allow,
    /// Seen before — suspend and ask the human.
    MustConfirm,
}

/// Session-scoped fingerprint set for executed write actions.
/// Owned by one `AgentSession`; cleared together with the conversation
/// history on logout/lock/login.
pub struct DuplicateGuard {
    seen: Mutex<HashSet<String>>,
    gate: Arc<ConfirmationGate>,
}

impl DuplicateGuard {
    pub fn new(gate: Arc<ConfirmationGate>) -> Self {
        DuplicateGuard {
            seen: Mutex::new(HashSet::new()),
            gate,
        }
    }

    pub fn check(&self, action: &str, args: &Value) -> DuplicateCheck {
        if self.seen.lock().contains(&fingerprint(action, args)) {
            DuplicateCheck::MustConfirm
        } else {
            DuplicateCheck::Allow
        }
    }

    /// Suspend until the human answers. Fails closed when headless.
    pub async fn confirm(&self, action: &str, args: &Value) -> bool {
        self.gate.request(action, args).await
    }

    /// Record a fingerprint. Call ONLY after the Ledger write succeeded —
    /// recording a failed call would flag a legitimate retry as a duplicate.
    pub fn record(&self, action: &str, args: &Value) {
        self.seen.lock().insert(fingerprint(action, args));
    }

    /// Clear all fingerprints. Invoked on logout, lock, and login.
    pub fn reset(&self) {
        self.seen.lock().clear();
    }
}
