//! Shared logging plumbing for the ReFramed crates.
//!
//! Library code logs through `tracing` with one of the targets on [`Log`], e.g:
//!
//! ```ignore
//! tracing::warn!(target: Log::Codec, players, "Uneven state counts");
//! ```
//!
//! Installing a subscriber is left to whatever binary or test harness consumes
//! the libraries; [`init`] exists for the common case.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Log targets, one per decode stage. These are plain string constants so they
/// can be used as `target:` arguments in the `tracing` macros.
#[derive(Debug)]
pub struct Log;

#[allow(non_upper_case_globals)]
impl Log {
    /// Decompression and container unwrapping.
    pub const Source: &'static str = "reframed::source";

    /// Format family detection and table of contents handling.
    pub const Container: &'static str = "reframed::container";

    /// Binary frame state decoding.
    pub const Codec: &'static str = "reframed::codec";

    /// Mapping table re-keying and document assembly.
    pub const Normalize: &'static str = "reframed::normalize";

    /// Lookups against a finished document.
    pub const Query: &'static str = "reframed::query";
}

/// Filter used when `RUST_LOG` is unset or unparseable.
const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// Installs a formatting subscriber that honors `RUST_LOG`.
///
/// Safe to call more than once; only the first call has any effect. If another
/// global subscriber was installed elsewhere, this quietly leaves it in place.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
            tracing::debug!(target: Log::Source, "A global subscriber was already installed");
        }
    });
}
