//! # submitter-cli -- Command-line entry point
//!
//! Provides the `submitter` binary. A run is configured entirely through the
//! environment (see [`submitter_sync::config`]) and performs one full
//! submission:
//!
//! ```bash
//! ENVELOPE_DIR=_build/envelopes ASSET_DIR=_build/assets \
//! CONTENT_SERVICE_URL=https://content.example.com CONTENT_SERVICE_APIKEY=... \
//! CONTENT_ID_BASE=https://github.com/org/repo/ submitter
//! ```
//!
//! ## Exit status
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Envelopes were published, or nothing needed publishing |
//! | 1 | Configuration, filesystem, or content service error |
//! | 2 | The content service rejected one or more envelopes |

pub mod submit;

/// Exit status for a run that hit a fatal error.
pub const EXIT_ERROR: u8 = 1;

/// Exit status for a run in which the service rejected envelopes.
pub const EXIT_REJECTED: u8 = 2;
