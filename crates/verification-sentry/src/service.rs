//! Service architecture for the verification sentry.
//!
//! ```text
//!  Consensus extension          Sentry                        Execution node
//!        |                        |                                 |
//!        |<--subscribe(pubkey)----|                                 |
//!        |---verification req---->|                                 |
//!        |                        |--block by number / hash-------->|
//!        |                        |<-------------block--------------|
//!        |                        |--receipts---------------------->|
//!        |                        |<-----------receipts-------------|
//!        |                        |                                 |
//!        |            (receipts root, encode, sign)                 |
//!        |                        |                                 |
//!        |<--submitVerification---|                                 |
//! ```
//!
//! - [`runner::VerificationService`]: owns the WebSocket subscription,
//!   reconnects within a retry budget and feeds pushes to the pipeline one at a
//!   time.
//! - [`pipeline::Pipeline`]: turns one push into a submitted attestation.

pub mod pipeline;
pub mod runner;
