//! # Verification Service
//!
//! [`VerificationService`] keeps one subscription to the consensus extension
//! open and hands every push to the [`Pipeline`].
//!
//! ## Connection lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Subscribing -> Streaming
//!      ^                                          |
//!      +-------------- transport error -----------+
//! ```
//!
//! Every failed connect, subscribe or read counts against `max_retries`; the
//! handshake and the subscribe reply are each bounded by `connect_timeout_ms`.
//! The budget covers the whole process lifetime and is never refilled, so a
//! flapping or silent server eventually terminates the service. Shutdown
//! interrupts any state.

use std::time::Duration;

use attestor_bls::{PublicKeyBytes, SecretKeyBytes};
use attestor_types::RpcMethods;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    Config,
    error::{Error, Result},
    rpc::{ExecutionApi, VerificationSubmitter},
    service::pipeline::{Pipeline, WaitBudgets},
    subscription::connect_verification_socket,
};

/// Connection state of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Disconnected,
    Connecting,
    Subscribing,
    Streaming,
    Terminated,
}

pub struct VerificationService<E, S> {
    subscription_url: Url,
    methods: RpcMethods,
    max_retries: u32,
    retry_interval: Duration,
    connect_timeout: Duration,
    public_key: PublicKeyBytes,
    pipeline: Pipeline<E, S>,
    state: watch::Sender<RunnerState>,
}

impl<E: ExecutionApi, S: VerificationSubmitter> VerificationService<E, S> {
    /// Builds the service, deriving the subscription public key from `secret`.
    pub fn new(config: &Config, secret: SecretKeyBytes, execution: E, submitter: S) -> Result<Self> {
        let (_, public_key) = attestor_bls::derive_public_key(secret.as_be_bytes())?;
        let (state, _) = watch::channel(RunnerState::Disconnected);

        Ok(Self {
            subscription_url: config.subscription_url.clone(),
            methods: config.methods(),
            max_retries: config.max_retries,
            retry_interval: config.retry_interval(),
            connect_timeout: config.connect_timeout(),
            public_key,
            pipeline: Pipeline::new(execution, submitter, secret, WaitBudgets::from(config)),
            state,
        })
    }

    /// Public key the service subscribes and signs with.
    pub fn public_key(&self) -> &PublicKeyBytes {
        &self.public_key
    }

    /// Watch handle on the connection state.
    pub fn state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RunnerState) {
        debug!(?state, "Runner state changed");
        self.state.send_replace(state);
    }

    /// Runs until shutdown ([`Error::Cancelled`]) or until the retry budget is
    /// spent ([`Error::RetriesExhausted`]).
    pub async fn run(self, shutdown_token: CancellationToken) -> Result<()> {
        let mut retries = 0;

        loop {
            let error = self.run_once(&shutdown_token).await;
            self.set_state(RunnerState::Disconnected);

            if matches!(error, Error::Cancelled) || shutdown_token.is_cancelled() {
                info!("VerificationService received shutdown signal");
                self.set_state(RunnerState::Terminated);
                return Err(Error::Cancelled);
            }

            retries += 1;
            if retries > self.max_retries {
                error!(error = %error, max_retries = self.max_retries, "Giving up on subscription");
                self.set_state(RunnerState::Terminated);
                return Err(Error::RetriesExhausted {
                    retries: self.max_retries,
                    last_error: Box::new(error),
                });
            }

            warn!(
                error = %error,
                retry = retries,
                max_retries = self.max_retries,
                delay = ?self.retry_interval,
                "Subscription failed, reconnecting"
            );

            tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => {
                    info!("VerificationService received shutdown signal");
                    self.set_state(RunnerState::Terminated);
                    return Err(Error::Cancelled);
                }

                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    /// One connection lifetime. Always ends in an error: the transport failure
    /// that closed it, or [`Error::Cancelled`].
    async fn run_once(&self, shutdown_token: &CancellationToken) -> Error {
        let url = &self.subscription_url;
        let pubkey_hex = self.public_key.to_hex();

        self.set_state(RunnerState::Connecting);
        info!(url = %url, "Connecting to verification request WebSocket");

        let socket = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => return Error::Cancelled,
            result = connect_verification_socket(url, self.connect_timeout) => match result {
                Ok(socket) => socket,
                Err(e) => return e,
            },
        };

        self.set_state(RunnerState::Subscribing);
        let subscribe =
            socket.subscribe(&self.methods.subscribe, &pubkey_hex, self.connect_timeout);
        let subscription = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => return Error::Cancelled,
            result = subscribe => match result {
                Ok(subscription) => subscription,
                Err(e) => return e,
            },
        };

        info!(
            method = %self.methods.subscribe,
            subscription = %subscription.subscription_id(),
            pubkey = %self.public_key,
            "Subscribed to verification requests"
        );
        self.set_state(RunnerState::Streaming);

        let mut stream = std::pin::pin!(subscription.into_stream());

        loop {
            tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => return Error::Cancelled,

                next = stream.next() => match next {
                    Some(Ok(push)) => {
                        if let Err(e) = self.handle_push(&push, shutdown_token).await {
                            return e;
                        }
                    }
                    Some(Err(e)) => return e,
                    None => return Error::Transport("subscription stream ended".into()),
                },
            }
        }
    }

    /// Runs the pipeline for one push. Only cancellation is propagated; every
    /// other failure drops the push.
    async fn handle_push(
        &self,
        push: &serde_json::Value,
        shutdown_token: &CancellationToken,
    ) -> Result<()> {
        let outcome = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => return Err(Error::Cancelled),
            outcome = self.pipeline.process(push, shutdown_token) => outcome,
        };

        match outcome {
            Ok(_) => Ok(()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e @ Error::Decode(_)) => {
                warn!(error = %e, raw = %push, "Skipping undecodable verification request");
                Ok(())
            }
            Err(e @ (Error::ResolutionTimeout(_) | Error::ReceiptsUnavailable(_))) => {
                warn!(error = %e, raw = %push, "Block not available, skipping verification request");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, raw = %push, "Failed to attest block");
                Ok(())
            }
        }
    }
}
