use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::Instrument;

use super::frame::{FrameCodec, MAX_FROM_BROWSER};
use super::message::{PreviewRequest, Response, INTERNAL_ERROR};
use crate::config::{DispatchMode, HostConfig};
use crate::error::{FrameError, HostError};
use crate::worker::Supervisor;

const RESPONSE_QUEUE: usize = 64;

type Outgoing = (Response, Option<oneshot::Sender<()>>);

fn writer_closed() -> HostError {
    HostError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "response writer closed",
    ))
}

/// Handle for queueing responses to the single stdout writer.
///
/// Frames are written whole, one at a time, in queue order.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<Outgoing>,
}

impl Sender {
    /// Queue a response.
    pub async fn send(&self, response: Response) -> Result<(), HostError> {
        self.tx
            .send((response, None))
            .await
            .map_err(|_| writer_closed())
    }

    /// Queue a response and wait until it has been written and flushed.
    pub async fn send_flushed(&self, response: Response) -> Result<(), HostError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((response, Some(ack_tx)))
            .await
            .map_err(|_| writer_closed())?;
        ack_rx.await.map_err(|_| writer_closed())
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Start the task that owns `output`. It ends when every [`Sender`] is gone
/// or a write fails.
pub fn spawn_writer<W>(output: W) -> (Sender, JoinHandle<Result<(), HostError>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Outgoing>(RESPONSE_QUEUE);
    let handle = tokio::spawn(async move {
        let mut sink = FramedWrite::new(output, FrameCodec::<Value>::new());
        while let Some((response, ack)) = rx.recv().await {
            write_response(&mut sink, response).await?;
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
        }
        Ok(())
    });
    (Sender { tx }, handle)
}

async fn write_response<W>(
    sink: &mut FramedWrite<W, FrameCodec<Value>>,
    response: Response,
) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    let package_name = response.package_name.clone();
    match sink.send(response).await {
        Ok(()) => Ok(()),
        Err(FrameError::TooLarge { len, max }) => {
            tracing::warn!(len, max, "Response too large for the browser, replacing it");
            let fallback = Response::failed(
                package_name,
                format!("Response exceeds the {max} byte message limit"),
            );
            sink.send(fallback).await.map_err(HostError::from)
        }
        Err(e) => Err(e.into()),
    }
}

/// The protocol loop: read frames, dispatch previews, answer each exactly once.
pub struct Bridge {
    supervisor: Arc<dyn Supervisor>,
    mode: DispatchMode,
    max_message_bytes: usize,
}

impl Bridge {
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            supervisor,
            mode: DispatchMode::default(),
            max_message_bytes: MAX_FROM_BROWSER,
        }
    }

    pub fn from_config(config: &HostConfig, supervisor: Arc<dyn Supervisor>) -> Self {
        Self::new(supervisor)
            .dispatch_mode(config.host.dispatch)
            .max_message_bytes(config.host.max_message_bytes)
    }

    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    /// Serve the browser over this process's stdin/stdout.
    pub async fn run_stdio(&self) -> Result<(), HostError> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `input` reaches EOF, then wait for outstanding dispatches
    /// and flush their responses.
    ///
    /// Returns an error only when `input` or `output` themselves fail. In that
    /// case outstanding dispatches are aborted, which kills their workers.
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, writer) = spawn_writer(output);
        let mut frames = FramedRead::new(
            input,
            FrameCodec::<Value>::with_max_inbound(self.max_message_bytes),
        );
        let mut inflight = JoinSet::new();

        let read_result = self.read_loop(&mut frames, &sender, &mut inflight).await;
        if read_result.is_err() {
            inflight.abort_all();
        }

        while let Some(joined) = inflight.join_next().await {
            match joined {
                Err(e) if e.is_cancelled() => tracing::debug!("Dispatch aborted"),
                Err(e) => tracing::error!(error = %e, "Dispatch task failed"),
                Ok(()) => {}
            }
        }
        drop(sender);

        let write_result = match writer.await {
            Ok(result) => result,
            Err(e) => Err(HostError::Io(io::Error::other(e))),
        };
        read_result.and(write_result)
    }

    async fn read_loop<R>(
        &self,
        frames: &mut FramedRead<R, FrameCodec<Value>>,
        sender: &Sender,
        inflight: &mut JoinSet<()>,
    ) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let next = tokio::select! {
                next = frames.next() => next,
                _ = sender.closed() => return Err(writer_closed()),
            };
            let Some(item) = next else {
                tracing::debug!("Input closed");
                return Ok(());
            };

            while inflight.try_join_next().is_some() {}

            let value = match item.and_then(|decoded| decoded) {
                Ok(value) => value,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Malformed frame");
                    sender.send(Response::malformed(&e)).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let request = match PreviewRequest::from_value(&value) {
                Ok(request) => request,
                Err(reason) => {
                    tracing::warn!(%reason, "Rejecting message");
                    sender.send(Response::invalid_format()).await?;
                    continue;
                }
            };

            let span = tracing::info_span!("dispatch", package_name = %request.package_name);
            match self.mode {
                DispatchMode::Serial => {
                    let response = dispatch(self.supervisor.as_ref(), request)
                        .instrument(span)
                        .await;
                    sender.send_flushed(response).await?;
                }
                DispatchMode::Concurrent => {
                    let supervisor = Arc::clone(&self.supervisor);
                    let sender = sender.clone();
                    inflight.spawn(
                        async move {
                            let response = dispatch(supervisor.as_ref(), request).await;
                            if sender.send(response).await.is_err() {
                                tracing::warn!("Output closed, dropping response");
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }
}

/// Run one request to exactly one response. A panicking supervisor still
/// gets its request answered.
async fn dispatch(supervisor: &dyn Supervisor, request: PreviewRequest) -> Response {
    tracing::debug!("Dispatching");
    let result = AssertUnwindSafe(supervisor.run(&request.package_name))
        .catch_unwind()
        .await;
    match result {
        Ok(outcome) => {
            tracing::debug!(success = outcome.is_success(), "Dispatch finished");
            Response::from_outcome(request.package_name, outcome)
        }
        Err(_) => {
            tracing::error!("Supervisor panicked");
            Response::failed(Some(request.package_name), INTERNAL_ERROR)
        }
    }
}
