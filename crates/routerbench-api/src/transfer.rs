// Transfer patterns
//
// The three ways of pulling a dataset through the Router, plus the plain
// polled request. Each one captures `sent_at` before its first network call
// and folds every failure into the returned `TransferResult`; none of them
// returns an `Err`.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::client::{RouterClient, ensure_success};
use crate::demux::StreamDemux;
use crate::error::Error;
use crate::models::{DatasetRequest, RequestAccepted, RouterStatus, StatusResponse, StreamTicket};
use crate::result::{Pattern, TransferRequest, TransferResult, TransferStatus};

/// Something that can run one transfer to completion.
///
/// Implemented by [`RouterClient`]; the load engine is generic over it so
/// runs can be driven by stubs.
pub trait Transfer: Send + Sync {
    fn transfer(
        &self,
        pattern: Pattern,
        request: &TransferRequest,
    ) -> impl Future<Output = TransferResult> + Send;
}

impl Transfer for RouterClient {
    async fn transfer(&self, pattern: Pattern, request: &TransferRequest) -> TransferResult {
        match pattern {
            Pattern::Buffered => self.buffered_fetch(request).await,
            Pattern::Streaming => self.stream_fetch(request).await,
            Pattern::Offload => self.offload_fetch(request).await,
        }
    }
}

/// `floor(deadline / interval)` status polls, at least one.
pub fn poll_attempts(deadline: Duration, interval: Duration) -> u32 {
    let per_poll = interval.as_millis().max(1);
    u32::try_from(deadline.as_millis() / per_poll)
        .unwrap_or(u32::MAX)
        .max(1)
}

impl RouterClient {
    fn dataset_body(request: &TransferRequest) -> DatasetRequest<'_> {
        DatasetRequest {
            mac_address: &request.device_address,
            dataset_name: &request.dataset_name,
        }
    }

    // ── Pattern A ────────────────────────────────────────────────────

    /// Buffered fetch: the Router assembles the dataset and returns it in
    /// one response.
    ///
    /// `POST /datasets/request-sync?timeout=N`
    pub async fn buffered_fetch(&self, request: &TransferRequest) -> TransferResult {
        let mut result = TransferResult::started(Some(Pattern::Buffered));
        let server_timeout = request.deadline.as_secs().max(1);

        let response: Result<StatusResponse, Error> = async {
            let mut url = self.endpoint("datasets/request-sync")?;
            url.query_pairs_mut()
                .append_pair("timeout", &server_timeout.to_string());
            self.post_json(url, &Self::dataset_body(request), request.deadline)
                .await
        }
        .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return result.fail(&e),
        };
        result.stop_clock();

        let mut result = result
            .with_request_id(response.request_id.clone().unwrap_or_default())
            .with_timestamps(response.timestamps);
        result.payload_size = response.payload_size();
        result.error = response.error_message;

        match response.status {
            RouterStatus::Completed | RouterStatus::Error => {
                result.finish(TransferStatus::from(response.status))
            }
            other => {
                debug!(status = ?other, "sync request answered before completion");
                result.time_out(format!(
                    "Router did not finish within {server_timeout}s (status {other:?})"
                ))
            }
        }
    }

    // ── Pattern B ────────────────────────────────────────────────────

    /// Streaming fetch with the payload discarded after counting.
    pub async fn stream_fetch(&self, request: &TransferRequest) -> TransferResult {
        self.stream_fetch_into(request, &mut tokio::io::sink()).await
    }

    /// Streaming fetch: initiate, wait for the producer, then read the
    /// stream through a [`StreamDemux`], writing payload to `sink`.
    ///
    /// A stream that ends, or outlives `stream_deadline`, without a marker
    /// still counts as `completed` with what was received and no metadata.
    pub async fn stream_fetch_into<W>(&self, request: &TransferRequest, sink: &mut W) -> TransferResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut result = TransferResult::started(Some(Pattern::Streaming));

        let ticket: StreamTicket = match self.initiate("datasets/request-stream", request).await {
            Ok(ticket) => ticket,
            Err(e) => return result.fail(&e),
        };
        result = result.with_request_id(ticket.request_id.as_str());

        let url = match ticket
            .stream_url
            .as_deref()
            .ok_or(Error::MissingField("stream_url"))
            .and_then(|locator| self.resolve(locator))
        {
            Ok(url) => url,
            Err(e) => return result.fail(&e),
        };

        tokio::time::sleep(self.options.stream_grace).await;

        debug!("GET {}", url);
        let opened = tokio::time::timeout(self.options.stream_deadline, async {
            let resp = self
                .http
                .get(url)
                .timeout(self.options.stream_deadline + self.options.trailer_allowance)
                .send()
                .await?;
            ensure_success(resp).await
        })
        .await;
        let response = match opened {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return result.fail(&e),
            Err(_) => {
                let timeout_secs = self.options.stream_deadline.as_secs();
                return result.fail(&Error::Timeout { timeout_secs });
            }
        };

        let mut chunks = pin!(response.bytes_stream());
        let mut demux = StreamDemux::new();

        let read = tokio::time::timeout(
            self.options.stream_deadline,
            read_payload(&mut chunks, &mut demux, sink),
        )
        .await;
        match read {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return result.fail(&e),
            Err(_) => warn!(
                request_id = %result.request_id,
                flushed = demux.flushed_bytes(),
                "stream deadline reached without completion marker"
            ),
        }
        result.stop_clock();

        if demux.marker_found() && !demux.is_settled() {
            let _ = tokio::time::timeout(
                self.options.trailer_allowance,
                read_trailer(&mut chunks, &mut demux),
            )
            .await;
        }

        let rest = demux.finish();
        if let Err(e) = flush(sink, &rest).await {
            return result.fail(&e);
        }

        result
            .with_timestamps(demux.metadata())
            .complete(Some(demux.flushed_bytes()))
    }

    // ── Pattern C ────────────────────────────────────────────────────

    /// Offload fetch with the download discarded after counting.
    pub async fn offload_fetch(&self, request: &TransferRequest) -> TransferResult {
        self.offload_fetch_into(request, &mut tokio::io::sink()).await
    }

    /// Offload fetch: initiate, poll status until a download URL appears,
    /// then pull the object straight from storage into `sink`.
    pub async fn offload_fetch_into<W>(&self, request: &TransferRequest, sink: &mut W) -> TransferResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut result = TransferResult::started(Some(Pattern::Offload));

        let accepted: RequestAccepted =
            match self.initiate("datasets/request-offload", request).await {
                Ok(accepted) => accepted,
                Err(e) => return result.fail(&e),
            };
        result = result.with_request_id(accepted.request_id.as_str());

        let attempts = poll_attempts(request.deadline, self.options.poll_interval);
        let Some(status) = self.poll_until_terminal(&accepted.request_id, attempts).await else {
            return result.time_out(format!("Offload not ready after {attempts} status polls"));
        };
        result = result.with_timestamps(status.timestamps);

        if status.status == RouterStatus::Error {
            result.error = Some(
                status
                    .error_message
                    .unwrap_or_else(|| "Router reported an error".into()),
            );
            return result.finish(TransferStatus::Error);
        }

        let url = match status
            .download_url
            .as_deref()
            .ok_or(Error::MissingField("download_url"))
            .and_then(|locator| self.resolve(locator))
        {
            Ok(url) => url,
            Err(e) => return result.fail(&e),
        };

        match self.download(url, request.deadline, sink).await {
            Ok(counted) => {
                let reported = status.data_size_bytes.unwrap_or(0);
                result.complete(Some(counted.max(reported)))
            }
            Err(e) => result.fail(&e),
        }
    }

    // ── Polled request ───────────────────────────────────────────────

    /// Plain request: initiate, then (if `wait`) poll status until the
    /// Router reports a terminal state with the data inline.
    ///
    /// `POST /datasets/request`
    pub async fn request_dataset(&self, request: &TransferRequest, wait: bool) -> TransferResult {
        let mut result = TransferResult::started(None);

        let accepted: RequestAccepted = match self.initiate("datasets/request", request).await {
            Ok(accepted) => accepted,
            Err(e) => return result.fail(&e),
        };
        result = result.with_request_id(accepted.request_id.as_str());

        if !wait {
            return result;
        }

        let attempts = self.options.max_poll_attempts.max(1);
        let Some(status) = self.poll_until_terminal(&accepted.request_id, attempts).await else {
            return result.time_out(format!("Timeout after {attempts} attempts"));
        };
        result.stop_clock();

        let mut result = result.with_timestamps(status.timestamps);
        result.payload_size = status.payload_size();
        result.error = status.error_message;
        result.finish(TransferStatus::from(status.status))
    }

    // ── Shared steps ─────────────────────────────────────────────────

    async fn initiate<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &TransferRequest,
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        self.post_json(url, &Self::dataset_body(request), request.deadline)
            .await
    }

    /// Poll status until `completed`/`error` or the budget runs out.
    /// Failed polls (transport errors, non-200) use up an attempt.
    async fn poll_until_terminal(&self, request_id: &str, attempts: u32) -> Option<StatusResponse> {
        for attempt in 1..=attempts {
            match self.get_status(request_id).await {
                Ok(status) if status.status.is_terminal() => {
                    debug!(request_id, attempt, status = ?status.status, "request reached terminal state");
                    return Some(status);
                }
                Ok(status) => trace!(request_id, attempt, status = ?status.status, "still waiting"),
                Err(e) => debug!(request_id, attempt, error = %e, "status poll failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }
        None
    }

    /// Stream an object into `sink`, returning the number of bytes received.
    async fn download<W>(&self, url: url::Url, timeout: Duration, sink: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + Send,
    {
        debug!("GET {}", url);
        let resp = self.http.get(url).timeout(timeout).send().await?;
        let resp = ensure_success(resp).await?;

        let mut chunks = pin!(resp.bytes_stream());
        let mut counted: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            counted += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(counted)
    }
}

/// Feed chunks until the marker shows up or the stream ends. A broken
/// connection ends the stream like a close does; only sink failures are
/// errors.
async fn read_payload<S, W>(chunks: &mut S, demux: &mut StreamDemux, sink: &mut W) -> Result<(), Error>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, flushed = demux.flushed_bytes(), "stream read failed, treating as end of stream");
                break;
            }
        };
        let payload = demux.push(&chunk);
        if !payload.is_empty() {
            sink.write_all(&payload).await?;
        }
        if demux.marker_found() {
            break;
        }
    }
    Ok(())
}

/// After the marker: keep reading until the metadata document parses.
async fn read_trailer<S>(chunks: &mut S, demux: &mut StreamDemux)
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    while let Some(Ok(chunk)) = chunks.next().await {
        demux.push(&chunk);
        if demux.is_settled() {
            break;
        }
    }
}

/// Write the last held-back bytes and flush the sink.
async fn flush<W: AsyncWrite + Unpin>(sink: &mut W, payload: &[u8]) -> Result<(), Error> {
    if !payload.is_empty() {
        sink.write_all(payload).await?;
    }
    sink.flush().await?;
    Ok(())
}
