//! The Runtime API client: `next`, `report_response`, `report_invocation_error`, and
//! `report_bootstrap_error`, built on [`lambda_runtime_api_client::Client`].

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use lambda_runtime_api_client::{body::Body, Client};

use crate::{
    diagnostic::Diagnostic,
    error::ClientError,
    requests::{EventCompletionRequest, EventErrorRequest, InitErrorRequest, IntoRequest, NextEventRequest},
    types::Invocation,
};

/// Thin wrapper around the transport client that speaks the three Runtime API endpoints the
/// adapter needs and translates their responses into the stable [`ClientError`] taxonomy.
pub(crate) struct RuntimeClient {
    client: Arc<Client>,
    request_timeout: Option<Duration>,
    keep_alive: bool,
}

impl RuntimeClient {
    pub(crate) fn new(client: Arc<Client>, request_timeout: Option<Duration>, keep_alive: bool) -> Self {
        Self {
            client,
            request_timeout,
            keep_alive,
        }
    }

    /// `GET /runtime/invocation/next`. Long-polls the control plane for the next invocation.
    pub(crate) async fn next(&self) -> Result<Invocation, ClientError> {
        let req = NextEventRequest
            .into_req()
            .map_err(ClientError::Transport)?;
        let (parts, body) = self.send(req).await?.into_parts();

        if parts.status != StatusCode::OK {
            return Err(ClientError::BadStatusCode(parts.status));
        }

        let content_length = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if content_length == Some(0) {
            return Err(ClientError::NoBody);
        }

        let bytes = body
            .collect()
            .await
            .map_err(|err| ClientError::Transport(Box::new(err)))?
            .to_bytes();
        if bytes.is_empty() {
            return Err(ClientError::NoBody);
        }

        Invocation::from_headers(&parts.headers, bytes)
    }

    /// `POST /runtime/invocation/{id}/response`.
    pub(crate) async fn report_response(&self, request_id: &str, body: Option<Bytes>) -> Result<(), ClientError> {
        let req = EventCompletionRequest { request_id, body }
            .into_req()
            .map_err(ClientError::Transport)?;
        self.send_and_check(req).await
    }

    /// `POST /runtime/invocation/{id}/error`.
    pub(crate) async fn report_invocation_error(
        &self,
        request_id: &str,
        diagnostic: Diagnostic,
    ) -> Result<(), ClientError> {
        let req = EventErrorRequest::new(request_id, diagnostic)
            .into_req()
            .map_err(ClientError::Transport)?;
        self.send_and_check(req).await
    }

    /// `POST /runtime/init/error`.
    pub(crate) async fn report_bootstrap_error(&self, diagnostic: Diagnostic) -> Result<(), ClientError> {
        let req = InitErrorRequest::new(diagnostic).into_req().map_err(ClientError::Transport)?;
        self.send_and_check(req).await
    }

    async fn send_and_check(&self, req: http::Request<Body>) -> Result<(), ClientError> {
        let rsp = self.send(req).await?;
        if !rsp.status().is_success() {
            return Err(ClientError::BadStatusCode(rsp.status()));
        }
        Ok(())
    }

    async fn send(&self, mut req: http::Request<Body>) -> Result<http::Response<hyper::body::Incoming>, ClientError> {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        req.headers_mut()
            .insert(http::header::CONNECTION, http::HeaderValue::from_static(connection));

        let call = self.client.call(req);
        let result = match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => call.await,
        };
        result.map_err(classify_transport_error)
    }
}

fn classify_transport_error(err: lambda_runtime_api_client::BoxError) -> ClientError {
    if is_connection_reset(err.as_ref()) {
        ClientError::ConnectionResetByPeer
    } else {
        ClientError::Transport(err)
    }
}

fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::ConnectionReset
                || io_err.kind() == std::io::ErrorKind::BrokenPipe
                || io_err.kind() == std::io::ErrorKind::UnexpectedEof
            {
                return true;
            }
        }
        source = err.source();
    }
    false
}
