use http::{Method, Request, Uri};
use lambda_runtime_api_client::{body::Body, build_request, BoxError};
use std::str::FromStr;

use crate::diagnostic::Diagnostic;

pub(crate) trait IntoRequest {
    fn into_req(self) -> Result<Request<Body>, BoxError>;
}

/// Serializes a [`Diagnostic`] to JSON, falling back to a fixed body if serialization itself
/// fails. The Runtime API must still receive a report even when we can't describe the failure
/// we're reporting.
fn diagnostic_body(diagnostic: &Diagnostic) -> Vec<u8> {
    serde_json::to_vec(diagnostic)
        .unwrap_or_else(|_| br#"{"errorType":"jsonEncoding","errorMessage":"unknown error"}"#.to_vec())
}

// /runtime/invocation/next
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct NextEventRequest;

impl IntoRequest for NextEventRequest {
    fn into_req(self) -> Result<Request<Body>, BoxError> {
        let req = build_request()
            .method(Method::GET)
            .uri(Uri::from_static("/2018-06-01/runtime/invocation/next"))
            .body(Body::empty())?;
        Ok(req)
    }
}

// /runtime/invocation/{AwsRequestId}/response
pub(crate) struct EventCompletionRequest<'a> {
    pub(crate) request_id: &'a str,
    pub(crate) body: Option<bytes::Bytes>,
}

impl<'a> IntoRequest for EventCompletionRequest<'a> {
    fn into_req(self) -> Result<Request<Body>, BoxError> {
        let uri = format!("/2018-06-01/runtime/invocation/{}/response", self.request_id);
        let uri = Uri::from_str(&uri)?;

        let body = match self.body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };

        let req = build_request().method(Method::POST).uri(uri).body(body)?;
        Ok(req)
    }
}

// /runtime/invocation/{AwsRequestId}/error
pub(crate) struct EventErrorRequest<'a> {
    pub(crate) request_id: &'a str,
    pub(crate) diagnostic: Diagnostic,
}

impl<'a> EventErrorRequest<'a> {
    pub(crate) fn new(request_id: &'a str, diagnostic: Diagnostic) -> EventErrorRequest<'a> {
        EventErrorRequest { request_id, diagnostic }
    }
}

impl<'a> IntoRequest for EventErrorRequest<'a> {
    fn into_req(self) -> Result<Request<Body>, BoxError> {
        let uri = format!("/2018-06-01/runtime/invocation/{}/error", self.request_id);
        let uri = Uri::from_str(&uri)?;
        let body = Body::from(diagnostic_body(&self.diagnostic));

        let req = build_request()
            .method(Method::POST)
            .uri(uri)
            .header("lambda-runtime-function-error-type", "unhandled")
            .body(body)?;
        Ok(req)
    }
}

// /runtime/init/error
pub(crate) struct InitErrorRequest {
    pub(crate) diagnostic: Diagnostic,
}

impl InitErrorRequest {
    pub(crate) fn new(diagnostic: Diagnostic) -> InitErrorRequest {
        InitErrorRequest { diagnostic }
    }
}

impl IntoRequest for InitErrorRequest {
    fn into_req(self) -> Result<Request<Body>, BoxError> {
        let uri = Uri::from_static("/2018-06-01/runtime/init/error");
        let body = Body::from(diagnostic_body(&self.diagnostic));

        let req = build_request()
            .method(Method::POST)
            .uri(uri)
            .header("lambda-runtime-function-error-type", "unhandled")
            .body(body)?;
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_event_request_has_expected_shape() {
        let req = NextEventRequest.into_req().unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri(), &Uri::from_static("/2018-06-01/runtime/invocation/next"));
        assert!(req
            .headers()
            .get("User-Agent")
            .map(|h| h.to_str().unwrap().starts_with("aws-lambda-rust/"))
            .unwrap_or(false));
    }

    #[test]
    fn event_completion_request_has_expected_shape() {
        let req = EventCompletionRequest {
            request_id: "id",
            body: Some(bytes::Bytes::from_static(b"\"hello, world!\"")),
        };
        let req = req.into_req().unwrap();
        let expected = Uri::from_static("/2018-06-01/runtime/invocation/id/response");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), &expected);
    }

    #[test]
    fn event_error_request_has_expected_shape() {
        let diagnostic = Diagnostic {
            error_type: "InvalidEventDataError".into(),
            error_message: "Error parsing event data".into(),
        };
        let req = EventErrorRequest::new("id", diagnostic).into_req().unwrap();
        let expected = Uri::from_static("/2018-06-01/runtime/invocation/id/error");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), &expected);
        assert_eq!(req.headers()["lambda-runtime-function-error-type"], "unhandled");
    }

    #[test]
    fn init_error_request_has_expected_shape() {
        let diagnostic = Diagnostic {
            error_type: "runtime.InitError".into(),
            error_message: "bootstrap failed".into(),
        };
        let req = InitErrorRequest::new(diagnostic).into_req().unwrap();
        let expected = Uri::from_static("/2018-06-01/runtime/init/error");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), &expected);
    }
}
