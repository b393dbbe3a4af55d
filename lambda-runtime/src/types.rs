use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Client context sent by the AWS Mobile SDK.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ClientContext {
    /// Information about the mobile application invoking the function.
    #[serde(default)]
    pub client: ClientApplication,
    /// Custom properties attached to the mobile event context.
    #[serde(default)]
    pub custom: HashMap<String, String>,
    /// Environment settings from the mobile client.
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// AWS Mobile SDK client fields.
#[derive(Serialize, Deserialize, Default, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientApplication {
    /// The mobile app installation id.
    pub installation_id: String,
    /// The app title for the mobile app as registered with AWS' mobile services.
    pub app_title: String,
    /// The version name of the application as registered with AWS' mobile services.
    pub app_version_name: String,
    /// The app version code.
    pub app_version_code: String,
    /// The package name for the mobile application invoking the function.
    pub app_package_name: String,
}

/// Cognito identity information sent with the event.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct CognitoIdentity {
    /// The unique identity id for the Cognito credentials invoking the function.
    pub identity_id: String,
    /// The identity pool id the caller is "registered" with.
    pub identity_pool_id: String,
}

/// One invocation delivered by `GET /next`, decoded from response headers plus its body.
///
/// Produced by [`crate::client::RuntimeClient::next`]; consumed to build a [`Context`].
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Identity of the invocation; tracks completion at the control plane.
    pub request_id: String,
    /// X-Ray trace header value, if present.
    pub trace_id: Option<String>,
    /// ARN of the function/version/alias invoked.
    pub invoked_function_arn: Option<String>,
    /// Absolute wall-clock deadline, milliseconds since the Unix epoch.
    pub deadline: u64,
    /// Cognito identity, present only for AWS Mobile SDK invocations.
    pub identity: Option<CognitoIdentity>,
    /// Mobile client context, present only for AWS Mobile SDK invocations.
    pub client_context: Option<ClientContext>,
    /// The invocation payload. May be empty.
    pub payload: Bytes,
}

impl Invocation {
    pub(crate) fn from_headers(headers: &HeaderMap, payload: Bytes) -> Result<Self, ClientError> {
        let request_id = header_str(headers, "lambda-runtime-aws-request-id")
            .ok_or_else(|| ClientError::NoContext("missing lambda-runtime-aws-request-id header".into()))?
            .to_owned();

        let deadline = header_str(headers, "lambda-runtime-deadline-ms")
            .ok_or_else(|| ClientError::NoContext("missing lambda-runtime-deadline-ms header".into()))?
            .parse::<u64>()
            .map_err(|err| ClientError::NoContext(format!("invalid lambda-runtime-deadline-ms header: {err}")))?;

        let trace_id = header_str(headers, "lambda-runtime-trace-id").map(str::to_owned);
        let invoked_function_arn = header_str(headers, "lambda-runtime-invoked-function-arn").map(str::to_owned);

        let client_context = parse_header_json(headers, "lambda-runtime-client-context")?;
        let identity = parse_header_json(headers, "lambda-runtime-cognito-identity")?;

        Ok(Invocation {
            request_id,
            trace_id,
            invoked_function_arn,
            deadline,
            identity,
            client_context,
            payload,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v: &HeaderValue| v.to_str().ok())
}

fn parse_header_json<T>(headers: &HeaderMap, name: &str) -> Result<Option<T>, ClientError>
where
    T: for<'de> Deserialize<'de>,
{
    match header_str(headers, name) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|err| ClientError::NoContext(format!("malformed {name} header: {err}"))),
    }
}

/// The Lambda function execution context handed to every handler invocation.
///
/// Built from an [`Invocation`]; discarded once the response for it has been reported. The
/// [`Context::remaining_time`] query reflects the instant it is called, not the instant the
/// context was constructed.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct Context {
    /// The AWS request ID generated by the Lambda service.
    pub request_id: String,
    /// The execution deadline for the current invocation, milliseconds since the Unix epoch.
    pub deadline: u64,
    /// The ARN of the Lambda function being invoked, if supplied.
    pub invoked_function_arn: Option<String>,
    /// The X-Ray trace ID for the current invocation, if present.
    pub xray_trace_id: Option<String>,
    /// The client context object sent by the AWS Mobile SDK, if the function was invoked that way.
    pub client_context: Option<ClientContext>,
    /// The Cognito identity that invoked the function, if the invocation carried one.
    pub identity: Option<CognitoIdentity>,
}

impl Context {
    pub(crate) fn new(invocation: &Invocation) -> Self {
        Context {
            request_id: invocation.request_id.clone(),
            deadline: invocation.deadline,
            invoked_function_arn: invocation.invoked_function_arn.clone(),
            xray_trace_id: invocation.trace_id.clone(),
            client_context: invocation.client_context.clone(),
            identity: invocation.identity.clone(),
        }
    }

    /// Time remaining until the invocation's deadline, as a signed number of milliseconds.
    ///
    /// Negative once the deadline has passed; the runtime does not abort a handler on its own
    /// just because this has gone negative, it only makes the value available to one.
    pub fn remaining_time(&self) -> i64 {
        let now = now_millis();
        self.deadline as i64 - now as i64
    }

    /// A `tracing` span carrying this invocation's request id and, if present, trace id, so
    /// that log records emitted during the invocation inherit them without extra plumbing.
    pub fn request_span(&self) -> tracing::Span {
        match &self.xray_trace_id {
            Some(trace_id) => {
                tracing::info_span!("lambda invoke", awsRequestId = %self.request_id, awsTraceId = %trace_id)
            }
            None => tracing::info_span!("lambda invoke", awsRequestId = %self.request_id),
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Incoming Lambda request containing the decoded event payload and its invocation context.
#[derive(Clone, Debug)]
pub struct LambdaEvent<T> {
    /// Event payload.
    pub payload: T,
    /// Invocation context.
    pub context: Context,
}

impl<T> LambdaEvent<T> {
    /// Creates a new Lambda request.
    pub fn new(payload: T, context: Context) -> Self {
        Self { payload, context }
    }

    /// Split the Lambda event into its payload and context.
    pub fn into_parts(self) -> (T, Context) {
        (self.payload, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn parses_minimal_headers() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
        ]);
        let inv = Invocation::from_headers(&h, Bytes::new()).unwrap();
        assert_eq!(inv.request_id, "my-id");
        assert_eq!(inv.deadline, 123);
        assert!(inv.invoked_function_arn.is_none());
    }

    #[test]
    fn parses_arn_and_trace_id() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
            ("lambda-runtime-invoked-function-arn", "arn::myarn"),
            ("lambda-runtime-trace-id", "arn::myarn"),
        ]);
        let inv = Invocation::from_headers(&h, Bytes::new()).unwrap();
        assert_eq!(inv.invoked_function_arn.as_deref(), Some("arn::myarn"));
        assert_eq!(inv.trace_id.as_deref(), Some("arn::myarn"));
    }

    #[test]
    fn missing_request_id_is_no_context() {
        let h = headers(&[("lambda-runtime-deadline-ms", "123")]);
        let err = Invocation::from_headers(&h, Bytes::new()).unwrap_err();
        assert!(matches!(err, ClientError::NoContext(_)));
    }

    #[test]
    fn missing_deadline_is_no_context() {
        let h = headers(&[("lambda-runtime-aws-request-id", "my-id")]);
        let err = Invocation::from_headers(&h, Bytes::new()).unwrap_err();
        assert!(matches!(err, ClientError::NoContext(_)));
    }

    #[test]
    fn bad_deadline_is_no_context() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "not-a-number"),
        ]);
        assert!(Invocation::from_headers(&h, Bytes::new()).is_err());
    }

    #[test]
    fn parses_client_context_and_identity() {
        let client_context = ClientContext {
            client: ClientApplication::default(),
            custom: HashMap::new(),
            environment: HashMap::new(),
        };
        let identity = CognitoIdentity {
            identity_id: "id".into(),
            identity_pool_id: "pool".into(),
        };
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
            (
                "lambda-runtime-client-context",
                &serde_json::to_string(&client_context).unwrap(),
            ),
            (
                "lambda-runtime-cognito-identity",
                &serde_json::to_string(&identity).unwrap(),
            ),
        ]);
        let inv = Invocation::from_headers(&h, Bytes::new()).unwrap();
        assert_eq!(inv.client_context, Some(client_context));
        assert_eq!(inv.identity, Some(identity));
    }

    #[test]
    fn empty_client_context_resolves() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
            ("lambda-runtime-client-context", "{}"),
        ]);
        let inv = Invocation::from_headers(&h, Bytes::new()).unwrap();
        assert!(inv.client_context.is_some());
    }

    #[test]
    fn malformed_client_context_is_an_error() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
            ("lambda-runtime-client-context", "not json"),
        ]);
        assert!(Invocation::from_headers(&h, Bytes::new()).is_err());
    }

    #[test]
    fn empty_identity_is_an_error() {
        let h = headers(&[
            ("lambda-runtime-aws-request-id", "my-id"),
            ("lambda-runtime-deadline-ms", "123"),
            ("lambda-runtime-cognito-identity", "{}"),
        ]);
        assert!(Invocation::from_headers(&h, Bytes::new()).is_err());
    }

    #[test]
    fn remaining_time_reflects_past_deadline() {
        let ctx = Context {
            request_id: "id".into(),
            deadline: 1,
            invoked_function_arn: None,
            xray_trace_id: None,
            client_context: None,
            identity: None,
        };
        assert!(ctx.remaining_time() < 0);
    }
}
