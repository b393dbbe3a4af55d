//! Byte-buffer ↔ typed input/output translation.
//!
//! A [`Codec`] is a pair of pure functions bound to a user-chosen input and output type. The
//! runner applies [`Codec::decode`] to the invocation payload before calling the handler, and
//! [`Codec::encode`] to the handler's output before reporting a response. Both directions have
//! their own failure channel so that `requestDecoding` and `responseEncoding` can be told apart
//! in the Runtime API error report.

use bytes::Bytes;
use lambda_runtime_api_client::BoxError;

/// Translates between wire bytes and a handler's typed input/output.
pub trait Codec<In, Out>: Send + Sync {
    /// Decode the invocation payload into the handler's input type.
    fn decode(&self, payload: Bytes) -> Result<In, BoxError>;

    /// Encode the handler's output into a response body.
    ///
    /// Returning `Ok(None)` produces an empty response body, which is only meaningful for
    /// handlers whose output type is logically `void`.
    fn encode(&self, value: Out) -> Result<Option<Bytes>, BoxError>;
}

/// Identity codec: the payload is handed to the handler unchanged, and the handler's output
/// bytes are sent back unchanged. Accepts empty payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl Codec<Bytes, Bytes> for RawCodec {
    fn decode(&self, payload: Bytes) -> Result<Bytes, BoxError> {
        Ok(payload)
    }

    fn encode(&self, value: Bytes) -> Result<Option<Bytes>, BoxError> {
        Ok(Some(value))
    }
}

/// UTF-8 codec for handlers that work with `String` input/output.
///
/// Invalid UTF-8 in the payload is a decode error. A handler that returns `()` (the `void`
/// case from the specification) produces no response body.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec<String, String> for StringCodec {
    fn decode(&self, payload: Bytes) -> Result<String, BoxError> {
        String::from_utf8(payload.to_vec()).map_err(|err| Box::new(err) as BoxError)
    }

    fn encode(&self, value: String) -> Result<Option<Bytes>, BoxError> {
        Ok(Some(Bytes::from(value)))
    }
}

impl Codec<String, ()> for StringCodec {
    fn decode(&self, payload: Bytes) -> Result<String, BoxError> {
        String::from_utf8(payload.to_vec()).map_err(|err| Box::new(err) as BoxError)
    }

    fn encode(&self, _value: ()) -> Result<Option<Bytes>, BoxError> {
        Ok(None)
    }
}

/// JSON codec used by default when the handler declares a typed input and output.
///
/// Decode errors surface the failing JSON pointer path (via `serde_path_to_error`), matching
/// the diagnostics the deserializer already produces for the built-in event deserialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<In, Out> Codec<In, Out> for JsonCodec
where
    In: for<'de> serde::Deserialize<'de>,
    Out: serde::Serialize,
{
    fn decode(&self, payload: Bytes) -> Result<In, BoxError> {
        let jd = &mut serde_json::Deserializer::from_slice(&payload);
        serde_path_to_error::deserialize(jd).map_err(|err| Box::new(err) as BoxError)
    }

    fn encode(&self, value: Out) -> Result<Option<Bytes>, BoxError> {
        let bytes = serde_json::to_vec(&value).map_err(|err| Box::new(err) as BoxError)?;
        Ok(Some(Bytes::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codec_round_trips_arbitrary_bytes() {
        let codec = RawCodec;
        let payload = Bytes::from_static(b"\x00\x01binary\xff");
        let decoded = codec.decode(payload.clone()).unwrap();
        let encoded = codec.encode(decoded).unwrap().unwrap();
        assert_eq!(encoded, payload);
    }

    #[test]
    fn raw_codec_accepts_empty_payload() {
        let codec = RawCodec;
        let decoded = codec.decode(Bytes::new()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn string_codec_round_trips_valid_utf8() {
        let codec = StringCodec;
        let s = "héllo wörld".to_string();
        let decoded: String = Codec::<String, String>::decode(&codec, Bytes::from(s.clone())).unwrap();
        assert_eq!(decoded, s);
        let encoded = Codec::<String, String>::encode(&codec, decoded).unwrap().unwrap();
        assert_eq!(encoded, Bytes::from(s));
    }

    #[test]
    fn string_codec_rejects_invalid_utf8() {
        let codec = StringCodec;
        let bad = Bytes::from_static(&[0xff, 0xfe, 0xfd]);
        assert!(Codec::<String, String>::decode(&codec, bad).is_err());
    }

    #[test]
    fn string_codec_void_output_has_no_body() {
        let codec = StringCodec;
        let encoded = Codec::<String, ()>::encode(&codec, ()).unwrap();
        assert!(encoded.is_none());
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn json_codec_round_trips() {
        let codec = JsonCodec;
        let payload = Bytes::from_static(br#"{"x":1,"y":2}"#);
        let decoded: Point = codec.decode(payload).unwrap();
        assert_eq!(decoded, Point { x: 1, y: 2 });
        let encoded = codec.encode(decoded).unwrap().unwrap();
        let roundtrip: Point = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(roundtrip, Point { x: 1, y: 2 });
    }

    #[test]
    fn json_codec_decode_error_names_the_path() {
        let codec = JsonCodec;
        let payload = Bytes::from_static(br#"{"x":"not a number","y":2}"#);
        let err = Codec::<Point, Point>::decode(&codec, payload).unwrap_err();
        assert!(err.to_string().contains('x'));
    }
}
