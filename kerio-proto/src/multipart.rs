//! `multipart/form-data` framing for a single uploaded file.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::request::CRLF;

/// Form field name of the uploaded part.
const FIELD_NAME: &str = "unknown";

/// File name announced for the uploaded part.
const FILE_NAME: &str = "newFile.bin";

/// Generates a boundary token: 21 dashes followed by 10 hex digits.
pub fn boundary() -> String {
    let mut h = RandomState::new().build_hasher();
    h.write_u32(std::process::id());
    h.write_u128(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    let hex = format!("{:016x}", h.finish());
    format!("---------------------{}", &hex[..10])
}

/// Wraps `payload` as the only part of a multipart body.
pub fn frame(boundary: &str, payload: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{boundary}{CRLF}\
         Content-Disposition: form-data; name=\"{FIELD_NAME}\"; filename=\"{FILE_NAME}\"{CRLF}\
         {CRLF}"
    );
    let tail = format!("{CRLF}--{boundary}--{CRLF}");

    let mut body = Vec::with_capacity(head.len() + payload.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(tail.as_bytes());
    body
}
