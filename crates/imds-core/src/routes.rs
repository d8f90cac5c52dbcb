//! Request paths served by the mock.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Root of the metadata category tree.
pub const METADATA_PATH: &str = "/latest/meta-data";

/// Session token issuance.
pub const TOKEN_PATH: &str = "/latest/api/token";

/// The category path below [`METADATA_PATH`] for a full request path,
/// e.g. `/latest/meta-data/iam/info/` → `/iam/info/`.
pub fn category_path(request_path: &str) -> Option<&str> {
    request_path.strip_prefix(METADATA_PATH).filter(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// A request path with percent escapes decoded, e.g. a tag key
/// `Team%20Name` → `Team Name`. Invalid UTF-8 is replaced lossily.
pub fn decoded_path(request_path: &str) -> Cow<'_, str> {
    if request_path.contains('%') {
        percent_decode_str(request_path).decode_utf8_lossy()
    } else {
        Cow::Borrowed(request_path)
    }
}
