//! Route layout of the instrument gateway.
//!
//! The device name (e.g. `binp/nbi/adc0`) is carried as a single
//! percent-encoded path segment below [`DEVICES`].

/// Top-level path segment under which devices are addressed.
pub const DEVICES: &str = "devices";

/// `GET` lists attribute names, `GET .../{name}` reads one attribute.
pub const ATTRIBUTES: &str = "attributes";

/// `POST` with a [`crate::NamesRequest`] returns a [`crate::PropertyMap`].
pub const ATTRIBUTE_PROPERTIES: &str = "attribute_properties";

/// `POST` with a [`crate::NamesRequest`] returns an [`crate::InfoMap`].
pub const ATTRIBUTE_INFO: &str = "attribute_info";

/// Default attribute carrying the current shot identifier.
pub const DEFAULT_SHOT_ATTRIBUTE: &str = "Shot_id";

/// Default attribute carrying the seconds elapsed since the last shot began.
pub const DEFAULT_ELAPSED_ATTRIBUTE: &str = "Elapsed";
