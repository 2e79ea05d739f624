//! Channel discovery: which remote attributes are cached, and how channels pair up.

use alloc::sync::Arc;
use core::time::Duration;

use thiserror::Error as ThisError;
use tracing::{debug, info};

use adcproxy_common::{PropertyMap, PropertySet};

use crate::remote::{RemoteError, RemoteSource, with_timeout};

/// Property that marks a channel for data caching.
pub const SAVE_DATA_PROPERTY: &str = "save_data";
/// Property that marks a channel for logging; also enables caching.
pub const SAVE_LOG_PROPERTY: &str = "save_log";

const TRUE_TOKENS: [&str; 5] = ["true", "on", "1", "y", "yes"];
const FALSE_TOKENS: [&str; 5] = ["false", "off", "0", "n", "no"];

/// Result of parsing a boolean property token.
///
/// Tokens outside the known vocabularies are [`TriState::Undetermined`]; the
/// caller decides what that means via [`TriState::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    True,
    False,
    Undetermined,
}

impl TriState {
    /// Parse a token case-insensitively against the true/false vocabularies.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_lowercase();
        if TRUE_TOKENS.contains(&token.as_str()) {
            Self::True
        } else if FALSE_TOKENS.contains(&token.as_str()) {
            Self::False
        } else {
            Self::Undetermined
        }
    }

    /// Collapse to a plain boolean, mapping [`TriState::Undetermined`] to `undetermined_as`.
    #[must_use]
    pub const fn resolve(self, undetermined_as: bool) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Undetermined => undetermined_as,
        }
    }
}

/// Read a boolean property; absent or empty means false.
#[must_use]
pub fn flag(properties: &PropertySet, key: &str) -> TriState {
    properties
        .get(key)
        .and_then(|values| values.first())
        .map_or(TriState::False, |token| TriState::parse(token))
}

/// Naming rule tying a primary channel to its companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNaming {
    pub primary_prefix: String,
    pub companion_prefix: String,
}

impl Default for ChannelNaming {
    fn default() -> Self {
        Self {
            primary_prefix: "chany".to_string(),
            companion_prefix: "chanx".to_string(),
        }
    }
}

impl ChannelNaming {
    #[must_use]
    pub fn is_primary(&self, name: &str) -> bool {
        name.starts_with(&self.primary_prefix)
    }

    /// Companion of a primary channel, e.g. `chany3` => `chanx3`.
    ///
    /// Every occurrence of the primary prefix is substituted, so `chanychany`
    /// pairs with `chanxchanx`. Returns `None` for names that are not primary channels.
    #[must_use]
    pub fn companion_of(&self, primary: &str) -> Option<String> {
        self.is_primary(primary)
            .then(|| primary.replace(&self.primary_prefix, &self.companion_prefix))
    }
}

/// A primary channel and its companion; always refreshed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPair {
    pub primary: String,
    pub companion: String,
}

/// Outcome of one discovery run against the remote device.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Enabled primary channels, in remote listing order.
    pub selection: Vec<String>,
    /// Properties of every remote attribute.
    pub properties: PropertyMap,
}

/// Failure of a discovery run; the registry keeps its previous selection.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
    #[error("failed to list remote attributes")]
    ListAttributes(#[source] RemoteError),
    #[error("failed to read remote attribute properties")]
    ReadProperties(#[source] RemoteError),
}

/// Primary channels enabled for caching, in the order of `names`.
///
/// A channel is enabled iff `save_data` or `save_log` parses to true.
/// Undetermined tokens count as false.
#[must_use]
pub fn select(names: &[String], properties: &PropertyMap, naming: &ChannelNaming) -> Vec<String> {
    let empty = PropertySet::new();
    names
        .iter()
        .filter(|name| naming.is_primary(name))
        .filter(|name| {
            let props = properties.get(name.as_str()).unwrap_or(&empty);
            let save_data = flag(props, SAVE_DATA_PROPERTY);
            let save_log = flag(props, SAVE_LOG_PROPERTY);
            if matches!(save_data, TriState::Undetermined)
                || matches!(save_log, TriState::Undetermined)
            {
                debug!(channel = %name, ?save_data, ?save_log, "unrecognized save flag, treating as false");
            }
            save_data.resolve(false) || save_log.resolve(false)
        })
        .cloned()
        .collect()
}

/// Fetch the attribute list and its properties, and select the enabled channels.
///
/// # Errors
///
/// Returns a [`DiscoveryError`] if either remote call fails or times out.
#[tracing::instrument(skip_all, err(Display))]
pub async fn discover<S: RemoteSource>(
    source: &S,
    naming: &ChannelNaming,
    limit: Option<Duration>,
) -> Result<Discovery, DiscoveryError> {
    let names = with_timeout("list_attribute_names", limit, source.list_attribute_names())
        .await
        .map_err(DiscoveryError::ListAttributes)?;
    let properties = with_timeout("attribute_properties", limit, source.attribute_properties(&names))
        .await
        .map_err(DiscoveryError::ReadProperties)?;
    let selection = select(&names, &properties, naming);
    info!(
        attributes = names.len(),
        selected = selection.len(),
        "Discovered channels"
    );
    Ok(Discovery {
        selection,
        properties,
    })
}

/// The current channel selection and the property snapshot it was derived from.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    naming: ChannelNaming,
    selection: Vec<String>,
    properties: Arc<PropertyMap>,
    discovered: bool,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new(naming: ChannelNaming) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    /// Replace the selection and property snapshot with a fresh discovery.
    pub fn install(&mut self, discovery: Discovery) {
        self.selection = discovery.selection;
        self.properties = Arc::new(discovery.properties);
        self.discovered = true;
    }

    /// Whether a discovery has ever succeeded.
    #[must_use]
    pub const fn is_discovered(&self) -> bool {
        self.discovered
    }

    #[must_use]
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    #[must_use]
    pub fn naming(&self) -> &ChannelNaming {
        &self.naming
    }

    /// Shared handle to the full property snapshot.
    #[must_use]
    pub fn properties(&self) -> Arc<PropertyMap> {
        Arc::clone(&self.properties)
    }

    /// Properties of a single attribute, selected or not.
    #[must_use]
    pub fn properties_of(&self, name: &str) -> Option<&PropertySet> {
        self.properties.get(name)
    }

    /// Every selected channel with its companion.
    #[must_use]
    pub fn pairs(&self) -> Vec<ChannelPair> {
        self.selection
            .iter()
            .filter_map(|primary| {
                self.naming.companion_of(primary).map(|companion| ChannelPair {
                    primary: primary.clone(),
                    companion,
                })
            })
            .collect()
    }
}
