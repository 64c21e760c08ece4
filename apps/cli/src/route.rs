use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::{fmt, str::FromStr};

// characters that cannot appear raw inside one path segment
const SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'?');

/// Every page the site serves, keyed by its URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Live { username: String, stream_id: String },
    Profile { username: String },
    ProfileStream { username: String, stream_id: String },
    League { segment_id: String },
    LeagueLogin { segment_id: String },
    Privacy,
    Support,
    Preferences { username: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no page at `{0}`")]
    Unknown(String),
}

impl Route {
    /// Query string and fragment are ignored, as is a trailing slash.
    /// Segments are percent-decoded before they are bound.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let unknown = || RouteError::Unknown(path.to_string());
        let bare = path.split(['?', '#']).next().unwrap_or_default();
        let bare = bare.strip_prefix('/').ok_or_else(unknown)?;
        let bare = bare.strip_suffix('/').unwrap_or(bare);
        if bare.is_empty() {
            return Ok(Route::Home);
        }

        let decoded = bare
            .split('/')
            .map(|p| match percent_decode_str(p).decode_utf8() {
                Ok(d) if !p.is_empty() => Ok(d.into_owned()),
                _ => Err(unknown()),
            })
            .collect::<Result<Vec<String>, _>>()?;
        let parts: Vec<&str> = decoded.iter().map(String::as_str).collect();
        let route = match parts.as_slice() {
            ["live", user, id] => Route::Live { username: user.to_string(), stream_id: id.to_string() },
            ["profile", user] => Route::Profile { username: user.to_string() },
            ["profile", user, id] => Route::ProfileStream { username: user.to_string(), stream_id: id.to_string() },
            ["burritoleague", seg] => Route::League { segment_id: seg.to_string() },
            ["burritoleague", seg, "login"] => Route::LeagueLogin { segment_id: seg.to_string() },
            ["settings", "privacy"] => Route::Privacy,
            ["settings", "support"] => Route::Support,
            ["account", user, "preferences"] => Route::Preferences { username: user.to_string() },
            _ => return Err(unknown()),
        };
        Ok(route)
    }

    /// Pages that render without talking to the API.
    pub fn is_static(&self) -> bool {
        matches!(self, Route::Privacy | Route::Support)
    }
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::parse(s)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enc = |s: &str| utf8_percent_encode(s, SEGMENT).to_string();
        match self {
            Route::Home => write!(f, "/"),
            Route::Live { username, stream_id } => write!(f, "/live/{}/{}", enc(username), enc(stream_id)),
            Route::Profile { username } => write!(f, "/profile/{}", enc(username)),
            Route::ProfileStream { username, stream_id } => {
                write!(f, "/profile/{}/{}", enc(username), enc(stream_id))
            }
            Route::League { segment_id } => write!(f, "/burritoleague/{}", enc(segment_id)),
            Route::LeagueLogin { segment_id } => write!(f, "/burritoleague/{}/login", enc(segment_id)),
            Route::Privacy => write!(f, "/settings/privacy"),
            Route::Support => write!(f, "/settings/support"),
            Route::Preferences { username } => write!(f, "/account/{}/preferences", enc(username)),
        }
    }
}
