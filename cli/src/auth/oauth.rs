//! OAuth authorization-code helpers for the Bloret provider.
//!
//! The provider redirects the browser to the registered redirect URI with a
//! `code` query parameter once the user signs in. The code is then exchanged
//! for an [`Identity`](crate::auth::Identity) by
//! [`BloretApiClient::exchange_code`](crate::client::BloretApiClient::exchange_code).

use url::Url;

use crate::config::ApiConfig;
use crate::error::Result;

const AUTHORIZE_PATH: &str = "/app/oauth";

/// Build the URL the user opens to sign in.
///
/// # Errors
///
/// Returns an error if the configured base URL cannot be joined.
pub fn authorize_url(config: &ApiConfig) -> Result<Url> {
    let mut url = config.endpoint(AUTHORIZE_PATH)?;
    url.query_pairs_mut()
        .append_pair("app_id", &config.app_id)
        .append_pair("redirect_uri", &config.redirect_uri);
    Ok(url)
}

/// Pull the authorization code out of user input.
///
/// Accepts either the full redirect URL the browser landed on or the bare
/// code. Returns `None` for empty input or a redirect URL without a code.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains("://") {
        let url = Url::parse(input).ok()?;
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty());
    }

    Some(input.to_string())
}

/// Open the authorization URL in the default browser.
///
/// Returns `true` if the browser was opened successfully.
pub fn open_browser(url: &Url) -> bool {
    open::that(url.as_str()).is_ok()
}
