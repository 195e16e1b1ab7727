//! One-shot confirmation messages carried across a redirect in a cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use shared::protocol::{FlashLevel, FlashMessage};
use url::form_urlencoded;

pub(crate) const FLASH_COOKIE: &str = "trans_flash";

/// Adds a `Set-Cookie` header carrying `flashes` to `headers`.
pub(crate) fn set_flashes(headers: &mut HeaderMap, flashes: &[FlashMessage]) {
    if flashes.is_empty() {
        return;
    }
    let mut encoded = form_urlencoded::Serializer::new(String::new());
    for flash in flashes {
        encoded.append_pair(flash.level.as_str(), &flash.message);
    }
    let cookie = format!(
        "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        encoded.finish()
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Reads the pending flashes from the request cookies. When any are found,
/// a header expiring the cookie is added to `response_headers`.
pub(crate) fn take_flashes(
    request_headers: &HeaderMap,
    response_headers: &mut HeaderMap,
) -> Vec<FlashMessage> {
    let Some(raw) = flash_cookie(request_headers) else {
        return Vec::new();
    };

    response_headers.append(
        header::SET_COOKIE,
        HeaderValue::from_static("trans_flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
    );

    form_urlencoded::parse(raw.as_bytes())
        .filter_map(|(level, message)| {
            FlashLevel::parse(&level).map(|level| FlashMessage {
                level,
                message: message.into_owned(),
            })
        })
        .collect()
}

fn flash_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == FLASH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
