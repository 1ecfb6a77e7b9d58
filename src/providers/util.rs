use crate::core::error::{PriceError, Result};
use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = concat!("commodity-prices/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client a source uses for all of its requests.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Issues a GET and returns the body decoded to text.
///
/// Non-success statuses surface as network errors. The body is decoded with
/// the charset declared in its XML prolog.
pub async fn fetch_document(
    client: &reqwest::Client,
    document: &'static str,
    url: &str,
    query: &[(&str, String)],
) -> Result<String> {
    debug!(?query, "Requesting {} from {}", document, url);

    let request_url = if query.is_empty() {
        Url::parse(url)
    } else {
        Url::parse_with_params(url, query)
    }
    .map_err(|e| PriceError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let response = client
        .get(request_url)
        .send()
        .await?
        .error_for_status()?;
    let body = response.bytes().await?;

    debug!(bytes = body.len(), "Received {}", document);
    decode_body(document, &body)
}

/// Decodes raw XML bytes honoring the `encoding` pseudo-attribute of the XML
/// declaration. Documents without one are read as UTF-8.
pub fn decode_body(document: &'static str, body: &[u8]) -> Result<String> {
    let encoding = match declared_encoding(body) {
        Some(label) => Encoding::for_label(&label).ok_or_else(|| {
            PriceError::decode(
                document,
                format!("unsupported encoding '{}'", String::from_utf8_lossy(&label)),
            )
        })?,
        None => UTF_8,
    };

    let (text, actual, had_errors) = encoding.decode(body);
    if had_errors {
        return Err(PriceError::decode(
            document,
            format!("malformed {} content", actual.name()),
        ));
    }
    Ok(text.into_owned())
}

/// Reads the encoding label from the XML declaration, if the document starts with one.
fn declared_encoding(body: &[u8]) -> Option<Vec<u8>> {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    let mut reader = Reader::from_reader(body);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => decl.encoding()?.ok().map(|label| label.into_owned()),
        _ => None,
    }
}

pub fn parse_xml<T: DeserializeOwned>(document: &'static str, text: &str) -> Result<T> {
    quick_xml::de::from_str(text).map_err(|e| PriceError::decode(document, e))
}
