//! Opening handshake (RFC 6455 §4.2).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::Request;

/// GUID appended to the client key before hashing (RFC 6455 §1.3).
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `base64(sha1(key || GUID))`.
pub fn accept_token(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Return the accept token if `request` is a WebSocket upgrade.
///
/// Requires `Upgrade: websocket` (case-insensitive value) and a
/// `Sec-WebSocket-Key` header. Anything else is not an upgrade and the caller
/// answers `404`.
pub fn accept_for(request: &Request) -> Option<String> {
    let upgrade = request.header("upgrade")?;
    if !upgrade.trim().eq_ignore_ascii_case("websocket") {
        return None;
    }
    let key = request.header("sec-websocket-key")?.trim();
    Some(accept_token(key))
}

/// Write the `101 Switching Protocols` response.
pub async fn write_switching_protocols<W>(writer: &mut W, accept: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request {
        Request {
            method: "GET".into(),
            path: "/ws".into(),
            query: Vec::new(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn rfc_sample_key() {
        assert_eq!(
            accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn upgrade_header_is_case_insensitive() {
        let req = request(&[
            ("Upgrade", "WebSocket"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ]);
        assert_eq!(
            accept_for(&req).as_deref(),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
    }

    #[test]
    fn missing_key_or_wrong_upgrade_is_not_an_upgrade() {
        assert!(accept_for(&request(&[("Upgrade", "websocket")])).is_none());
        assert!(accept_for(&request(&[
            ("Upgrade", "h2c"),
            ("Sec-WebSocket-Key", "abc"),
        ]))
        .is_none());
        assert!(accept_for(&request(&[])).is_none());
    }

    #[tokio::test]
    async fn switching_protocols_response() {
        let mut out = Vec::new();
        write_switching_protocols(&mut out, "token").await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.ends_with("Sec-WebSocket-Accept: token\r\n\r\n"));
    }
}
