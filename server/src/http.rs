//! Minimal HTTP/1.1 front-end: one request per connection.
//!
//! Only what the router needs is parsed: the request line, the query string
//! (split on `?`, `&` and the first `=`, then percent-decoded) and the header
//! block. Bodies are never read. Every plain response closes the connection.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A parsed request head.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed before a request was received")]
    Closed,
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request head exceeds {0} bytes")]
    TooLarge(usize),
}

/// Response statuses the router emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::Conflict => "Conflict",
        }
    }
}

/// Read the request line and headers up to the blank line.
///
/// `max_bytes` bounds the whole head so a client cannot grow it without limit.
pub async fn read_request<R>(reader: &mut R, max_bytes: usize) -> Result<Request, HttpError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut consumed = 0usize;
    let request_line = read_line(reader, &mut consumed, max_bytes).await?;
    if request_line.is_empty() {
        return Err(HttpError::Closed);
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed(request_line));
    };
    if !version.starts_with("HTTP/") {
        return Err(HttpError::Malformed(request_line));
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, Vec::new()),
    };
    let method = method.to_string();
    let path = path.to_string();

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader, &mut consumed, max_bytes).await?;
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpError::Malformed(line));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Request {
        method,
        path,
        query,
        headers,
    })
}

/// Read one CRLF/LF-terminated line without the terminator.
///
/// End of stream yields an empty line, which callers treat as end of head.
async fn read_line<R>(reader: &mut R, consumed: &mut usize, max: usize) -> Result<String, HttpError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut raw = Vec::new();
    let remaining = max.saturating_sub(*consumed);
    let n = (&mut *reader)
        .take(remaining as u64 + 1)
        .read_until(b'\n', &mut raw)
        .await?;
    *consumed += n;
    if *consumed > max {
        return Err(HttpError::TooLarge(max));
    }
    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    String::from_utf8(raw).map_err(|e| HttpError::Malformed(e.to_string()))
}

/// Split `a=1&b=2` into pairs. A key without `=` gets an empty value.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Decode `%XX` escapes. `+` is kept literally; invalid escapes pass through as-is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Write a complete response and flush it. The connection is always marked
/// `Connection: close`; the caller drops the socket afterwards.
pub async fn write_response<W>(
    writer: &mut W,
    status: Status,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let head = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\
         \r\n",
        status.code(),
        status.reason(),
        body.len(),
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Plain-text response used for every error status.
pub async fn write_text<W>(writer: &mut W, status: Status, message: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_response(writer, status, "text/plain; charset=utf-8", message.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(raw: &str) -> Result<Request, HttpError> {
        let mut reader = BufReader::new(raw.as_bytes());
        read_request(&mut reader, 4096).await
    }

    #[tokio::test]
    async fn parses_path_query_and_headers() {
        let req = parse(
            "GET /ws?password=s3cret&x HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/ws");
        assert_eq!(req.query_param("password"), Some("s3cret"));
        assert_eq!(req.query_param("x"), Some(""));
        assert_eq!(req.header("upgrade"), Some("websocket"));
        assert_eq!(req.header("HOST"), Some("localhost"));
    }

    #[tokio::test]
    async fn value_split_on_first_equals_only() {
        let req = parse("GET /ws?password=a=b HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(req.query_param("password"), Some("a=b"));
    }

    #[tokio::test]
    async fn tolerates_bare_lf_line_endings() {
        let req = parse("GET /viewer HTTP/1.1\nHost: x\n\n").await.unwrap();
        assert_eq!(req.path, "/viewer");
        assert_eq!(req.header("host"), Some("x"));
    }

    #[tokio::test]
    async fn empty_stream_is_closed() {
        assert!(matches!(parse("").await, Err(HttpError::Closed)));
    }

    #[tokio::test]
    async fn garbage_request_line_is_malformed() {
        assert!(matches!(
            parse("HELLO\r\n\r\n").await,
            Err(HttpError::Malformed(_))
        ));
        assert!(matches!(
            parse("GET / SMTP\r\n\r\n").await,
            Err(HttpError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn oversized_head_is_rejected() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(5000));
        assert!(matches!(parse(&raw).await, Err(HttpError::TooLarge(4096))));
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("p%40ss%20word%21"), "p@ss word!");
        assert_eq!(percent_decode("a+b"), "a+b");
        assert_eq!(percent_decode("a%2Bb"), "a+b");
        assert_eq!(
            parse_query("password=a+b&x"),
            vec![
                (String::from("password"), String::from("a+b")),
                (String::from("x"), String::new())
            ]
        );
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[tokio::test]
    async fn response_has_length_and_close() {
        let mut out = Vec::new();
        write_text(&mut out, Status::Conflict, "slot already taken")
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 409 Conflict\r\n"));
        assert!(text.contains("Content-Length: 18\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nslot already taken"));
    }
}
