//! Static content served before any upgrade.
//!
//! The browser client (`/`, `/viewer`, `/client.js`) is compiled into the
//! binary. Extra assets are registered once at startup and looked up by exact
//! path; a built-in path cannot be shadowed.

use std::borrow::Cow;
use std::collections::HashMap;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const VIEWER_HTML: &str = include_str!("../assets/viewer.html");
const CLIENT_JS: &str = include_str!("../assets/client.js");

/// One servable file.
#[derive(Debug, Clone)]
pub struct Asset {
    path: String,
    content_type: Cow<'static, str>,
    body: Cow<'static, [u8]>,
}

impl Asset {
    pub fn new(path: impl Into<String>, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content_type: Cow::Owned(content_type.into()),
            body: Cow::Owned(body),
        }
    }

    fn builtin(path: &str, content_type: &'static str, body: &'static str) -> Self {
        Self {
            path: path.to_string(),
            content_type: Cow::Borrowed(content_type),
            body: Cow::Borrowed(body.as_bytes()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Path → asset table.
#[derive(Debug, Clone)]
pub struct Assets {
    by_path: HashMap<String, Asset>,
}

impl Assets {
    /// The built-in browser client plus `extra`.
    pub fn new(extra: impl IntoIterator<Item = Asset>) -> Self {
        let mut by_path = HashMap::new();
        for asset in extra {
            by_path.insert(asset.path.clone(), asset);
        }
        for asset in [
            Asset::builtin("/", "text/html; charset=utf-8", INDEX_HTML),
            Asset::builtin("/viewer", "text/html; charset=utf-8", VIEWER_HTML),
            Asset::builtin("/client.js", "application/javascript", CLIENT_JS),
        ] {
            by_path.insert(asset.path.clone(), asset);
        }
        Self { by_path }
    }

    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.by_path.get(path)
    }
}

impl Default for Assets {
    fn default() -> Self {
        Self::new([])
    }
}
