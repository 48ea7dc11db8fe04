//! Static file responses.

use tracing::debug;

use crate::http::{self, Status};
use crate::state::AppState;
use crate::ws::BoxWriter;

/// `GET <path>`: the matching asset with its content type, else `404`.
pub async fn serve(state: &AppState, path: &str, writer: &mut BoxWriter) {
    let result = match state.assets.get(path) {
        Some(asset) => {
            http::write_response(writer, Status::Ok, asset.content_type(), asset.body()).await
        }
        None => {
            debug!(path, "no such asset");
            http::write_text(writer, Status::NotFound, "not found\n").await
        }
    };
    if let Err(e) = result {
        debug!(path, "response write failed: {e}");
    }
}
