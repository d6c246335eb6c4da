//! Request intake from a newline-delimited JSON stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::request::ReplacementRequest;

/// Forward requests read from `reader` to the worker.
///
/// Each non-blank line is one JSON [`ReplacementRequest`]. Malformed lines
/// (including ones that are not UTF-8) are logged and skipped; only an I/O
/// error ends intake early. Requests without a project get `default_project`.
/// Returns the number of requests forwarded once the stream ends or the
/// worker stops receiving.
pub async fn read_requests<R>(
    mut reader: R,
    default_project: &str,
    requests: mpsc::Sender<ReplacementRequest>,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "Skipping request that is not valid UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let mut request: ReplacementRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, line = %line, "Skipping malformed request");
                continue;
            }
        };
        if request.project_id.is_empty() {
            request.project_id = default_project.to_string();
        }

        debug!(instance = %request.instance_name, zone = %request.zone, "Queueing request");
        if requests.send(request).await.is_err() {
            info!("Worker stopped receiving, closing intake");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
