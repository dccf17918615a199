//! Best-effort browser launching
//!
//! Opening a browser can fail for any number of environmental reasons
//! (headless host, no default handler). The flow must keep working, so
//! a failure only downgrades to printing the URL for manual use.

use tracing::warn;

pub fn open_best_effort(url: &str) {
    if let Err(error) = open::that_detached(url) {
        warn!(%error, url, "could not launch a browser");
        eprintln!("Open this URL in your browser:\n\n  {url}\n");
    }
}
