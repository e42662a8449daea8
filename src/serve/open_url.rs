//! Opening the served URL once serving is confirmed.

use std::process::{Command, Stdio};

use url::Url;

/// Side effect invoked with the served URL.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &Url) -> std::io::Result<()>;
}

/// Opens URLs with the desktop's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &Url) -> std::io::Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            Command::new("xdg-open")
        };
        command
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

/// Build the URL to open.
///
/// An address of the form `:port` is combined with `host`, or with
/// `localhost` if no host is configured.
pub fn served_url(scheme: &str, host: &str, address: &str) -> Result<Url, url::ParseError> {
    let authority = if address.starts_with(':') {
        let host = if host.is_empty() { "localhost" } else { host };
        format!("{host}{address}")
    } else {
        address.to_string()
    };
    Url::parse(&format!("{scheme}://{authority}/"))
}
