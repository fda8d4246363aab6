use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::HttpSettings;
use crate::error::{Error, Result};
use crate::trailer::Download;

/// Downloads get far longer than API calls.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Blocking HTTP client shared by every provider.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// Start a GET request.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request, failing on any non-success status.
    ///
    /// URLs in errors lose their query string, which may carry credentials.
    pub fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().map_err(|e| Error::Http(e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let mut url = response.url().clone();
            url.set_query(None);
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        tracing::debug!(url, "fetching page");
        let response = self.send(self.get(url).query(query))?;
        response.text().map_err(|e| Error::Http(e.without_url()))
    }

    pub fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request)?;
        response.json().map_err(|e| Error::Http(e.without_url()))
    }
}

impl Download for HttpClient {
    /// Stream `url` into `dest` with a progress bar. The file only appears
    /// under its final name once complete.
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::debug!(url, "downloading");
        let response = self.send(self.get(url).timeout(DOWNLOAD_TIMEOUT))?;

        let bar = match response.content_length() {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) =
            ProgressStyle::with_template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        let partial = dest.with_extension("part");
        let copied = (|| -> io::Result<u64> {
            let mut out = BufWriter::new(File::create(&partial)?);
            let copied = io::copy(&mut bar.wrap_read(response), &mut out)?;
            out.flush()?;
            Ok(copied)
        })();
        bar.finish_and_clear();

        match copied {
            Ok(copied) => {
                fs::rename(&partial, dest)?;
                Ok(copied)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e.into())
            }
        }
    }
}
