use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mpc_presence_core::{urls, RawObservation};
use reqwest::header::SERVER;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Upstream status source: yields one observation per poll, or an error when
/// the player's web interface is unreachable. On error the caller runs no
/// engine tick for the cycle.
#[async_trait]
pub trait StatusSource: Send {
    fn name(&self) -> &'static str;
    async fn poll(&mut self) -> Result<RawObservation>;
}

/// Polls the variables page of MPC-HC/MPC-BE's built-in web server.
pub struct MpcWebInterface {
    client: reqwest::Client,
    url: Url,
}

impl MpcWebInterface {
    pub fn new(port: u16) -> Result<Self> {
        let url = Url::parse(&urls::variables_url(port)).context("invalid variables page url")?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl StatusSource for MpcWebInterface {
    fn name(&self) -> &'static str {
        "mpc-web-interface"
    }

    async fn poll(&mut self) -> Result<RawObservation> {
        let res = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.url))?;

        // e.g. "MPC-HC WebServer"; keep only the fork name.
        let server = res
            .headers()
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_end_matches(" WebServer").to_string())
            .unwrap_or_default();

        let body = res
            .text()
            .await
            .context("failed to read variables page body")?;
        debug!(bytes = body.len(), server = %server, "fetched variables page");

        parse_variables(&body, server)
    }
}

/// Extracts the playback fields from the variables page markup. Separate from
/// the HTTP fetch so it can be exercised against canned documents.
pub fn parse_variables(html: &str, server: String) -> Result<RawObservation> {
    let document = Html::parse_document(html);
    Ok(RawObservation {
        filename: element_text(&document, "filepath")?,
        state_code: element_text(&document, "state")?,
        duration_text: element_text(&document, "durationstring")?,
        position_text: element_text(&document, "positionstring")?,
        server,
    })
}

fn element_text(document: &Html, id: &str) -> Result<String> {
    let selector = Selector::parse(&format!("#{id}"))
        .map_err(|err| anyhow!("invalid selector for #{id}: {err}"))?;
    let element = document
        .select(&selector)
        .next()
        .ok_or_else(|| anyhow!("variables page is missing #{id}"))?;
    Ok(element.text().collect::<String>().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::parse_variables;

    const VARIABLES_PAGE: &str = r#"
        <html><body>
        <p id="filepath">D:\Media\My_Movie [2020].mkv</p>
        <p id="filepatharg">D%3A%5CMedia%5CMy_Movie%20%5B2020%5D.mkv</p>
        <p id="state">2</p>
        <p id="statestring">Playing</p>
        <p id="positionstring">00:50:00</p>
        <p id="durationstring">01:40:00</p>
        </body></html>
    "#;

    #[test]
    fn extracts_the_playback_fields() {
        let obs = parse_variables(VARIABLES_PAGE, "MPC-HC".to_string()).unwrap();
        assert_eq!(obs.filename, r"D:\Media\My_Movie [2020].mkv");
        assert_eq!(obs.state_code, "2");
        assert_eq!(obs.duration_text, "01:40:00");
        assert_eq!(obs.position_text, "00:50:00");
        assert_eq!(obs.server, "MPC-HC");
    }

    #[test]
    fn missing_field_is_an_error() {
        let err = parse_variables("<html><body></body></html>", String::new()).unwrap_err();
        assert!(err.to_string().contains("filepath"));
    }
}
