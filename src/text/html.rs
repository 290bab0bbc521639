//! Web page fetching and visible-text extraction

use crate::config::FetchConfig;
use crate::error::{RagError, Result};
use regex::Regex;
use reqwest::Url;

/// Parse `url`, accepting only http and https
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| RagError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RagError::InvalidUrl(format!(
            "{}: unsupported scheme '{}', expected http or https",
            url, scheme
        ))),
    }
}

/// HTTP client with a bounded timeout and no retries
pub struct WebFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl WebFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Fetch the response body of `url`; non-2xx statuses are errors
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let url = parse_http_url(url)?;
        log::info!("Fetching {} (timeout {:?})", url, self.config.timeout());

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Fetch(format!("{} returned HTTP {}", url, status)));
        }

        let body = response.text().await?;
        log::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Inside of a tag; `>` within quoted attribute values does not end it
const TAG_BODY: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

/// Strips markup from HTML, keeping visible text nodes
pub struct HtmlTextExtractor {
    script_regex: Regex,
    style_regex: Regex,
    comment_regex: Regex,
    tag_regex: Regex,
}

impl HtmlTextExtractor {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::TextProcessing(format!("Failed to compile HTML regex: {}", e)))
        };

        Ok(Self {
            script_regex: compile(format!(r"(?is)<script\b{}>.*?</script\s*>", TAG_BODY).as_str())?,
            style_regex: compile(format!(r"(?is)<style\b{}>.*?</style\s*>", TAG_BODY).as_str())?,
            comment_regex: compile(r"(?s)<!--.*?-->")?,
            tag_regex: compile(format!("<{}>", TAG_BODY).as_str())?,
        })
    }

    /// Visible text of `html`: one trimmed, entity-decoded text node per line
    pub fn extract(&self, html: &str) -> String {
        let html = self.script_regex.replace_all(html, "");
        let html = self.style_regex.replace_all(&html, "");
        let html = self.comment_regex.replace_all(&html, "");

        self.tag_regex
            .split(&html)
            .map(|node| html_escape::decode_html_entities(node).trim().to_string())
            .filter(|node| !node.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_scheme_validation() {
        assert!(parse_http_url("https://example.com/policy").is_ok());
        assert!(parse_http_url("http://localhost:8080").is_ok());
        assert!(matches!(parse_http_url("ftp://example.com"), Err(RagError::InvalidUrl(_))));
        assert!(matches!(parse_http_url("file:///etc/passwd"), Err(RagError::InvalidUrl(_))));
        assert!(matches!(parse_http_url("not a url"), Err(RagError::InvalidUrl(_))));
    }

    #[test]
    fn test_strips_scripts_and_styles() {
        let extractor = HtmlTextExtractor::new().unwrap();
        let html = r#"<html><head><title>Leave Policy</title>
            <style>body { color: red; }</style>
            <script type="text/javascript">var x = "<p>hidden</p>";</script>
            </head><body><!-- note --><h1>Annual leave</h1>
            <p>Employees get 25 days &amp; public holidays.</p></body></html>"#;

        let text = extractor.extract(html);
        assert_eq!(
            text,
            "Leave Policy\nAnnual leave\nEmployees get 25 days & public holidays."
        );

        // `>` inside quoted attribute values stays part of the tag
        let html = r#"<p><img alt="a > b" src="x.png">Visible</p><p data-x='1>0'>Leave</p>
            <script data-cond="a>b">var hidden = 1;</script>"#;
        assert_eq!(extractor.extract(html), "Visible\nLeave");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let extractor = HtmlTextExtractor::new().unwrap();
        assert_eq!(extractor.extract("just text"), "just text");
        assert_eq!(extractor.extract(""), "");
    }
}
