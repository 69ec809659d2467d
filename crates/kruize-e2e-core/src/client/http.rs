//! Blocking HTTP transport.

use reqwest::blocking::Client;
use url::Url;

use super::{ApiRequest, ApiResponse, Method, Transport};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    /// Transport for the configured service. The request timeout is only set
    /// when the config asks for one.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HarnessError::config(format!("http client: {e}")))?;
        Ok(Self {
            base_url: config.base_url()?,
            client,
        })
    }

    /// Full URL for `request`, keeping any path prefix of the base URL.
    pub fn url_for(&self, request: &ApiRequest) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", self.base_url.path().trim_end_matches('/'), request.path);
        url.set_path(&path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(request);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let http_error = |e: reqwest::Error| HarnessError::Http {
            method: request.method.to_string(),
            path: request.path.to_string(),
            message: e.to_string(),
        };
        let response = builder.send().map_err(http_error)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(http_error)?;
        Ok(ApiResponse::from_text(status, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::from_config(&HarnessConfig {
            base_url: base.into(),
            http_timeout_secs: Some(5),
            ..HarnessConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_keeps_prefix_and_encodes_query() {
        let request = ApiRequest::new(Method::Get, super::super::LIST_RECOMMENDATIONS)
            .query("experiment_name", "monitor sysbench")
            .query("latest", true);
        assert_eq!(
            transport("http://kruize.example:8080/api/").url_for(&request).as_str(),
            concat!(
                "http://kruize.example:8080/api/listRecommendations",
                "?experiment_name=monitor+sysbench&latest=true"
            )
        );
        assert_eq!(
            transport("http://192.168.49.2:31521").url_for(&request).path(),
            "/listRecommendations"
        );
    }

    #[test]
    fn test_rejects_non_http_base() {
        let config = HarnessConfig {
            base_url: "file:///tmp".into(),
            ..HarnessConfig::default()
        };
        assert!(HttpTransport::from_config(&config).is_err());
    }
}
