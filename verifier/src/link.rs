//! Presentation helpers for a request URL

use url::Url;

/// Public QR rendering service used for the scannable image
const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Edge length of the rendered QR image, in pixels
const QR_SIZE: &str = "250x250";

/// Request URL as shown to the user: a clickable link plus a QR image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLink {
    request_url: String,
}

impl RequestLink {
    /// Wraps a request URL obtained from the provider
    #[must_use]
    pub fn new(request_url: impl Into<String>) -> Self {
        Self {
            request_url: request_url.into(),
        }
    }

    /// Clickable verification link
    #[must_use]
    pub fn url(&self) -> &str {
        &self.request_url
    }

    /// Address of a QR code image encoding the request URL
    ///
    /// # Errors
    ///
    /// Returns an error if the QR service address cannot be parsed
    pub fn qr_image_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            QR_SERVICE_URL,
            &[("size", QR_SIZE), ("data", self.request_url.as_str())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_image_url_encodes_request_url() {
        let link = RequestLink::new("https://verify.example/x?session=a&b=1");
        let qr = link.qr_image_url().unwrap();

        assert_eq!(qr.host_str(), Some("api.qrserver.com"));
        assert_eq!(qr.path(), "/v1/create-qr-code/");

        let params: Vec<(String, String)> = qr
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("size".to_string(), "250x250".to_string()),
                (
                    "data".to_string(),
                    "https://verify.example/x?session=a&b=1".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_url_is_returned_verbatim() {
        let link = RequestLink::new("https://verify.example/x");
        assert_eq!(link.url(), "https://verify.example/x");
    }
}
