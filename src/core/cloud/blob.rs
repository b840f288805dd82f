use super::{join_segments, require_non_empty, CloudGateway, STORAGE_SCOPE};
use crate::error::ToolOutcome;

const STORAGE_API_VERSION: &str = "2021-08-06";

impl CloudGateway {
    /// Downloads a whole blob and decodes it. `encoding` only changes behavior
    /// for `"ascii"`; every other value (or none) decodes as UTF-8.
    pub async fn fetch_blob_text(
        &self,
        container: &str,
        blob_name: &str,
        encoding: Option<&str>,
    ) -> ToolOutcome<String> {
        require_non_empty("container", container)?;
        require_non_empty("blob_name", blob_name)?;

        let url = join_segments(
            &self.blob_endpoint,
            std::iter::once(container).chain(blob_name.split('/')),
        );
        tracing::debug!("[CloudGateway] GET blob {}", url);

        let request = self
            .client
            .get(url)
            .header("x-ms-version", STORAGE_API_VERSION);
        let resource = format!("blob '{}' in container '{}'", blob_name, container);
        let response = self.send_authorized(request, STORAGE_SCOPE, &resource).await?;

        let bytes = response.bytes().await?;
        Ok(decode_text(&bytes, encoding))
    }
}

/// Non-ASCII bytes become `?` in ASCII mode; invalid UTF-8 becomes U+FFFD.
pub fn decode_text(bytes: &[u8], encoding: Option<&str>) -> String {
    let ascii = encoding
        .map(|name| name.trim().eq_ignore_ascii_case("ascii"))
        .unwrap_or(false);

    if ascii {
        bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
