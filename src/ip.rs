// Device address lookup (display only)

use std::time::Duration;

use tracing::warn;

use crate::config::DEFAULT_HOST;
use crate::messages::IpInfo;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Ask the car for its address; any failure falls back to the default AP address
pub async fn fetch_device_ip(client: &reqwest::Client, url: &str) -> String {
    match lookup(client, url).await {
        Ok(Some(ip)) => ip,
        Ok(None) => {
            warn!("IP lookup returned no address, using {}", DEFAULT_HOST);
            DEFAULT_HOST.to_string()
        }
        Err(e) => {
            warn!("IP lookup failed ({}), using {}", e, DEFAULT_HOST);
            DEFAULT_HOST.to_string()
        }
    }
}

async fn lookup(client: &reqwest::Client, url: &str) -> Result<Option<String>, reqwest::Error> {
    let info: IpInfo = client
        .get(url)
        .timeout(LOOKUP_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(info.ip.filter(|ip| !ip.is_empty()))
}
