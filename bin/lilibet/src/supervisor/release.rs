use serde::Deserialize;

use crate::Result;

const LATEST_RELEASE: &str = "https://api.github.com/repos/Koenkk/zigbee2mqtt/releases/latest";
const USER_AGENT: &str = concat!("lilibet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize, PartialEq)]
pub struct Release {
    pub tag_name: String,
}

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

pub async fn latest_release(client: &reqwest::Client) -> Result<Release> {
    let release = client
        .get(LATEST_RELEASE)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(release)
}

/// Releases are tagged with the bare version from `package.json`, sometimes
/// with a `v` in front.
pub fn is_up_to_date(local_version: &str, release: &Release) -> bool {
    local_version.trim().trim_start_matches('v') == release.tag_name.trim().trim_start_matches('v')
}
