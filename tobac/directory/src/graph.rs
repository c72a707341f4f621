//! Teams from the Microsoft Graph API.
//!
//! Teams are listed in a SharePoint list exposed through the Graph API. Each list item's fields
//! carry the team's ID (its mail nickname) and the ID of the Azure AD group holding its members.
//! Requests are authorized with an application token obtained through the OAuth2 client
//! credentials flow.

use crate::{DiscoverTeams, Team, Teams};
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio::time;
use tracing::{debug, trace};

const GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const LOGIN_URL: &str = "https://login.microsoftonline.com";

/// Tokens are renewed this long before they expire.
const TOKEN_EXPIRY_MARGIN: time::Duration = time::Duration::from_secs(60);

/// The SharePoint list holding the team catalog, relative to the Graph API's `groups` resource.
pub const DEFAULT_TEAM_LIST: &str =
    "9f0d0ea1-0226-4aa9-9bf9-b6e75816fabf/sites/root/lists/nytt team/items?expand=fields";

/// An Azure AD application registration.
#[derive(Clone)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug)]
pub struct GraphDirectory {
    http: reqwest::Client,
    credentials: Credentials,
    token_url: Url,
    list_url: Url,
    token: Mutex<Option<Token>>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("directory responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

struct Token {
    secret: String,
    expires_at: time::Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    value: Vec<ListItem>,

    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    fields: TeamFields,
}

#[derive(Debug, Default, Deserialize)]
struct TeamFields {
    #[serde(rename = "mailnick_x002f_tag", default)]
    id: String,

    #[serde(rename = "GruppeID", default)]
    group_id: String,

    #[serde(rename = "Title", default)]
    title: String,

    #[serde(rename = "Beskrivelse", default)]
    description: String,
}

// === impl GraphDirectory ===

impl GraphDirectory {
    /// Builds a directory that reads teams from `team_list`, a path relative to the Graph API's
    /// `groups` resource.
    pub fn new(credentials: Credentials, team_list: &str) -> Result<Self, Error> {
        let token_url = parse_url(format!(
            "{LOGIN_URL}/{}/oauth2/v2.0/token",
            credentials.tenant_id
        ))?;
        let list_url = parse_url(format!("{GRAPH_URL}/groups/{team_list}"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            credentials,
            token_url,
            list_url,
            token: Mutex::new(None),
        })
    }

    async fn list_teams(&self) -> Result<Teams, Error> {
        let token = self.token().await?;

        let mut teams = Teams::default();
        let mut next = Some(self.list_url.clone());
        while let Some(url) = next.take() {
            let page = self.get::<ListPage>(url, &token).await?;
            next = page.next_link.clone().map(parse_url).transpose()?;
            for team in page.into_teams() {
                debug!(team = %team.id, group = %team.group_id, "Adding team");
                teams.insert(team.id.clone(), team);
            }
        }

        Ok(teams)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, token: &str) -> Result<T, Error> {
        trace!(%url, "GET");
        let rsp = self.http.get(url).bearer_auth(token).send().await?;
        let rsp = error_for_status(rsp).await?;
        Ok(rsp.json().await?)
    }

    /// Returns a cached application token, requesting a new one if it is missing or about to
    /// expire.
    async fn token(&self) -> Result<String, Error> {
        let cached = {
            let token = self.token.lock();
            token
                .as_ref()
                .filter(|t| t.expires_at > time::Instant::now())
                .map(|t| t.secret.clone())
        };
        if let Some(secret) = cached {
            return Ok(secret);
        }

        debug!(tenant = %self.credentials.tenant_id, "Requesting Graph API token");
        let Credentials {
            client_id,
            client_secret,
            ..
        } = &self.credentials;
        let rsp = self
            .http
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;
        let TokenResponse {
            access_token,
            expires_in,
        } = error_for_status(rsp).await?.json().await?;

        let lifetime = time::Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.lock() = Some(Token {
            secret: access_token.clone(),
            expires_at: time::Instant::now() + lifetime,
        });
        Ok(access_token)
    }
}

#[async_trait::async_trait]
impl DiscoverTeams for GraphDirectory {
    async fn fetch_teams(&self) -> anyhow::Result<Teams> {
        self.list_teams().await.map_err(Into::into)
    }
}

// === impl Credentials ===

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// === impl ListPage ===

impl ListPage {
    /// Returns the page's valid teams. Catalog entries that lack either ID are skipped.
    fn into_teams(self) -> impl Iterator<Item = Team> {
        self.value
            .into_iter()
            .map(|ListItem { fields }| Team::from(fields))
            .filter(Team::is_valid)
    }
}

impl From<TeamFields> for Team {
    fn from(fields: TeamFields) -> Self {
        Team {
            id: fields.id,
            group_id: fields.group_id,
            display_name: fields.title,
            description: fields.description,
        }
    }
}

fn parse_url(url: String) -> Result<Url, Error> {
    Url::parse(&url).map_err(|error| Error::InvalidUrl {
        url,
        reason: error.to_string(),
    })
}

async fn error_for_status(rsp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = rsp.status();
    if status.is_success() {
        return Ok(rsp);
    }
    let body = rsp.text().await.unwrap_or_default();
    Err(Error::Status { status, body })
}
