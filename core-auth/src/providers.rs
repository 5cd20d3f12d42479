//! Connector provider lookup table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display metadata for a connector provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub slug: &'static str,
    pub display_name: &'static str,
    pub icon: &'static str,
}

/// Supported connector providers.
///
/// # Examples
///
/// ```
/// use core_auth::ConnectorProvider;
///
/// let provider: ConnectorProvider = "GitHub".parse().unwrap();
/// assert_eq!(provider, ConnectorProvider::GitHub);
/// assert_eq!(provider.info().display_name, "GitHub");
///
/// let unknown = ConnectorProvider::from_slug("acme");
/// assert_eq!(unknown.info().slug, "other");
/// assert_eq!(unknown.slug(), "acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectorProvider {
    /// Generic Google account grant shared by several Google connectors.
    Google,
    Gmail,
    GoogleCalendar,
    GoogleDrive,
    GitHub,
    Slack,
    Notion,
    Linear,
    Jira,
    Discord,
    MicrosoftOutlook,
    /// Unknown provider; the slug is kept verbatim for the backend.
    Other(String),
}

const PROVIDERS: &[(ConnectorProvider, ProviderInfo)] = &[
    (
        ConnectorProvider::Google,
        ProviderInfo {
            slug: "google",
            display_name: "Google",
            icon: "google",
        },
    ),
    (
        ConnectorProvider::Gmail,
        ProviderInfo {
            slug: "gmail",
            display_name: "Gmail",
            icon: "gmail",
        },
    ),
    (
        ConnectorProvider::GoogleCalendar,
        ProviderInfo {
            slug: "google_calendar",
            display_name: "Google Calendar",
            icon: "google-calendar",
        },
    ),
    (
        ConnectorProvider::GoogleDrive,
        ProviderInfo {
            slug: "google_drive",
            display_name: "Google Drive",
            icon: "google-drive",
        },
    ),
    (
        ConnectorProvider::GitHub,
        ProviderInfo {
            slug: "github",
            display_name: "GitHub",
            icon: "github",
        },
    ),
    (
        ConnectorProvider::Slack,
        ProviderInfo {
            slug: "slack",
            display_name: "Slack",
            icon: "slack",
        },
    ),
    (
        ConnectorProvider::Notion,
        ProviderInfo {
            slug: "notion",
            display_name: "Notion",
            icon: "notion",
        },
    ),
    (
        ConnectorProvider::Linear,
        ProviderInfo {
            slug: "linear",
            display_name: "Linear",
            icon: "linear",
        },
    ),
    (
        ConnectorProvider::Jira,
        ProviderInfo {
            slug: "jira",
            display_name: "Jira",
            icon: "jira",
        },
    ),
    (
        ConnectorProvider::Discord,
        ProviderInfo {
            slug: "discord",
            display_name: "Discord",
            icon: "discord",
        },
    ),
    (
        ConnectorProvider::MicrosoftOutlook,
        ProviderInfo {
            slug: "microsoft_outlook",
            display_name: "Microsoft Outlook",
            icon: "outlook",
        },
    ),
];

/// Entry used for providers outside the table.
pub const FALLBACK_PROVIDER: ProviderInfo = ProviderInfo {
    slug: "other",
    display_name: "Connector",
    icon: "plug",
};

/// Lowercases and drops separators so `Google-Calendar`, `google_calendar`
/// and `googlecalendar` compare equal.
fn normalize(slug: &str) -> String {
    slug.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl ConnectorProvider {
    /// Case-insensitive lookup; never fails.
    pub fn from_slug(slug: &str) -> Self {
        let wanted = normalize(slug);
        PROVIDERS
            .iter()
            .find(|(_, info)| normalize(info.slug) == wanted)
            .map(|(provider, _)| provider.clone())
            .unwrap_or_else(|| ConnectorProvider::Other(slug.trim().to_string()))
    }

    pub fn info(&self) -> &'static ProviderInfo {
        PROVIDERS
            .iter()
            .find(|(provider, _)| provider == self)
            .map(|(_, info)| info)
            .unwrap_or(&FALLBACK_PROVIDER)
    }

    /// Slug sent to the backend.
    pub fn slug(&self) -> &str {
        match self {
            ConnectorProvider::Other(slug) => slug,
            known => known.info().slug,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ConnectorProvider::Other(_))
    }

    pub fn all() -> impl Iterator<Item = &'static ConnectorProvider> {
        PROVIDERS.iter().map(|(provider, _)| provider)
    }
}

impl FromStr for ConnectorProvider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_slug(s))
    }
}

impl From<String> for ConnectorProvider {
    fn from(slug: String) -> Self {
        Self::from_slug(&slug)
    }
}

impl From<ConnectorProvider> for String {
    fn from(provider: ConnectorProvider) -> Self {
        provider.slug().to_string()
    }
}

impl fmt::Display for ConnectorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_provider_has_an_entry() {
        for provider in ConnectorProvider::all() {
            assert!(provider.is_known());
            assert_ne!(provider.info(), &FALLBACK_PROVIDER);
            assert_eq!(&ConnectorProvider::from_slug(provider.slug()), provider);
        }
        assert_eq!(ConnectorProvider::all().count(), 11);
    }

    #[test]
    fn test_lookup_is_case_and_separator_insensitive() {
        assert_eq!(
            ConnectorProvider::from_slug("Google-Calendar"),
            ConnectorProvider::GoogleCalendar
        );
        assert_eq!(
            ConnectorProvider::from_slug("MICROSOFT_OUTLOOK"),
            ConnectorProvider::MicrosoftOutlook
        );
        assert_eq!(ConnectorProvider::from_slug("github"), ConnectorProvider::GitHub);
        assert_eq!(ConnectorProvider::from_slug("Google"), ConnectorProvider::Google);
    }

    #[test]
    fn test_google_is_distinct_from_google_products() {
        assert_ne!(
            ConnectorProvider::from_slug("google"),
            ConnectorProvider::from_slug("google_drive")
        );
        assert_eq!(ConnectorProvider::Google.to_string(), "Google");
    }

    #[test]
    fn test_unknown_provider_falls_back() {
        let provider = ConnectorProvider::from_slug(" acme-crm ");
        assert_eq!(provider, ConnectorProvider::Other("acme-crm".to_string()));
        assert_eq!(provider.info(), &FALLBACK_PROVIDER);
        assert_eq!(provider.slug(), "acme-crm");
        assert_eq!(provider.to_string(), "Connector");
    }

    #[test]
    fn test_serde_uses_slug() {
        let json = serde_json::to_string(&ConnectorProvider::GoogleDrive).unwrap();
        assert_eq!(json, "\"google_drive\"");

        let parsed: ConnectorProvider = serde_json::from_str("\"Slack\"").unwrap();
        assert_eq!(parsed, ConnectorProvider::Slack);
    }
}
