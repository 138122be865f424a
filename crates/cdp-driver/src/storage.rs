//! Session storage-state blob: cookies plus per-origin localStorage.
//!
//! The on-disk shape matches the files produced by browser-context
//! state dumps (camelCase keys, `expires: -1` for session cookies), so
//! session files captured by earlier versions of the tool keep working.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "default_cookie_expires")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<LocalStorageEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalStorageEntry {
    pub name: String,
    pub value: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_expires() -> f64 {
    -1.0
}

/// Parameters accepted by `Network.setCookies`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl From<&Cookie> for CookieParam {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: (!cookie.domain.is_empty()).then(|| cookie.domain.clone()),
            path: Some(cookie.path.clone()),
            url: None,
            // Session cookies carry -1; the wire param omits expiry instead.
            expires: (cookie.expires >= 0.0).then_some(cookie.expires),
            http_only: Some(cookie.http_only),
            secure: Some(cookie.secure),
            same_site: cookie.same_site.clone(),
        }
    }
}

impl StorageState {
    pub fn cookie_params(&self) -> Vec<CookieParam> {
        self.cookies.iter().map(CookieParam::from).collect()
    }

    /// localStorage entries recorded for the given origin, if any.
    pub fn local_storage_for(&self, origin: &str) -> Option<&[LocalStorageEntry]> {
        let want = origin.trim_end_matches('/');
        self.origins
            .iter()
            .find(|entry| entry.origin.trim_end_matches('/') == want)
            .map(|entry| entry.local_storage.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_browser_context_dump() {
        let raw = json!({
            "cookies": [
                {
                    "name": "authautologin",
                    "value": "abc123",
                    "domain": ".imgur.com",
                    "path": "/",
                    "expires": 1766000000.5,
                    "httpOnly": true,
                    "secure": true,
                    "sameSite": "Lax"
                },
                {
                    "name": "frontpagebeta",
                    "value": "0",
                    "domain": "imgur.com",
                    "path": "/",
                    "expires": -1,
                    "httpOnly": false,
                    "secure": false
                }
            ],
            "origins": [
                {
                    "origin": "https://imgur.com",
                    "localStorage": [
                        {"name": "accolades", "value": "seen"}
                    ]
                }
            ]
        });

        let state: StorageState = serde_json::from_value(raw).unwrap();
        assert_eq!(state.cookies.len(), 2);
        assert!(state.cookies[0].http_only);
        assert_eq!(state.cookies[0].same_site.as_deref(), Some("Lax"));
        assert_eq!(state.cookies[1].expires, -1.0);
        assert_eq!(state.origins[0].local_storage[0].name, "accolades");
    }

    #[test]
    fn unknown_cookie_fields_are_tolerated() {
        let raw = json!({
            "cookies": [
                {"name": "s", "value": "1", "domain": "imgur.com", "size": 3, "session": true}
            ],
            "origins": []
        });

        let state: StorageState = serde_json::from_value(raw).unwrap();
        assert_eq!(state.cookies[0].expires, -1.0);
        assert_eq!(state.cookies[0].path, "/");
    }

    #[test]
    fn session_cookie_omits_expiry_on_the_wire() {
        let cookie = Cookie {
            name: "sid".into(),
            value: "v".into(),
            domain: ".imgur.com".into(),
            path: "/".into(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: Some("Lax".into()),
        };

        let param = CookieParam::from(&cookie);
        assert!(param.expires.is_none());

        let wire = serde_json::to_value(&param).unwrap();
        assert!(wire.get("expires").is_none());
        assert_eq!(wire["httpOnly"], json!(true));
        assert_eq!(wire["sameSite"], json!("Lax"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let state = StorageState {
            cookies: vec![Cookie {
                name: "a".into(),
                value: "b".into(),
                domain: "imgur.com".into(),
                path: "/".into(),
                expires: 1.0,
                http_only: true,
                secure: false,
                same_site: None,
            }],
            origins: vec![OriginState {
                origin: "https://imgur.com".into(),
                local_storage: vec![LocalStorageEntry {
                    name: "k".into(),
                    value: "v".into(),
                }],
            }],
        };

        let wire = serde_json::to_value(&state).unwrap();
        assert_eq!(wire["cookies"][0]["httpOnly"], json!(true));
        assert_eq!(wire["origins"][0]["localStorage"][0]["name"], json!("k"));
    }

    #[test]
    fn origin_lookup_ignores_trailing_slash() {
        let state = StorageState {
            cookies: vec![],
            origins: vec![OriginState {
                origin: "https://imgur.com/".into(),
                local_storage: vec![LocalStorageEntry {
                    name: "k".into(),
                    value: "v".into(),
                }],
            }],
        };

        let entries = state.local_storage_for("https://imgur.com").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(state.local_storage_for("https://other.example").is_none());
    }
}
