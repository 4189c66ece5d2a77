use axum::http::{HeaderMap, header};

/// Session cookie policy, fixed at startup.
///
/// SameSite is always Lax; the `secure` flag follows deployment config so the
/// two never contradict each other.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            secure: false,
            max_age_secs: 3600,
        }
    }
}

impl CookieConfig {
    /// Build the Set-Cookie value for a fresh session.
    pub fn build_set_cookie(&self, value: &str) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.name, value, self.max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Build the Set-Cookie value that expires the session immediately.
    pub fn build_delete_cookie(&self) -> String {
        let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", self.name);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Extract a cookie value from request headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            if key == name { Some(value.to_string()) } else { None }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn set_cookie_attributes() {
        let config = CookieConfig {
            name: "session".to_string(),
            secure: true,
            max_age_secs: 3600,
        };
        let cookie = config.build_set_cookie("tok123");
        assert!(cookie.starts_with("session=tok123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn insecure_config_omits_secure_flag() {
        let cookie = CookieConfig::default().build_set_cookie("tok");
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn delete_cookie_expires_immediately() {
        let cookie = CookieConfig::default().build_delete_cookie();
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.starts_with("session=;"));
    }

    #[test]
    fn extract_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; session=abc123; other=xyz"),
        );
        assert_eq!(extract_cookie(&headers, "session"), Some("abc123".into()));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }
}
