//! Open-pixel and click-tracking URL injection
//!
//! Rewrites the rendered HTML before it reaches the provider: every
//! external link becomes a redirect through the tracking endpoint and a
//! 1x1 pixel is appended for open detection. The log entry id is baked
//! into each URL so the tracking ingress can attribute callbacks.

use chrono::{DateTime, Utc};
use revupulse_common::types::EmailLogId;

/// Tracking URL builder bound to one base endpoint
#[derive(Debug, Clone)]
pub struct TrackingInjector {
    base_url: String,
}

impl TrackingInjector {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Open-pixel URL for a log entry
    pub fn pixel_url(&self, email_id: EmailLogId, now: DateTime<Utc>) -> String {
        format!(
            "{}/pixel.gif?email_id={}&event=open&timestamp={}",
            self.base_url,
            email_id,
            now.timestamp_millis()
        )
    }

    /// Redirecting click URL wrapping `original_url`
    pub fn click_url(
        &self,
        email_id: EmailLogId,
        original_url: &str,
        link_id: &str,
        now: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/click?email_id={}&url={}&link_id={}&timestamp={}",
            self.base_url,
            email_id,
            urlencode(original_url),
            link_id,
            now.timestamp_millis()
        )
    }

    /// Append the open pixel, before `</body>` when one exists
    pub fn inject_pixel(&self, html: &str, email_id: EmailLogId, now: DateTime<Utc>) -> String {
        let pixel = format!(
            r#"<img src="{}" width="1" height="1" style="display:none;" alt="" />"#,
            self.pixel_url(email_id, now)
        );
        match html.find("</body>") {
            Some(idx) => {
                let mut out = String::with_capacity(html.len() + pixel.len());
                out.push_str(&html[..idx]);
                out.push_str(&pixel);
                out.push_str(&html[idx..]);
                out
            }
            None => format!("{}{}", html, pixel),
        }
    }

    /// Rewrite every trackable `href` into a click-tracking redirect
    ///
    /// Anchors, mailto links, and URLs already pointing at tracking
    /// endpoints are left alone.
    pub fn inject_click_tracking(
        &self,
        html: &str,
        email_id: EmailLogId,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;
        let mut link_counter = 0usize;

        while let Some(start) = rest.find("href=\"") {
            let url_start = start + "href=\"".len();
            let Some(url_len) = rest[url_start..].find('"') else {
                break;
            };
            let url = &rest[url_start..url_start + url_len];

            out.push_str(&rest[..url_start]);
            if is_trackable(url) {
                link_counter += 1;
                let link_id = format!("link_{}", link_counter);
                out.push_str(&self.click_url(email_id, url, &link_id, now));
            } else {
                out.push_str(url);
            }
            rest = &rest[url_start + url_len..];
        }
        out.push_str(rest);
        out
    }

    /// Full pre-send pass: click rewrites then the open pixel
    pub fn process(&self, html: &str, email_id: EmailLogId, now: DateTime<Utc>) -> String {
        let html = self.inject_click_tracking(html, email_id, now);
        self.inject_pixel(&html, email_id, now)
    }
}

fn is_trackable(url: &str) -> bool {
    !(url.contains("pixel.gif")
        || url.contains("tracking")
        || url.starts_with('#')
        || url.starts_with("mailto:"))
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
