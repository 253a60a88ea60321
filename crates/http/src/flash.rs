//! One-shot notifications carried from a handler to the next rendered page.
//!
//! A handler returns a [`Flash`] next to its redirect; the pending
//! notifications travel in a cookie and the page that displays them takes
//! them out of the [`IncomingFlash`] extractor, which clears the cookie.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    response::{IntoResponseParts, ResponseParts},
};
use serde::{Deserialize, Serialize};

/// Name of the cookie holding pending notifications
pub const FLASH_COOKIE: &str = "flash";

/// Largest encoded cookie value; the oldest notifications are dropped to fit
pub const MAX_FLASH_BYTES: usize = 2048;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Error => "error",
        }
    }
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

/// Notifications to attach to the outgoing response
#[derive(Debug, Default, Clone)]
pub struct Flash {
    notifications: Vec<Notification>,
    clear: bool,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a notification for the next rendered page
    pub fn push(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    fn set_cookie_value(&self) -> Option<String> {
        let clear = || format!("{FLASH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");

        if self.notifications.is_empty() {
            return self.clear.then(clear);
        }

        let fitting = (0..self.notifications.len()).find_map(|dropped| {
            let value = encode(&self.notifications[dropped..])?;
            (value.len() <= MAX_FLASH_BYTES).then_some((dropped, value))
        });

        match fitting {
            Some((dropped, value)) => {
                if dropped > 0 {
                    tracing::warn!(dropped, "flash cookie full, dropping oldest notifications");
                }
                Some(format!("{FLASH_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax"))
            }
            None => {
                tracing::warn!(
                    dropped = self.notifications.len(),
                    "notification too large for the flash cookie"
                );
                Some(clear())
            }
        }
    }
}

fn encode(notifications: &[Notification]) -> Option<String> {
    let json = serde_json::to_string(notifications).ok()?;
    Some(urlencoding::encode(&json).into_owned())
}

impl IntoResponseParts for Flash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(value) = self.set_cookie_value() {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "dropping unencodable flash cookie"),
            }
        }
        Ok(res)
    }
}

/// Notifications left by earlier responses and not displayed yet
#[derive(Debug, Default, Clone)]
pub struct IncomingFlash {
    notifications: Vec<Notification>,
}

impl IncomingFlash {
    /// Read pending notifications from the request's `Cookie` headers.
    /// A malformed cookie counts as no notifications.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let raw = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == FLASH_COOKIE)
            .map(|(_, value)| value);

        let notifications = raw
            .filter(|value| !value.is_empty())
            .and_then(|value| match urlencoding::decode(value) {
                Ok(decoded) => serde_json::from_str(&decoded)
                    .map_err(|e| tracing::debug!(error = %e, "ignoring malformed flash cookie"))
                    .ok(),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring undecodable flash cookie");
                    None
                }
            })
            .unwrap_or_default();

        Self { notifications }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Carry unread notifications over into the next response
    pub fn keep(self) -> Flash {
        Flash {
            notifications: self.notifications,
            clear: false,
        }
    }

    /// Take the notifications for display; the returned [`Flash`] clears the cookie
    pub fn take(self) -> (Vec<Notification>, Flash) {
        let clear = !self.notifications.is_empty();
        (
            self.notifications,
            Flash {
                notifications: Vec::new(),
                clear,
            },
        )
    }
}

impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
