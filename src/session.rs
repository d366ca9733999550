//! Login and logout against the site's account area.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Credentials, SiteConfig};
use crate::error::{Error, Result};
use crate::http::{Exchange, Transport};

static FORM_BUILD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="form_build_id" id="([\w-]+)""#).expect("valid regex")
});

/// Extracts the one-time `form_build_id` token from the login form.
#[must_use]
pub fn extract_form_token(html: &str) -> Option<&str> {
    FORM_BUILD_ID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Fails unless the exchange answered with a 2xx or 3xx code.
fn ensure_success(exchange: &Exchange) -> Result<()> {
    let code = exchange.code();
    if (200..400).contains(&code) {
        Ok(())
    } else {
        Err(Error::UnexpectedResponseCode {
            url: exchange.meta().url().to_string(),
            code,
        })
    }
}

/// Tracks whether this run is logged in.
#[derive(Debug, Clone)]
pub struct Session {
    login_path: String,
    logout_path: String,
    active: bool,
}

impl Session {
    /// Creates an inactive session for the given site.
    #[must_use]
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            login_path: site.login_path.clone(),
            logout_path: site.logout_path.clone(),
            active: false,
        }
    }

    /// Returns true once a login form has been submitted successfully.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Logs in: fetches the login form, reads its token and posts the credentials.
    ///
    /// Success is judged only by the response codes; the page returned after
    /// posting is not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingToken`] if the form carries no token,
    /// [`Error::UnexpectedResponseCode`] on a non-2xx/3xx answer, or a
    /// transport error.
    pub async fn login(&mut self, transport: &Transport, credentials: &Credentials) -> Result<()> {
        log::info!("Try to login...");

        let mut form = transport.action(&self.login_path)?.get().await?;
        ensure_success(&form)?;
        log::info!("{} {}", form.code(), form.title().await?);

        let token = form
            .html()
            .await?
            .and_then(extract_form_token)
            .map(str::to_string)
            .ok_or(Error::MissingToken)?;
        log::debug!("form_build_id = {token}");

        let mut answer = transport
            .action(&self.login_path)?
            .post(&[
                "form_id",
                "user_login",
                "name",
                credentials.name.as_str(),
                "pass",
                credentials.password.as_str(),
                "form_build_id",
                token.as_str(),
            ])
            .await?;
        ensure_success(&answer)?;
        log::info!("{} {}", answer.code(), answer.title().await?);
        log::info!("Login OK!");

        self.active = true;
        Ok(())
    }

    /// Logs out if a login succeeded earlier; otherwise does nothing.
    ///
    /// Redirect following is switched back on first. The response is only logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be reconfigured or the request fails.
    pub async fn logout(&mut self, transport: &mut Transport) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        transport.set_follow_redirects(true)?;
        let mut exchange = transport.action(&self.logout_path)?.get().await?;
        log::info!("Logout: {} {}", exchange.code(), exchange.title().await?);
        Ok(())
    }
}
