use crate::browser::BrowserSession;
use crate::config::{SessionConfig, Selectors};
use crate::cookies::CookieStore;
use crate::errors::{ApplierError, Result};
use tracing::{debug, error, info, warn};

pub const LOGIN_URL: &str = "https://login.pracuj.pl";
pub const ACCOUNT_URL: &str = "https://www.pracuj.pl/konto";

/// Logs the session in, preferring a saved cookie set and falling back to
/// the scripted credential sequence.
pub struct LoginFlow<'a> {
    config: &'a SessionConfig,
    selectors: &'a Selectors,
    store: CookieStore,
}

impl<'a> LoginFlow<'a> {
    pub fn new(config: &'a SessionConfig, selectors: &'a Selectors, store: CookieStore) -> Self {
        Self {
            config,
            selectors,
            store,
        }
    }

    /// Drives the session to a logged-in state or fails the run.
    pub async fn login(&self, session: &BrowserSession) -> Result<()> {
        if self.try_cookie_login(session).await? {
            info!("Successfully logged in using cookies");
            return Ok(());
        }

        if !self.config.has_credentials() {
            error!("Credentials were not provided and cookie login failed");
            return Err(ApplierError::MissingCredentials);
        }

        self.perform_full_login_sequence(session).await?;
        info!("Full login successful");

        // A fresh login overwrites the stored cookie set; persistence
        // failure must not end an otherwise logged-in run.
        match session.cookies() {
            Ok(cookies) => {
                if let Err(e) = self.store.save(&cookies) {
                    warn!("Failed to save new cookies: {e}");
                } else {
                    debug!("New cookies saved successfully");
                }
            }
            Err(e) => warn!("Could not read session cookies for persistence: {e}"),
        }

        Ok(())
    }

    /// Restores the saved cookie set and checks whether the account page
    /// accepts it. `Ok(false)` means "fall back to credentials".
    async fn try_cookie_login(&self, session: &BrowserSession) -> Result<bool> {
        let cookies = match self.store.load() {
            Ok(Some(cookies)) => cookies,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!("Failed to load cookies: {e}");
                return Ok(false);
            }
        };

        session.navigate(LOGIN_URL)?;
        for cookie in &cookies {
            if let Err(e) = session.set_cookie(cookie) {
                debug!("Could not add cookie {}: {e}", cookie.name);
            }
        }

        session.navigate(ACCOUNT_URL)?;
        match session
            .wait_for_url("account page", |url| url == ACCOUNT_URL)
            .await
        {
            Ok(()) => Ok(is_logged_in(&session.current_url())),
            Err(_) => {
                info!("Cookie login failed, attempting full login");
                Ok(false)
            }
        }
    }

    /// The scripted email → continue → password → submit sequence. Any step
    /// failing here is fatal, there is no recovery once credentials are
    /// exhausted.
    async fn perform_full_login_sequence(&self, session: &BrowserSession) -> Result<()> {
        session.navigate(LOGIN_URL)?;

        session
            .click(&self.selectors.cookie_consent)
            .map_err(|e| step_failed("cookie consent", e))?;
        session
            .type_into(&self.selectors.email_field, &self.config.email)
            .map_err(|e| step_failed("email entry", e))?;
        debug!("Entered email: {}", self.config.email);
        session
            .click(&self.selectors.email_continue)
            .map_err(|e| step_failed("email continue", e))?;
        session
            .type_into(&self.selectors.password_field, &self.config.password)
            .map_err(|e| step_failed("password entry", e))?;
        session
            .click(&self.selectors.login_submit)
            .map_err(|e| step_failed("login submit", e))?;

        session
            .wait_for_url("logged-in account URL", |url| url.contains(ACCOUNT_URL))
            .await
            .map_err(|e| step_failed("post-login redirect", e))?;

        if !is_logged_in(&session.current_url()) {
            return Err(ApplierError::LoginFailed(
                "full login sequence performed but not logged in".to_string(),
            ));
        }
        Ok(())
    }
}

/// The site redirects exactly to the account URL when a session is valid.
pub fn is_logged_in(current_url: &str) -> bool {
    current_url == ACCOUNT_URL
}

fn step_failed(step: &str, err: ApplierError) -> ApplierError {
    ApplierError::LoginFailed(format!("{step}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_url_equality_is_the_logged_in_signal() {
        assert!(is_logged_in("https://www.pracuj.pl/konto"));
        assert!(!is_logged_in("https://www.pracuj.pl/konto/oferty"));
        assert!(!is_logged_in("https://login.pracuj.pl"));
        assert!(!is_logged_in(""));
    }

    #[test]
    fn step_failures_carry_the_step_name() {
        let err = step_failed(
            "password entry",
            ApplierError::ElementNotFound("#password".to_string()),
        );
        assert!(err.to_string().contains("password entry"));
    }
}
