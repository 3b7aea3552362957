//! Server-side render pipeline.
//!
//! One pass per request: match the path to a page, run the page's data
//! prefetch into the hydration cache, and either produce a fully-resolved
//! HTML document or surface the redirect the page signalled. The caller
//! turns a [`RenderOutcome::Redirect`] into an HTTP redirect instead of a
//! body.

pub mod html;

use axum::http::StatusCode;
use harbor_db::models::session::Session;
use harbor_db::repositories::{EmailRepo, UserRepo};
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::state::AppState;

/// Result of one render pass.
#[derive(Debug)]
pub enum RenderOutcome {
    Redirect {
        /// Default 302; pages may signal another status.
        status: StatusCode,
        location: String,
    },
    Page {
        status: StatusCode,
        html: String,
    },
}

/// The pages the server knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Home,
    SignIn,
    SignUp,
    ForgotPassword,
    ResetPassword,
    Verify,
    Settings,
    NotFound,
}

fn match_page(path: &str) -> Page {
    match path {
        "/" => Page::Home,
        "/login" => Page::SignIn,
        "/register" => Page::SignUp,
        "/forgot" => Page::ForgotPassword,
        "/reset" => Page::ResetPassword,
        "/verify" => Page::Verify,
        "/settings" => Page::Settings,
        _ => Page::NotFound,
    }
}

/// Perform one render pass for `path` with the request's session.
pub async fn render_request(
    state: &AppState,
    path: &str,
    session: Option<&Session>,
) -> AppResult<RenderOutcome> {
    let mut cache = Map::new();

    // Every page prefetches the current user; reads go through the
    // authenticator pool.
    let current_user = match session {
        Some(session) => UserRepo::find_by_id(&state.pools.auth, session.user_id).await?,
        None => None,
    };
    cache.insert(
        "currentUser".to_string(),
        current_user
            .as_ref()
            .map(|u| serde_json::to_value(u.to_response()).unwrap_or(Value::Null))
            .unwrap_or(Value::Null),
    );

    let page = match_page(path);

    // Redirect signals collected during the render, exactly one per pass.
    match page {
        Page::SignIn | Page::SignUp | Page::ForgotPassword if current_user.is_some() => {
            return Ok(RenderOutcome::Redirect {
                status: StatusCode::FOUND,
                location: "/".to_string(),
            });
        }
        Page::Settings => match &current_user {
            None => {
                return Ok(RenderOutcome::Redirect {
                    status: StatusCode::FOUND,
                    location: format!("/login?next={}", urlencoding::encode(path)),
                });
            }
            Some(user) => {
                let emails = EmailRepo::list_for_user(&state.pools.auth, user.id).await?;
                let emails: Vec<Value> = emails
                    .iter()
                    .map(|e| serde_json::to_value(e.to_response()).unwrap_or(Value::Null))
                    .collect();
                cache.insert("userEmails".to_string(), Value::Array(emails));
            }
        },
        _ => {}
    }

    let (title, markup) = page_markup(page, current_user.as_ref().map(|u| u.username.as_str()));
    let status = if page == Page::NotFound {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };

    let pretty = state.config.environment.expose_internals();
    let document = html::render_document(title, &markup, &Value::Object(cache), pretty);

    Ok(RenderOutcome::Page {
        status,
        html: document,
    })
}

/// The static shell for each page; the client re-activates interactivity
/// from the embedded data cache.
fn page_markup(page: Page, username: Option<&str>) -> (&'static str, String) {
    match page {
        Page::Home => {
            let greeting = match username {
                Some(name) => format!("Welcome back, {}", html::escape_text(name)),
                None => "Welcome".to_string(),
            };
            ("Home", format!("<main data-page=\"home\"><h1>{greeting}</h1></main>"))
        }
        Page::SignIn => (
            "Sign in",
            "<main data-page=\"signin\"><h1>Sign in</h1></main>".to_string(),
        ),
        Page::SignUp => (
            "Create account",
            "<main data-page=\"signup\"><h1>Create account</h1></main>".to_string(),
        ),
        Page::ForgotPassword => (
            "Forgot password",
            "<main data-page=\"forgot\"><h1>Forgot password</h1></main>".to_string(),
        ),
        Page::ResetPassword => (
            "Reset password",
            "<main data-page=\"reset\"><h1>Reset password</h1></main>".to_string(),
        ),
        Page::Verify => (
            "Verify email",
            "<main data-page=\"verify\"><h1>Verify email</h1></main>".to_string(),
        ),
        Page::Settings => (
            "Settings",
            "<main data-page=\"settings\"><h1>Settings</h1></main>".to_string(),
        ),
        Page::NotFound => (
            "Not found",
            "<main data-page=\"not-found\"><h1>Page not found</h1></main>".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_map_to_pages() {
        assert_eq!(match_page("/"), Page::Home);
        assert_eq!(match_page("/settings"), Page::Settings);
        assert_eq!(match_page("/nope"), Page::NotFound);
        assert_eq!(match_page("/login/extra"), Page::NotFound);
    }

    #[test]
    fn usernames_in_markup_are_escaped() {
        let (_, markup) = page_markup(Page::Home, Some("<b>x</b>"));
        assert!(markup.contains("&lt;b&gt;x&lt;/b&gt;"));
    }
}
