use std::path::PathBuf;
use iced::Color;
use serde::Deserialize;
use thiserror::Error;

use crate::style::hex_color;

/// What went wrong with a request, in the order the user can hit it.
/// The `Display` strings are shown verbatim in the error dialog.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(String),

    #[error("accounts with two-factor authentication are not supported by this tool")]
    UnsupportedAuth,

    #[error("wrong username or password")]
    Auth,

    #[error("login required (the post may belong to a private account)")]
    Access,

    #[error("post not found")]
    NotFound,

    #[error("{0}")]
    Download(String),
}

#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub use_login: bool,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A validated request, ready to hand to the background sequence.
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    pub login: Option<Credentials>,
    pub downloads_dir: PathBuf,
}

/// Whether a login already succeeded during this run of the program.
/// Set once, never cleared (there is no logout).
#[derive(Debug, Default)]
pub struct Session {
    logged_in: bool,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn mark_logged_in(&mut self) {
        self.logged_in = true;
    }
}

/// Opaque handle for a resolved post.
#[derive(Debug, Clone)]
pub struct PostHandle {
    shortcode: String,
}

impl PostHandle {
    pub fn new(shortcode: impl Into<String>) -> Self {
        PostHandle { shortcode: shortcode.into() }
    }

    pub fn shortcode(&self) -> &str {
        &self.shortcode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Idle,
    Busy,
    Done,
    Error,
}

impl StatusKind {
    pub fn color(&self) -> Color {
        match self {
            StatusKind::Idle => hex_color("#a6adc8"),
            StatusKind::Busy => hex_color("#89b4fa"),
            StatusKind::Done => hex_color("#a6e3a1"),
            StatusKind::Error => hex_color("#f38ba8"),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GitHubRelease { pub tag_name: String }

#[derive(Debug, Clone)]
pub enum Message {
    Ignore,
    UrlChanged(String),
    UseLoginToggled(bool),
    UsernameChanged(String),
    PasswordChanged(String),
    StartPressed,

    // Progress of the active request
    LoggedIn(usize),
    ShortcodeFound(usize, String),
    PostResolved(usize),
    Downloaded(usize),
    RequestFinished(usize, Result<PathBuf, RequestError>),

    CheckTool,
    ToolChecked(Result<String, String>),
}
