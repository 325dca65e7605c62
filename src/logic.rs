use iced::Subscription;
use std::path::PathBuf;
use regex::Regex;
use once_cell::sync::Lazy;

use crate::fetcher::{InstaloaderCli, PostFetcher};
use crate::tools;
use crate::types::{Credentials, Job, Message, PostHandle, Request, RequestError, Session};

pub const DOWNLOADS_DIR: &str = "downloads";

// p = regular post, reel/reels = reels, tv = IGTV. The shortcode runs
// until the next path separator, query, fragment or ampersand.
static SHORTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(p|reel|reels|tv)/([^/?#&]+)").unwrap()
});

pub fn extract_shortcode(url: &str) -> Option<&str> {
    SHORTCODE_RE.captures(url).and_then(|c| c.get(2)).map(|m| m.as_str())
}

/// Checks everything that can be checked without the network. Runs on
/// the UI thread, so a failure here never starts the background task.
pub fn validate(request: &Request, session: &Session) -> Result<Job, RequestError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(RequestError::Validation("Enter a post URL first.".into()));
    }

    let login = if request.use_login && !session.is_logged_in() {
        let username = request.username.trim();
        let password = request.password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(RequestError::Validation(
                "Enter both username and password to log in.".into(),
            ));
        }
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    } else {
        None
    };

    Ok(Job {
        url: url.to_string(),
        login,
        downloads_dir: PathBuf::from(DOWNLOADS_DIR),
    })
}

pub fn run_request(id: usize, job: Job, fetcher: InstaloaderCli) -> Subscription<Message> {
    iced::subscription::unfold(id, Step::start(id, job, fetcher), advance)
}

pub enum Step<F: PostFetcher> {
    Login { id: usize, creds: Credentials, job: Job, fetcher: F },
    Extract { id: usize, job: Job, fetcher: F },
    Resolve { id: usize, shortcode: String, job: Job, fetcher: F },
    Download { id: usize, post: PostHandle, downloads_dir: PathBuf, fetcher: F },
    Reveal { id: usize, save_path: PathBuf },
    Done,
}

impl<F: PostFetcher> Step<F> {
    pub fn start(id: usize, mut job: Job, fetcher: F) -> Self {
        match job.login.take() {
            Some(creds) => Step::Login { id, creds, job, fetcher },
            None => Step::Extract { id, job, fetcher },
        }
    }
}

/// One transition of the request state machine. Each call does the work
/// of the current phase and reports the outcome as the message the UI
/// thread will receive.
pub async fn advance<F: PostFetcher>(step: Step<F>) -> (Message, Step<F>) {
    match step {
        Step::Login { id, creds, job, fetcher } => {
            match fetcher.login(&creds.username, &creds.password).await {
                Ok(()) => (Message::LoggedIn(id), Step::Extract { id, job, fetcher }),
                Err(e) => fail(id, e),
            }
        }

        Step::Extract { id, job, fetcher } => match extract_shortcode(&job.url) {
            Some(sc) => {
                let shortcode = sc.to_string();
                (
                    Message::ShortcodeFound(id, shortcode.clone()),
                    Step::Resolve { id, shortcode, job, fetcher },
                )
            }
            None => fail(
                id,
                RequestError::Validation("not a valid Instagram post URL".into()),
            ),
        },

        Step::Resolve { id, shortcode, job, fetcher } => {
            if let Err(e) = tokio::fs::create_dir_all(&job.downloads_dir).await {
                return fail(id, RequestError::Download(e.to_string()));
            }
            match fetcher.resolve_post(&shortcode).await {
                Ok(post) => (
                    Message::PostResolved(id),
                    Step::Download { id, post, downloads_dir: job.downloads_dir, fetcher },
                ),
                Err(e) => fail(id, e),
            }
        }

        Step::Download { id, post, downloads_dir, fetcher } => {
            match fetcher.download(&post, &downloads_dir, post.shortcode()).await {
                Ok(()) => {
                    let target = downloads_dir.join(post.shortcode());
                    let save_path = dunce::canonicalize(&target).unwrap_or(target);
                    (Message::Downloaded(id), Step::Reveal { id, save_path })
                }
                Err(e) => fail(id, e),
            }
        }

        Step::Reveal { id, save_path } => {
            // Not fatal on headless systems, the files are already there.
            if let Err(e) = tools::reveal_in_file_browser(&save_path) {
                tracing::warn!("could not open the file browser: {e}");
            }
            (Message::RequestFinished(id, Ok(save_path)), Step::Done)
        }

        Step::Done => {
            std::future::pending::<()>().await;
            (Message::Ignore, Step::Done)
        }
    }
}

fn fail<F: PostFetcher>(id: usize, err: RequestError) -> (Message, Step<F>) {
    (Message::RequestFinished(id, Err(err)), Step::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::stub::StubFetcher;
    use assert_matches::assert_matches;
    use std::path::Path;

    #[test]
    fn extracts_shortcode_from_post_url() {
        assert_eq!(extract_shortcode("https://instagram.com/p/CzX9ab1/"), Some("CzX9ab1"));
    }

    #[test]
    fn extracts_shortcode_from_reel_and_reels_urls() {
        assert_eq!(extract_shortcode("https://instagram.com/reel/XyZ/"), Some("XyZ"));
        assert_eq!(
            extract_shortcode("https://www.instagram.com/reels/AbC-d_9/"),
            Some("AbC-d_9")
        );
    }

    #[test]
    fn extracts_shortcode_from_tv_url() {
        assert_eq!(extract_shortcode("https://instagram.com/tv/IGTVcode"), Some("IGTVcode"));
    }

    #[test]
    fn shortcode_stops_at_query_fragment_and_ampersand() {
        assert_eq!(extract_shortcode("https://instagram.com/p/AAA?igshid=xyz"), Some("AAA"));
        assert_eq!(extract_shortcode("https://instagram.com/p/BBB#comments"), Some("BBB"));
        assert_eq!(extract_shortcode("https://instagram.com/p/CCC&next=1"), Some("CCC"));
    }

    #[test]
    fn urls_without_a_post_segment_do_not_match() {
        assert_eq!(extract_shortcode("https://www.instagram.com/explore/"), None);
        assert_eq!(extract_shortcode("not even a url"), None);
    }

    fn request(url: &str, use_login: bool, username: &str, password: &str) -> Request {
        Request {
            url: url.to_string(),
            use_login,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn empty_or_whitespace_url_is_rejected() {
        let session = Session::default();
        let err = validate(&request("", false, "", ""), &session).unwrap_err();
        assert_matches!(err, RequestError::Validation(_));
        let err = validate(&request("   ", false, "", ""), &session).unwrap_err();
        assert_matches!(err, RequestError::Validation(_));
    }

    #[test]
    fn blank_credentials_with_login_are_rejected() {
        let session = Session::default();
        let url = "https://instagram.com/reel/XyZ/";
        let err = validate(&request(url, true, "alice", "  "), &session).unwrap_err();
        assert_matches!(err, RequestError::Validation(_));
        let err = validate(&request(url, true, "", "secret"), &session).unwrap_err();
        assert_matches!(err, RequestError::Validation(_));
    }

    #[test]
    fn credentials_are_trimmed_into_the_job() {
        let session = Session::default();
        let job = validate(
            &request(" https://instagram.com/p/AAA/ ", true, " alice ", " secret "),
            &session,
        )
        .unwrap();
        assert_eq!(job.url, "https://instagram.com/p/AAA/");
        let creds = job.login.unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn logged_in_session_builds_a_job_without_credentials() {
        let mut session = Session::default();
        session.mark_logged_in();
        // Even blank credentials pass, no login will happen anyway.
        let job = validate(
            &request("https://instagram.com/p/AAA/", true, "", ""),
            &session,
        )
        .unwrap();
        assert!(job.login.is_none());
    }

    fn job(url: &str, downloads_dir: &Path, login: Option<Credentials>) -> Job {
        Job {
            url: url.to_string(),
            login,
            downloads_dir: downloads_dir.to_path_buf(),
        }
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    // Advances the state machine until the download finished or the
    // request failed, stopping short of the file-browser step.
    async fn drive(mut step: Step<StubFetcher>) -> (Vec<Message>, Step<StubFetcher>) {
        let mut messages = Vec::new();
        loop {
            let (msg, next) = advance(step).await;
            let stop = matches!(msg, Message::Downloaded(_) | Message::RequestFinished(..));
            messages.push(msg);
            step = next;
            if stop {
                return (messages, step);
            }
        }
    }

    #[tokio::test]
    async fn media_lands_in_a_flat_shortcode_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let downloads = tmp.path().join("downloads");
        let fetcher = StubFetcher::default();
        let cwd_before = std::env::current_dir().unwrap();

        let start = Step::start(
            1,
            job("https://instagram.com/p/CzX9ab1/", &downloads, None),
            fetcher.clone(),
        );
        let (messages, step) = drive(start).await;

        assert!(matches!(messages.last(), Some(Message::Downloaded(1))));
        assert!(downloads.join("CzX9ab1").join("media.jpg").is_file());
        assert!(!downloads.join("CzX9ab1").join("CzX9ab1").exists());
        match step {
            Step::Reveal { save_path, .. } => {
                assert_eq!(save_path, dunce::canonicalize(downloads.join("CzX9ab1")).unwrap());
            }
            _ => panic!("expected the reveal step after a finished download"),
        }
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[tokio::test]
    async fn login_runs_before_resolve_and_download() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default();

        let start = Step::start(
            2,
            job(
                "https://instagram.com/reel/XyZ/",
                &tmp.path().join("downloads"),
                Some(creds("alice", "secret")),
            ),
            fetcher.clone(),
        );
        let (messages, _) = drive(start).await;

        assert!(matches!(messages.first(), Some(Message::LoggedIn(2))));
        assert_eq!(
            fetcher.recorded_calls(),
            vec!["login:alice", "resolve:XyZ", "download:XyZ:XyZ"]
        );
    }

    #[tokio::test]
    async fn no_login_call_without_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default();

        let start = Step::start(
            3,
            job("https://instagram.com/p/AAA/", &tmp.path().join("downloads"), None),
            fetcher.clone(),
        );
        drive(start).await;

        assert_eq!(fetcher.recorded_calls(), vec!["resolve:AAA", "download:AAA:AAA"]);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_any_collaborator_call() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default();

        let start = Step::start(
            4,
            job("https://www.instagram.com/explore/", &tmp.path().join("downloads"), None),
            fetcher.clone(),
        );
        let (messages, _) = drive(start).await;

        assert_matches!(
            messages.last(),
            Some(Message::RequestFinished(4, Err(RequestError::Validation(_))))
        );
        assert!(fetcher.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn resolve_failure_with_404_surfaces_post_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher {
            resolve_error: Some(RequestError::NotFound),
            ..Default::default()
        };
        let cwd_before = std::env::current_dir().unwrap();

        let start = Step::start(
            5,
            job("https://instagram.com/p/GONE/", &tmp.path().join("downloads"), None),
            fetcher.clone(),
        );
        let (messages, _) = drive(start).await;

        assert_matches!(
            messages.last(),
            Some(Message::RequestFinished(5, Err(RequestError::NotFound)))
        );
        assert_eq!(fetcher.recorded_calls(), vec!["resolve:GONE"]);
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[tokio::test]
    async fn two_factor_login_failure_is_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher {
            login_error: Some(RequestError::UnsupportedAuth),
            ..Default::default()
        };

        let start = Step::start(
            6,
            job(
                "https://instagram.com/p/AAA/",
                &tmp.path().join("downloads"),
                Some(creds("alice", "secret")),
            ),
            fetcher.clone(),
        );
        let (messages, _) = drive(start).await;

        assert_matches!(
            messages.last(),
            Some(Message::RequestFinished(6, Err(RequestError::UnsupportedAuth)))
        );
        assert_eq!(fetcher.recorded_calls(), vec!["login:alice"]);
    }
}
