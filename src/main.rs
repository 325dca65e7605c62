#![windows_subsystem = "windows"] // Hides the console window

mod types;
mod style;
mod tools;
mod fetcher;
mod logic;

use iced::widget::{button, column, container, row, text, text_input, toggler, Space};
use iced::{alignment, executor, window, Application, Command, Element, Length, Settings, Size, Subscription, Theme};
use iced::theme;

use fetcher::InstaloaderCli;
use types::*;
use style::*;

pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instagrab=info".into()),
        )
        .init();

    InstaGrab::run(Settings {
        window: window::Settings {
            size: Size::new(420.0, 560.0),
            resizable: false,
            ..Default::default()
        },
        ..Default::default()
    })
}

struct InstaGrab {
    url_input: String,
    use_login: bool,
    username: String,
    password: String,
    status: String,
    status_kind: StatusKind,
    tool_status: String,
    session: Session,
    fetcher: InstaloaderCli,
    active: Option<ActiveRequest>,
    next_id: usize,
}

struct ActiveRequest {
    id: usize,
    job: Job,
}

impl Application for InstaGrab {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Message>) {
        (
            InstaGrab {
                url_input: String::new(),
                use_login: false,
                username: String::new(),
                password: String::new(),
                status: "Waiting...".to_string(),
                status_kind: StatusKind::Idle,
                tool_status: "Checking instaloader...".to_string(),
                session: Session::default(),
                fetcher: InstaloaderCli::new(),
                active: None,
                next_id: 0,
            },
            Command::perform(async {}, |_| Message::CheckTool),
        )
    }

    fn title(&self) -> String { String::from("Instagram Downloader") }
    fn theme(&self) -> Theme { Theme::Dark }

    fn subscription(&self) -> Subscription<Message> {
        match &self.active {
            Some(active) => logic::run_request(active.id, active.job.clone(), self.fetcher.clone()),
            None => Subscription::none(),
        }
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Ignore => Command::none(),
            Message::UrlChanged(s) => { self.url_input = s; Command::none() }
            Message::UseLoginToggled(v) => { self.use_login = v; Command::none() }
            Message::UsernameChanged(s) => { self.username = s; Command::none() }
            Message::PasswordChanged(s) => { self.password = s; Command::none() }

            Message::StartPressed => {
                if self.active.is_some() { return Command::none(); }
                let request = Request {
                    url: self.url_input.clone(),
                    use_login: self.use_login,
                    username: self.username.clone(),
                    password: self.password.clone(),
                };
                match logic::validate(&request, &self.session) {
                    Ok(job) => {
                        let id = self.next_id;
                        self.next_id += 1;
                        let starting = if job.login.is_some() { "Logging in..." } else { "Processing..." };
                        self.status = starting.to_string();
                        self.status_kind = StatusKind::Busy;
                        self.active = Some(ActiveRequest { id, job });
                        Command::none()
                    }
                    Err(err) => message_dialog(rfd::MessageLevel::Warning, "Input error", err.to_string()),
                }
            }

            Message::LoggedIn(id) => {
                if self.is_active(id) {
                    self.session.mark_logged_in();
                    self.status = "Processing...".to_string();
                }
                Command::none()
            }
            Message::ShortcodeFound(id, shortcode) => {
                if self.is_active(id) { self.status = format!("Fetching post metadata... ({shortcode})"); }
                Command::none()
            }
            Message::PostResolved(id) => {
                if self.is_active(id) { self.status = "Downloading...".to_string(); }
                Command::none()
            }
            Message::Downloaded(id) => {
                if self.is_active(id) { self.status = "Download complete!".to_string(); self.status_kind = StatusKind::Done; }
                Command::none()
            }

            Message::RequestFinished(id, result) => {
                if !self.is_active(id) { return Command::none(); }
                // Whatever happened, the start button comes back.
                self.active = None;
                match result {
                    Ok(path) => {
                        self.status = "Download complete!".to_string();
                        self.status_kind = StatusKind::Done;
                        message_dialog(
                            rfd::MessageLevel::Info,
                            "Success",
                            format!("Download finished.\nSaved to: {}", path.display()),
                        )
                    }
                    Err(err) => {
                        self.status = "Something went wrong".to_string();
                        self.status_kind = StatusKind::Error;
                        message_dialog(rfd::MessageLevel::Error, "Error", format!("The download failed:\n{err}"))
                    }
                }
            }

            Message::CheckTool => {
                Command::perform(tools::check_tool_task(), Message::ToolChecked)
            }
            Message::ToolChecked(res) => {
                self.tool_status = match res { Ok(m) => m, Err(e) => e };
                Command::none()
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let busy = self.active.is_some();

        let url_input = text_input("https://www.instagram.com/p/...", &self.url_input)
            .on_input(Message::UrlChanged)
            .on_submit(Message::StartPressed)
            .padding(10);

        let mut username_input = text_input("username", &self.username).padding(8);
        let mut password_input = text_input("password", &self.password).secure(true).padding(8);
        if self.use_login {
            username_input = username_input.on_input(Message::UsernameChanged);
            password_input = password_input.on_input(Message::PasswordChanged);
        }

        let login_box = container(column![
            toggler(Some("Log in before downloading".to_string()), self.use_login, Message::UseLoginToggled).width(Length::Fill),
            row![text("Username:").size(14).width(90), username_input].spacing(10).align_items(alignment::Alignment::Center),
            row![text("Password:").size(14).width(90), password_input].spacing(10).align_items(alignment::Alignment::Center),
        ].spacing(10))
        .style(theme::Container::Custom(Box::new(LoginCardStyle)))
        .padding(15)
        .width(Length::Fill);

        let btn_label = if busy { "Working..." } else { "Start download" };
        let start_btn = button(text(btn_label).size(16).horizontal_alignment(alignment::Horizontal::Center))
            .on_press_maybe(if busy { None } else { Some(Message::StartPressed) })
            .style(theme::Button::Primary)
            .padding(10)
            .width(200);

        let status = text(&self.status).size(14).style(theme::Text::Color(self.status_kind.color()));

        let footer = row![
            text(&self.tool_status).size(12).style(theme::Text::Color(hex_color("#fab387"))),
            Space::with_width(Length::Fill),
            text("Public-account posts only").size(12).style(theme::Text::Color(hex_color("#bac2de"))),
        ].align_items(alignment::Alignment::Center);

        let content = column![
            text("Paste an Instagram post URL").size(16),
            url_input,
            login_box,
            start_btn,
            status,
            Space::with_height(Length::Fill),
            footer,
        ]
        .spacing(15)
        .padding(20)
        .width(Length::Fill)
        .align_items(alignment::Alignment::Center);

        container(content)
            .style(theme::Container::Custom(Box::new(WindowStyle)))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

impl InstaGrab {
    fn is_active(&self, id: usize) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(id)
    }
}

fn message_dialog(level: rfd::MessageLevel, title: &'static str, description: String) -> Command<Message> {
    Command::perform(
        async move {
            rfd::AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .show()
                .await;
        },
        |_| Message::Ignore,
    )
}
