use chrono::{DateTime, Local, Utc};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use tokio::runtime::Handle;

use crate::api::client::ApiClient;
use crate::api::events::UiEvent;
use crate::app::AppState;
use crate::error::{ApiError, AppError};
use crate::forms::CampaignMode;
use crate::scheduler::Poller;
use crate::storage::{Cache, account_key};
use crate::ui::Notice;
use crate::ui::campaigns::{self, CampaignController, FormField};
use crate::ui::chat_view::{self, ChatController};
use crate::ui::login::remember_token;
use crate::ui::sidebar;
use crate::ui::view::{PaneId, Screen};
use crate::utils::{RUNTIME, run_async_to_main};

const HELP: &[&str] = &[
    "Chat:      <text> send to the open conversation | /open <n|id> | /search <term> | /phone <id>",
    "Campaigns: /mode text|template | /set <field> <value> | /edit numbers|params | /start | /items <n> | /form",
    "Fields:    name phone numbers message template lang params",
    "General:   /tab chat|campaigns | /refresh | /login | /help | /quit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Campaigns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    Multiline { field: FormField, lines: Vec<String> },
    LoginEmail,
    LoginPassword { email: String },
}

/// What the input reader should collect next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    Line,
    /// Read without echo.
    Secret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The console. Owns both controllers and runs entirely on the UI thread;
/// async work reports back through [`UiEvent`]s.
pub struct MainWindow<W: Write> {
    app: AppState,
    config: Option<PathBuf>,
    rt: Handle,
    tx: Sender<UiEvent>,
    pub chat: ChatController,
    pub campaigns: CampaignController,
    pollers: Vec<Poller>,
    tab: Tab,
    mode: InputMode,
    pending_login: Option<String>,
    screen: Screen,
    session_expired: bool,
    cache: Option<Cache>,
    account: String,
    cached_at: Option<DateTime<Utc>>,
    out: W,
}

impl<W: Write> MainWindow<W> {
    pub fn new(
        app: AppState,
        config: Option<PathBuf>,
        rt: Handle,
        tx: Sender<UiEvent>,
        cache: Option<Cache>,
        out: W,
    ) -> Result<Self, AppError> {
        let client = ApiClient::new(&app.base_url, app.token.clone())?;
        let account = account_key(client.base().as_str(), app.email.as_deref());
        let mut chat = ChatController::new(client.clone(), rt.clone(), tx.clone());
        let mut campaigns = CampaignController::new(client, rt.clone(), tx.clone());

        let phone = app.phone_number_id.clone().unwrap_or_default();
        chat.form.phone_number_id = phone.clone();
        campaigns.form.phone_number_id = phone;
        campaigns.form.template_language = app.template_language.clone();

        let mut cached_at = None;
        if let Some(cache) = &cache {
            match cache.conversations(&account) {
                Ok(list) if !list.is_empty() => {
                    chat.state.restore_conversations(list);
                    cached_at = cache.last_synced_at(&account).unwrap_or_else(|e| {
                        log::debug!("could not read cache sync time: {}", e);
                        None
                    });
                }
                Ok(_) => {}
                Err(e) => log::warn!("could not read conversation cache: {}", e),
            }
        }

        Ok(Self {
            app,
            config,
            rt,
            tx,
            chat,
            campaigns,
            pollers: Vec::new(),
            tab: Tab::Chat,
            mode: InputMode::Normal,
            pending_login: None,
            screen: Screen::new(),
            session_expired: false,
            cache,
            account,
            cached_at,
            out,
        })
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn is_polling(&self) -> bool {
        !self.pollers.is_empty() && self.pollers.iter().all(Poller::is_running)
    }

    /// First fetches, pollers and the first frame.
    pub fn start(&mut self) -> io::Result<()> {
        self.chat.load_conversations();
        self.campaigns.load_campaigns();
        self.start_pollers();
        writeln!(self.out, "Type /help for commands.")?;
        if let Some(at) = self.cached_at.filter(|_| !self.chat.state.is_live()) {
            writeln!(
                self.out,
                "Showing {} cached conversations from {}, refreshing.",
                self.chat.state.conversations().len(),
                at.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S"),
            )?;
        }
        self.redraw()
    }

    /// How the next line of input should be read.
    pub fn next_read(&self) -> ReadRequest {
        match self.mode {
            InputMode::LoginPassword { .. } => ReadRequest::Secret,
            _ => ReadRequest::Line,
        }
    }

    fn start_pollers(&mut self) {
        let period = self.app.poll_interval();
        self.pollers = vec![self.chat.start_polling(period), self.campaigns.start_polling(period)];
    }

    pub async fn shutdown(&mut self) {
        for poller in self.pollers.drain(..) {
            log::debug!("stopping poller {}", poller.name());
            poller.stop().await;
        }
    }

    pub fn handle_event(&mut self, event: UiEvent) -> io::Result<Flow> {
        let notice = match event {
            UiEvent::Input(line) => return self.handle_input(&line),
            UiEvent::InputClosed => return Ok(Flow::Quit),
            UiEvent::ConversationsLoaded(result) => {
                if let (Ok(list), Some(cache)) = (&result, self.cache.as_mut()) {
                    if let Err(e) = cache.replace_conversations(&self.account, list) {
                        log::warn!("could not cache conversations: {}", e);
                    }
                }
                self.chat.on_conversations(result)
            }
            UiEvent::MessagesLoaded { conversation_id, generation, result } => {
                self.chat.on_messages(conversation_id, generation, result)
            }
            UiEvent::MessageSent(result) => self.chat.on_sent(result),
            UiEvent::CampaignsLoaded(result) => self.campaigns.on_campaigns(result),
            UiEvent::CampaignCreated(result) => self.campaigns.on_created(result),
            UiEvent::CampaignItemsLoaded { campaign_name, result } => {
                self.campaigns.on_items(campaign_name, result)
            }
            UiEvent::LoggedIn(result) => self.on_logged_in(result),
        };
        self.notify(notice)?;
        self.redraw()?;
        Ok(Flow::Continue)
    }

    pub fn handle_input(&mut self, line: &str) -> io::Result<Flow> {
        let raw = line;
        match std::mem::replace(&mut self.mode, InputMode::Normal) {
            InputMode::Normal => {}
            InputMode::Multiline { field, mut lines } => {
                if line.trim() == "." {
                    self.campaigns.set_field(field, &lines.join("\n"));
                } else {
                    lines.push(line.to_string());
                    self.mode = InputMode::Multiline { field, lines };
                    return Ok(Flow::Continue);
                }
                self.redraw()?;
                return Ok(Flow::Continue);
            }
            InputMode::LoginEmail => {
                let email = match line.trim() {
                    "" => self.app.email.clone().unwrap_or_default(),
                    typed => typed.to_string(),
                };
                if email.is_empty() {
                    self.alert("Please enter email and password.")?;
                } else {
                    write!(self.out, "Password: ")?;
                    self.out.flush()?;
                    self.mode = InputMode::LoginPassword { email };
                }
                return Ok(Flow::Continue);
            }
            InputMode::LoginPassword { email } => {
                let password = line.trim().to_string();
                if password.is_empty() {
                    self.alert("Please enter email and password.")?;
                    return Ok(Flow::Continue);
                }
                self.login(email, password);
                return Ok(Flow::Continue);
            }
        }

        let line = line.trim();
        if line.is_empty() {
            if self.tab == Tab::Chat {
                self.send_text("")?;
                self.redraw()?;
            }
            return Ok(Flow::Continue);
        }
        let Some(command) = line.strip_prefix('/') else {
            self.send_text(line)?;
            self.redraw()?;
            return Ok(Flow::Continue);
        };
        let (cmd, arg) = command.split_once(' ').unwrap_or((command, ""));
        let arg = arg.trim();
        match cmd {
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" => {
                for line in HELP {
                    writeln!(self.out, "{}", line)?;
                }
            }
            "tab" => match arg {
                "chat" => self.switch_tab(Tab::Chat),
                "campaigns" => self.switch_tab(Tab::Campaigns),
                _ => self.alert("Usage: /tab chat|campaigns")?,
            },
            "search" => {
                let term = raw.trim_start().strip_prefix("/search").unwrap_or_default();
                self.chat.state.set_search(term.strip_prefix(' ').unwrap_or(term));
            }
            "open" => match sidebar::resolve(&self.chat.state, arg) {
                Some(id) => {
                    self.switch_tab(Tab::Chat);
                    self.chat.select(&id);
                }
                None => self.alert(&format!("No conversation {}", arg))?,
            },
            "phone" => self.chat.form.phone_number_id = arg.to_string(),
            "refresh" => {
                self.chat.refresh();
                self.campaigns.load_campaigns();
                self.screen.invalidate();
            }
            "mode" => match CampaignMode::parse(arg) {
                Some(mode) => {
                    self.switch_tab(Tab::Campaigns);
                    self.campaigns.set_mode(mode);
                }
                None => self.alert("Usage: /mode text|template")?,
            },
            "set" => {
                let (name, value) = arg.split_once(' ').unwrap_or((arg, ""));
                match FormField::parse(name) {
                    Some(field) => self.campaigns.set_field(field, value.trim()),
                    None => self.alert(&format!("Unknown field {}", name))?,
                }
            }
            "edit" => match FormField::parse(arg).filter(FormField::is_multiline) {
                Some(field) => {
                    writeln!(self.out, "One per line, finish with a single '.'")?;
                    self.mode = InputMode::Multiline { field, lines: Vec::new() };
                    return Ok(Flow::Continue);
                }
                None => self.alert("Usage: /edit numbers|params")?,
            },
            "start" => {
                if let Err(e) = self.campaigns.start() {
                    self.alert(&e.to_string())?;
                }
            }
            "items" => {
                let found = arg.parse().map(|n| self.campaigns.load_items(n)).unwrap_or(false);
                if !found {
                    self.alert(&format!("No campaign {}", arg))?;
                }
            }
            "form" => campaigns::form_pane(&self.campaigns.form).write_to(&mut self.out)?,
            "login" => {
                let prompt = match &self.app.email {
                    Some(email) => format!("Email [{}]: ", email),
                    None => "Email: ".to_string(),
                };
                write!(self.out, "{}", prompt)?;
                self.out.flush()?;
                self.mode = InputMode::LoginEmail;
                return Ok(Flow::Continue);
            }
            other => self.alert(&format!("Unknown command /{}. Try /help.", other))?,
        }
        self.redraw()?;
        Ok(Flow::Continue)
    }

    fn send_text(&mut self, text: &str) -> io::Result<()> {
        if self.tab != Tab::Chat {
            return self.alert("Switch to the chat tab (/tab chat) to send messages.");
        }
        if let Err(e) = self.chat.send(text) {
            self.alert(&e.to_string())?;
        }
        Ok(())
    }

    fn switch_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.screen.invalidate();
        }
    }

    fn login(&mut self, email: String, password: String) {
        let client = match ApiClient::new(&self.app.base_url, None) {
            Ok(client) => client,
            Err(e) => {
                log::warn!("login client: {}", e);
                return;
            }
        };
        self.pending_login = Some(email.clone());
        run_async_to_main(&self.rt, &self.tx, async move {
            UiEvent::LoggedIn(client.login(&email, &password).await)
        });
    }

    fn on_logged_in(&mut self, result: Result<String, ApiError>) -> Option<Notice> {
        let email = self.pending_login.take().unwrap_or_default();
        match result {
            Ok(token) => {
                remember_token(&mut self.app, &email, token, self.config.as_deref());
                let client = match ApiClient::new(&self.app.base_url, self.app.token.clone()) {
                    Ok(client) => client,
                    Err(e) => return Some(Notice::Alert(format!("Login failed: {}", e))),
                };
                let account = account_key(client.base().as_str(), Some(email.as_str()));
                if account != self.account {
                    self.switch_account(account);
                }
                self.chat.set_client(client.clone());
                self.campaigns.set_client(client);
                self.session_expired = false;
                self.start_pollers();
                self.chat.refresh();
                self.campaigns.load_campaigns();
                log::info!("logged in as {}", email);
                None
            }
            Err(ApiError::Unauthorized) => Some(Notice::Alert("Invalid email or password.".into())),
            Err(e) => Some(Notice::Alert(format!("Login failed: {}", e))),
        }
    }

    /// Another login owns the lists on screen and in the cache; drop them.
    fn switch_account(&mut self, account: String) {
        let previous = std::mem::replace(&mut self.account, account);
        log::info!("switching account, clearing cached conversations");
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.forget(&previous) {
                log::warn!("could not clear conversation cache: {}", e);
            }
        }
        self.cached_at = None;
        self.chat.state.reset();
        self.campaigns.campaigns.clear();
        self.campaigns.items = None;
        self.screen.invalidate();
    }

    fn alert(&mut self, message: &str) -> io::Result<()> {
        log::debug!("alert: {}", message);
        writeln!(self.out, "! {}", message)
    }

    fn notify(&mut self, notice: Option<Notice>) -> io::Result<()> {
        match notice {
            None => Ok(()),
            Some(Notice::Alert(message)) => self.alert(&message),
            Some(Notice::SessionExpired) => {
                if self.session_expired {
                    return Ok(());
                }
                self.session_expired = true;
                self.alert("Session expired. Use /login to sign in again.")
            }
        }
    }

    fn redraw(&mut self) -> io::Result<()> {
        match self.tab {
            Tab::Chat => {
                let list = sidebar::conversations_pane(&self.chat.state);
                self.screen.draw(PaneId::Conversations, list, &mut self.out)?;
                let chat = chat_view::chat_pane(&self.chat.state, &self.chat.form.message, &Local);
                self.screen.draw(PaneId::Chat, chat, &mut self.out)?;
            }
            Tab::Campaigns => {
                let form = campaigns::form_pane(&self.campaigns.form);
                self.screen.draw(PaneId::CampaignForm, form, &mut self.out)?;
                let list = campaigns::campaigns_pane(&self.campaigns.campaigns, &Local);
                self.screen.draw(PaneId::Campaigns, list, &mut self.out)?;
                if let Some((name, items)) = &self.campaigns.items {
                    let items = campaigns::items_pane(name, items);
                    self.screen.draw(PaneId::CampaignItems, items, &mut self.out)?;
                }
            }
        }
        self.out.flush()
    }
}

/// Reads one line, replacing invalid UTF-8 instead of failing. `None` on EOF.
fn read_line_lossy<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Reads stdin one request at a time so a password prompt never races a
/// plain line read.
fn spawn_input_reader(tx: Sender<UiEvent>, requests: Receiver<ReadRequest>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for request in requests {
            let line = match request {
                ReadRequest::Line => read_line_lossy(&mut stdin.lock()),
                ReadRequest::Secret => rpassword::read_password().map(Some).or_else(|e| {
                    log::warn!("hidden input unavailable: {}", e);
                    read_line_lossy(&mut stdin.lock())
                }),
            };
            match line {
                Ok(Some(line)) => {
                    if tx.send(UiEvent::Input(line)).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("stdin: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(UiEvent::InputClosed);
    });
}

pub fn show_main_window(state: AppState, config: Option<PathBuf>) -> Result<(), AppError> {
    let (tx, rx) = mpsc::channel();
    let cache = Cache::open_default()
        .map_err(|e| log::warn!("conversation cache disabled: {}", e))
        .ok();
    let mut window =
        MainWindow::new(state, config, RUNTIME.handle().clone(), tx.clone(), cache, io::stdout())?;
    let (reads, requests) = mpsc::channel();
    spawn_input_reader(tx, requests);
    window.start()?;
    let _ = reads.send(window.next_read());
    while let Ok(event) = rx.recv() {
        let was_input = matches!(event, UiEvent::Input(_));
        if window.handle_event(event)? == Flow::Quit {
            break;
        }
        if was_input {
            let _ = reads.send(window.next_read());
        }
    }
    RUNTIME.block_on(window.shutdown());
    Ok(())
}
