use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::error::{ApiError, AppError};
use crate::utils::RUNTIME;

const MAX_ATTEMPTS: u32 = 3;

pub fn prompt_line(prompt: &str) -> io::Result<String> {
    read_prompt(&mut io::stdin().lock(), &mut io::stdout(), prompt)
}

pub(crate) fn read_prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<String> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim().to_string())
}

/// Stores a freshly issued token in `state` and persists it.
pub fn remember_token(state: &mut AppState, email: &str, token: String, config: Option<&Path>) {
    state.email = Some(email.to_string());
    state.token = Some(token);
    if let Err(e) = state.save(config) {
        log::warn!("could not save login: {}", e);
    }
}

/// Asks for email and password until the server hands out a token.
pub fn login_interactive(state: &mut AppState, config: Option<&Path>) -> Result<(), AppError> {
    let client = ApiClient::new(&state.base_url, None)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    writeln!(out, "Log in to {}", client.base())?;

    for attempt in 1..=MAX_ATTEMPTS {
        let email = match state.email.as_deref() {
            Some(saved) if !saved.is_empty() => {
                let typed = read_prompt(&mut input, &mut out, &format!("Email [{}]: ", saved))?;
                if typed.is_empty() { saved.to_string() } else { typed }
            }
            _ => read_prompt(&mut input, &mut out, "Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?.trim().to_string();
        if email.is_empty() || password.is_empty() {
            writeln!(out, "Please enter email and password.")?;
            continue;
        }

        match RUNTIME.block_on(client.login(&email, &password)) {
            Ok(token) => {
                remember_token(state, &email, token, config);
                writeln!(out, "Logged in as {}", email)?;
                return Ok(());
            }
            Err(ApiError::Unauthorized) => writeln!(out, "Invalid email or password.")?,
            Err(e) => writeln!(out, "Login failed: {}", e)?,
        }
        log::debug!("login attempt {} failed", attempt);
    }
    Err(AppError::LoginFailed(MAX_ATTEMPTS))
}
