//! Interactive chat with the ThalAssist assistant.
//!
//! This binary signs a member in against the ThalAssist API, keeps the
//! session in a token file between runs and provides a REPL for the chat
//! endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local API with the advisor endpoint
//! thalassist-chat
//!
//! # Use a remote API and localise answers
//! thalassist-chat --api-url https://thalassist.example.org --location Hyderabad
//!
//! # Use the plain assistant endpoint without colors
//! thalassist-chat --endpoint assistant --no-color
//! ```
//!
//! Set `RUST_LOG=thalassist=debug` to see request traces on stderr.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear the conversation
//! - `/me` - Show your profile
//! - `/suggest <n>` - Send a suggested question
//! - `/stats` - Show session statistics and service analytics
//! - `/logout` - Sign out
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use thalassist::chat::{
    AdvisorEndpoint, AssistantEndpoint, ChatArgs, ChatCommand, ChatConfig, ChatEndpoint,
    Conversation, EndpointFlavor, PlainTextRenderer, Renderer, SendStatus, greeting, help_text,
    parse_command,
};
use thalassist::{FileTokenStore, SessionClient, SessionState, TransfusionUrgency, User, UserRole};

/// What the REPL should do after handling one line.
enum Next {
    Continue,
    SignIn,
    Quit,
}

/// Main entry point for the thalassist-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("thalassist-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(FileTokenStore::new(config.token_file.clone()));
    let client = SessionClient::new(config.client.clone(), store)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling while waiting on a reply
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("ThalAssist Chat ({})", client.base_url());
    println!("Type /help for commands, /quit to exit\n");

    let mut user = match client.initialize().await {
        SessionState::Authenticated => client.user().await,
        _ => None,
    };

    'session: loop {
        let current = match user.take() {
            Some(current) => current,
            None => match sign_in(&client, &mut rl, &mut renderer).await? {
                Some(current) => current,
                None => break 'session,
            },
        };
        renderer.print_info(&format!(
            "Signed in as {} ({}, {})",
            current.name, current.user_type, current.blood_group
        ));

        let conversation =
            Conversation::with_greeting(endpoint(&config, &client), greeting(Some(&current)));
        for entry in conversation.entries() {
            renderer.print_entry(&entry);
        }
        conversation.refresh_analytics().await;

        loop {
            interrupted.store(false, Ordering::Relaxed);

            let line = match rl.readline("You: ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!();
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("\nGoodbye!");
                    break 'session;
                }
                Err(err) => {
                    renderer.print_error(&format!("Input error: {}", err));
                    break 'session;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = rl.add_history_entry(line);

            let next = match parse_command(line) {
                Some(command) => {
                    run_command(command, &client, &conversation, &mut renderer, &interrupted)
                        .await
                }
                None => send(&conversation, line, &mut renderer, &interrupted).await,
            };
            match next {
                Next::Continue => {}
                Next::SignIn => continue 'session,
                Next::Quit => {
                    println!("Goodbye!");
                    break 'session;
                }
            }
        }
    }

    Ok(())
}

fn endpoint(config: &ChatConfig, client: &SessionClient) -> Arc<dyn ChatEndpoint> {
    match config.endpoint {
        EndpointFlavor::Advisor => {
            let mut endpoint = AdvisorEndpoint::new(client.clone());
            if let Some(location) = &config.location {
                endpoint = endpoint.with_location(location.clone());
            }
            Arc::new(endpoint)
        }
        EndpointFlavor::Assistant => Arc::new(AssistantEndpoint::new(client.clone())),
    }
}

/// Prompts until the member signs in.  Returns `None` on end of input.
async fn sign_in(
    client: &SessionClient,
    rl: &mut DefaultEditor,
    renderer: &mut PlainTextRenderer,
) -> Result<Option<User>, Box<dyn std::error::Error>> {
    loop {
        renderer.print_info("Please sign in.");
        let Some(email) = prompt(rl, "Email: ")? else {
            return Ok(None);
        };
        let Some(password) = prompt(rl, "Password: ")? else {
            return Ok(None);
        };
        let Some(role) = prompt(rl, "Role [donor/patient]: ")? else {
            return Ok(None);
        };
        let role = if role.trim().is_empty() {
            UserRole::Donor
        } else {
            match role.parse::<UserRole>() {
                Ok(role) => role,
                Err(err) => {
                    renderer.print_error(&err.to_string());
                    continue;
                }
            }
        };

        match client.login(&email, &password, role).await {
            Ok(user) => return Ok(Some(user)),
            Err(err) => renderer.print_error(err.message()),
        }
    }
}

fn prompt(rl: &mut DefaultEditor, label: &str) -> Result<Option<String>, ReadlineError> {
    loop {
        match rl.readline(label) {
            Ok(line) => return Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
}

async fn send(
    conversation: &Conversation,
    text: &str,
    renderer: &mut PlainTextRenderer,
    interrupted: &AtomicBool,
) -> Next {
    renderer.print_composing();
    let status = tokio::select! {
        status = conversation.send_and_await_reply(text) => status,
        _ = wait_for_interrupt(interrupted) => {
            renderer.print_info("[interrupted]");
            return Next::Continue;
        }
    };
    if let Some(entry) = conversation.entries().last() {
        renderer.print_entry(entry);
    }
    match status {
        SendStatus::SessionExpired(_) => {
            renderer.print_info("Session expired. Please log in again.");
            Next::SignIn
        }
        SendStatus::Empty | SendStatus::Delivered(_) | SendStatus::Failed(_) => Next::Continue,
    }
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn run_command(
    command: ChatCommand,
    client: &SessionClient,
    conversation: &Conversation,
    renderer: &mut PlainTextRenderer,
    interrupted: &AtomicBool,
) -> Next {
    match command {
        ChatCommand::Quit => return Next::Quit,
        ChatCommand::Clear => {
            conversation.clear();
            renderer.print_info("Conversation cleared.");
            for entry in conversation.entries() {
                renderer.print_entry(&entry);
            }
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Me => match client.current_user().await {
            Ok(user) => print_profile(&user),
            Err(err) if err.is_unauthenticated() => {
                renderer.print_info(err.message());
                return Next::SignIn;
            }
            Err(err) => renderer.print_error(err.message()),
        },
        ChatCommand::Compatibility => match client.user().await {
            Some(user) => print_compatibility(&user),
            None => renderer.print_error("Not signed in."),
        },
        ChatCommand::Suggest(n) => {
            let suggestions = conversation.last_suggestions();
            match suggestions.get(n - 1) {
                Some(suggestion) => {
                    println!("You: {suggestion}");
                    return send(conversation, suggestion, renderer, interrupted).await;
                }
                None if suggestions.is_empty() => {
                    renderer.print_error("No suggestions yet.");
                }
                None => renderer.print_error(&format!(
                    "Pick a suggestion between 1 and {}.",
                    suggestions.len()
                )),
            }
        }
        ChatCommand::Logout => {
            client.logout().await;
            renderer.print_info("Signed out.");
            return Next::SignIn;
        }
        ChatCommand::Login => return Next::SignIn,
        ChatCommand::Stats => print_stats(client, conversation).await,
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    Next::Continue
}

fn print_profile(user: &User) {
    let today = OffsetDateTime::now_utc().date();
    println!("    Profile:");
    println!("      Name: {}", user.name);
    println!("      Email: {}", user.email);
    println!("      Role: {}", user.user_type);
    println!("      Blood group: {}", user.blood_group);
    println!("      City: {}", user.city.as_deref().unwrap_or("(not set)"));
    println!("      Phone: {}", user.phone.as_deref().unwrap_or("(not set)"));
    match user.user_type {
        UserRole::Donor => {
            println!("      Total donations: {}", user.total_donations.unwrap_or(0));
            match user.days_until_eligible(today) {
                Some(0) => println!("      Eligible to donate: now"),
                Some(days) => println!("      Eligible to donate: in {days} days"),
                None => println!("      Eligible to donate: now (no donation on record)"),
            }
        }
        UserRole::Patient => {
            match user.transfusion_urgency(today) {
                TransfusionUrgency::Unknown => {
                    println!("      Transfusion urgency: (no transfusion on record)")
                }
                urgency => println!("      Transfusion urgency: {urgency}"),
            }
            if let Some(contact) = &user.emergency_contact {
                println!("      Emergency contact: {contact}");
            }
        }
    }
}

fn print_compatibility(user: &User) {
    let compatibility = user.blood_compatibility();
    let join = |groups: &[thalassist::BloodGroup]| {
        groups
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("    Blood group {}:", user.blood_group);
    println!("      Can donate to: {}", join(compatibility.can_donate_to));
    println!("      Can receive from: {}", join(compatibility.can_receive_from));
    if user.blood_group.is_universal_donor() {
        println!("      Universal donor");
    }
    if user.blood_group.is_universal_recipient() {
        println!("      Universal recipient");
    }
}

async fn print_stats(client: &SessionClient, conversation: &Conversation) {
    let stats = conversation.stats();
    println!("    Session Statistics:");
    println!("      API: {}", client.base_url());
    println!("      Session: {}", client.state().await);
    println!("      Endpoint: {}", stats.endpoint);
    println!("      Entries: {}", stats.entries);
    println!("      Messages sent: {}", stats.user_messages);
    println!(
        "      Replies: {} ({} failed)",
        stats.replies, stats.failed_replies
    );
    match &stats.analytics {
        Some(analytics) => println!("      Service: {analytics}"),
        None => println!("      Service: (no analytics)"),
    }
}
