//! Terminal front-end for a conversation
//!
//! Logs in, starts the conversation runtime and relays stdin lines to it.
//! Input is held while an exchange is in flight, the same way the web UI
//! disabled its text box while loading.

use crate::api::AccountStore;
use crate::config::ClientConfig;
use crate::runtime::{ConversationHandle, EngineEvent, EngineSnapshot};
use crate::session::{GoogleProfile, LoginFlow, OAuthCallback, Session};
use crate::state_machine::{ConvContext, ExchangeOutcome};
use crate::transcript::{Message, Role};
use crate::transport::{AuthClient, ChatTransport, HttpTransport, LocalTransport, LoggingTransport};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// Identity and transport choice for a chat session
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub offline: bool,
    pub email: String,
    pub name: String,
}

pub async fn run(
    config: ClientConfig,
    options: ChatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = config.conv_context();

    if options.offline {
        let accounts = Arc::new(AccountStore::new());
        let local = LocalTransport::new(accounts).with_delay(config.reply_delay_ms);
        let transport = Arc::new(local);
        let session = login(Arc::clone(&transport), &options).await;
        chat(context, session, LoggingTransport::new(transport)).await
    } else {
        let http = HttpTransport::new(&config.api_base, config.request_timeout)?;
        let transport = Arc::new(http);
        let session = login(Arc::clone(&transport), &options).await;
        chat(context, session, LoggingTransport::new(transport)).await
    }
}

/// Run both login steps; any failure drops to the demo profile
async fn login<A: AuthClient>(client: A, options: &ChatOptions) -> Session {
    let flow = LoginFlow::new(client);
    let result = async {
        let pending = flow.begin_login().await?;
        // Stand-in for the provider redirect
        let callback = OAuthCallback {
            state: pending.state.clone(),
            profile: GoogleProfile::new(&options.email, &options.name),
        };
        flow.complete_login(pending, callback).await
    }
    .await;

    match result {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed, continuing with demo profile");
            Session::demo()
        }
    }
}

async fn chat<T>(
    context: ConvContext,
    session: Session,
    transport: T,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: ChatTransport + 'static,
{
    let handle = ConversationHandle::spawn(context, session, transport);
    let mut events = handle.subscribe();

    println!("{}", render_status(&handle.snapshot()));
    println!("Type a message, /status, /history or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/status" => println!("{}", render_status(&handle.snapshot())),
            "/history" => {
                for message in &handle.snapshot().transcript {
                    println!("{}", render_message(message));
                }
            }
            _ => {
                handle.submit(line).await?;
                handle.wait_until_idle().await?;
                for line in drain(&mut events) {
                    println!("{line}");
                }
            }
        }
    }

    let snapshot = handle.snapshot();
    tracing::info!(
        messages = snapshot.transcript.len(),
        credits = snapshot.credits(),
        "Chat session ended"
    );
    Ok(())
}

fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => lines.extend(render_event(&event)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Console fell behind engine events");
            }
            Err(_) => break,
        }
    }
    lines
}

pub fn render_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M"),
        message.role.label(),
        message.content
    )
}

/// Console line for an engine event; `None` for events the user already sees
pub fn render_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Message { message } if message.role == Role::Assistant => {
            Some(render_message(message))
        }
        EngineEvent::CreditsChanged { credits } => Some(format!("   credits: {credits}")),
        EngineEvent::ExchangeDone {
            outcome: ExchangeOutcome::FellBack { reason },
            ..
        } => Some(format!("   (backend unavailable: {reason})")),
        EngineEvent::ProtocolInconsistency {
            established,
            received,
        } => Some(format!(
            "   (server switched conversation {established} -> {received}; keeping {established})"
        )),
        EngineEvent::Rejected { reason } => Some(format!("   ({reason})")),
        EngineEvent::Message { .. }
        | EngineEvent::StateChange { .. }
        | EngineEvent::ConversationEstablished { .. }
        | EngineEvent::ExchangeDone { .. } => None,
    }
}

pub fn render_status(snapshot: &EngineSnapshot) -> String {
    let who = snapshot
        .session
        .user
        .as_ref()
        .map_or_else(
            || "anonymous".to_string(),
            |u| format!("{} <{}>", u.name, u.email),
        );
    let conversation = snapshot
        .conversation_id()
        .map_or_else(|| "new".to_string(), ToString::to_string);
    format!(
        "{who} | credits: {} | conversation: {conversation} | {}",
        snapshot.credits(),
        snapshot.status.as_str()
    )
}
