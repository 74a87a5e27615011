//! Chat command handler.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::{open_backend, CredentialStore, Identity};
use crate::chat::{ChatMessage, ChatRole, Conversation};
use crate::client::BloretApiClient;
use crate::config::load_config;
use crate::error::{BloretError, Result};

/// Handle the `bloret chat [MESSAGE]` command.
///
/// With a message, sends one turn and prints the answer. Without one, reads
/// turns from stdin until `quit` or end of input.
pub async fn handle_chat(message: Option<String>) -> Result<()> {
    let config = load_config()?;
    let mut store = CredentialStore::new(open_backend(&config.credentials)?);
    let identity = signed_in(&mut store)?;
    let client = BloretApiClient::new(&config.api)?;
    let mut chat = Conversation::default();

    if let Some(message) = message {
        if let Some(reply) = chat.send(&client, &identity, &message).await {
            print_message(reply);
        }
        return Ok(());
    }

    if let Some(greeting) = chat.messages().first() {
        print_message(greeting);
    }
    println!("(type 'quit' to leave)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "quit" {
            break;
        }
        if let Some(reply) = chat.send(&client, &identity, &line).await {
            print_message(reply);
        }
    }

    Ok(())
}

fn signed_in(store: &mut CredentialStore) -> Result<Identity> {
    store.load().ok_or(BloretError::NotAuthenticated)
}

fn print_message(message: &ChatMessage) {
    match (message.role, message.is_error) {
        (_, true) => println!("! {}", message.content),
        (ChatRole::Assistant, false) => println!("Bloriko: {}", message.content),
        (ChatRole::User, false) => println!("you: {}", message.content),
    }
}
