//! Authentication command handlers.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::{
    authorize_url, extract_code, open_backend, open_browser, ChangeOrigin, CredentialStore,
};
use crate::client::BloretApiClient;
use crate::config::load_config;
use crate::error::{BloretError, Result};

/// Handle the `bloret auth login` command.
pub async fn handle_login(code: Option<String>, no_browser: bool) -> Result<()> {
    let config = load_config()?;

    let input = match code {
        Some(code) => code,
        None => {
            let url = authorize_url(&config.api)?;

            println!("To sign in, please visit:");
            println!();
            println!("  {url}");
            println!();

            if !no_browser {
                if open_browser(&url) {
                    println!("Browser opened automatically.");
                } else {
                    println!("Could not open browser. Please visit the URL manually.");
                }
                println!();
            }

            println!("After signing in, paste the code or the address you were redirected to:");
            read_line().await?
        }
    };

    let code = extract_code(&input).ok_or_else(|| {
        BloretError::AuthenticationFailed("no authorization code in input".to_string())
    })?;

    println!("Exchanging code with Bloret...");
    let client = BloretApiClient::new(&config.api)?;
    let identity = client.exchange_code(&code).await?;

    let mut store = CredentialStore::new(open_backend(&config.credentials)?);
    let change = store.save(identity, ChangeOrigin::Local);

    if let Some(identity) = change.identity {
        println!();
        println!("Successfully signed in as {}!", identity.username);
    }

    Ok(())
}

/// Handle the `bloret auth logout` command.
pub async fn handle_logout() -> Result<()> {
    let config = load_config()?;
    let mut store = CredentialStore::new(open_backend(&config.credentials)?);

    if store.load().is_some() {
        store.clear(ChangeOrigin::Local);
        println!("Successfully signed out.");
    } else {
        println!("Not currently signed in.");
    }

    Ok(())
}

/// Handle the `bloret auth status` command.
pub async fn handle_status() -> Result<()> {
    let config = load_config()?;
    let mut store = CredentialStore::new(open_backend(&config.credentials)?);

    if let Some(identity) = store.load() {
        println!("Signed in");
        println!();
        println!("  Username:   {}", identity.username);
        if let Some(email) = &identity.email {
            println!("  Email:      {email}");
        }
        println!("  API Server: {}", config.api.base_url);
        println!("  Storage:    {:?}", config.credentials.backend);
    } else {
        println!("Not signed in");
        println!();
        println!("Run 'bloret auth login' to sign in.");
    }

    Ok(())
}

async fn read_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line)
}
