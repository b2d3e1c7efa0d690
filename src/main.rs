use anyhow::Result;
use tracing::info;

use haven_core::messages::MessageContent;
use haven_core::service::MessengerService;
use haven_core::storage::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    haven_core::logging::init_logging();
    info!("Starting Haven demo exchange");

    let service = MessengerService::new(MemoryStore::new());

    // Two local accounts
    let alice_key = service.create_account("alice", "Correct-Horse-1!").await?;
    service.create_account("bob", "bobs-password").await?;
    info!(fingerprint = %alice_key.fingerprint(), "Published alice's public key");

    // Bob encrypts a message to Alice
    let bob = service.sign_in("bob", "bobs-password").await?;
    service.send_text(&bob, "alice", "meet at 9").await?;
    bob.sign_out();

    // Alice unlocks her key and reads it
    let alice = service.sign_in("alice", "Correct-Horse-1!").await?;
    for message in service.fetch_messages(&alice, "bob").await? {
        match message.content {
            MessageContent::Text(text) => info!(from = %message.from, %text, "Decrypted message"),
            MessageContent::Unreadable => info!(from = %message.from, "Message cannot be read"),
        }
    }

    // Out-of-band backup, then password change through recovery
    let backup = service
        .export_recovery_backup("alice", "Correct-Horse-1!", "QUIET-MEADOW-0042")
        .await?;
    service
        .restore_from_recovery("alice", "New-Horse-2!", "QUIET-MEADOW-0042", &backup)
        .await?;
    info!("Rotated alice's password via recovery backup");

    alice.sign_out();
    Ok(())
}
