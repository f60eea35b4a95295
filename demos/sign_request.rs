//! Signed Sync Request Demo
//!
//! Signs a reward event the way the issuer does and prints a curl command
//! that replays it against a local commerce instance. Run with:
//!
//! ```
//! RELAY_SHARED_SECRET=my-secret cargo run --example sign_request -- 0xabc 10
//! ```

use reward_relay::{
    RewardEvent, SharedSecret, Signer, WELLNESS_JOURNAL_ENTRY, canonicalize,
    utils::http::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use std::{env, error::Error};

fn main() -> Result<(), Box<dyn Error>> {
    let secret = env::var("RELAY_SHARED_SECRET").unwrap_or_else(|_| "my-secret-key".to_string());
    let mut args = env::args().skip(1);
    let subject_id = args.next().unwrap_or_else(|| "0xabc".to_string());
    let quantity: u64 = args.next().map(|q| q.parse()).transpose()?.unwrap_or(10);

    let signer = Signer::new(SharedSecret::new(&secret)?);
    let envelope = signer.sign(RewardEvent::new(subject_id, quantity, WELLNESS_JOURNAL_ENTRY))?;
    let canonical = String::from_utf8(canonicalize(&envelope.payload)?)?;
    let body = serde_json::to_string(&envelope.payload)?;

    println!("Signed reward sync");
    println!("==================\n");
    println!("Canonical payload:");
    println!("  {canonical}");
    println!("Message for signature (format: timestamp.canonical):");
    println!("  {}.{canonical}\n", envelope.timestamp);
    println!("{SIGNATURE_HEADER}: {}", envelope.signature);
    println!("{TIMESTAMP_HEADER}: {}\n", envelope.timestamp);

    println!("Example curl command (valid for 5 minutes):");
    println!("curl -X PATCH \\");
    println!("     -H 'Content-Type: application/json' \\");
    println!("     -H '{SIGNATURE_HEADER}: {}' \\", envelope.signature);
    println!("     -H '{TIMESTAMP_HEADER}: {}' \\", envelope.timestamp);
    println!("     -d '{body}' \\");
    println!("     http://localhost:8080/api/v1/nebula/sync-rewards");

    Ok(())
}
