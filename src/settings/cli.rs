use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tokenwarden", version, about = "Access/refresh token administration")]
pub struct Cli {
    #[arg(long, global = true)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a new Ed25519 key pair to add to the key ring.
    Keygen {
        #[arg(long, default_value = "k1")]
        kid: String,
    },
    /// Print the public signing keys as a JWK set.
    Keys,
    /// Register a login with an argon2 password hash.
    AddUser {
        #[arg(long)]
        id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and print the issued token set.
    Issue {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Rotate a refresh token. With `--concurrency` > 1 the same token is
    /// refreshed from several tasks at once.
    Refresh {
        token: String,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Delete a refresh token immediately.
    Revoke { token: String },
    /// Validate an access token and print the resolved subject.
    Verify { token: String },
}
