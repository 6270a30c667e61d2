use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Book catalog and reviews with user accounts.
#[derive(Parser, Debug, Clone)]
#[command(name = "book-reviews")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOK_REVIEWS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Book catalog commands.
    Book {
        /// Book subcommand action.
        #[command(subcommand)]
        action: BookCommand,
    },

    /// Review commands.
    Review {
        /// Review subcommand action.
        #[command(subcommand)]
        action: ReviewCommand,
    },

    /// Password reset commands.
    Reset {
        /// Reset subcommand action.
        #[command(subcommand)]
        action: ResetCommand,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Username.
        username: String,
        /// Email address.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
        /// User role (admin or user).
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// Delete a user.
    Del {
        /// Username to delete.
        username: String,
    },

    /// List users.
    List {
        /// Page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Users per page (defaults to the catalog setting).
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Change user password.
    Passwd {
        /// Username.
        username: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Change user role.
    Role {
        /// Username.
        username: String,
        /// New role (admin or user).
        role: String,
    },

    /// Check credentials and show the session that would be issued.
    Login {
        /// Username or email.
        identifier: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Book catalog subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum BookCommand {
    /// Add a book.
    Add {
        /// Product code (must be unique).
        upc: String,
        /// Title.
        title: String,
        /// Author.
        author: String,
        /// Category label.
        #[arg(long)]
        category: Option<String>,
        /// Description.
        #[arg(long)]
        description: Option<String>,
        /// Cover image reference.
        #[arg(long)]
        img_link: Option<String>,
    },

    /// List books, oldest first.
    List {
        /// Page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Books per page (defaults to the catalog setting).
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Find books by field (id, upc, title, category, author).
    Find {
        /// Field name.
        field: String,
        /// Value to match.
        value: String,
    },

    /// List distinct categories.
    Categories,

    /// Delete a book by ID.
    Del {
        /// Book ID.
        id: String,
    },
}

/// Review subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ReviewCommand {
    /// Add a review.
    Add {
        /// Reviewer username.
        username: String,
        /// Book product code.
        upc: String,
        /// Rating from 1 to 5.
        rating: u8,
        /// Comment.
        comment: String,
    },

    /// List reviews of a book.
    List {
        /// Book product code.
        upc: String,
    },

    /// Delete a review by ID.
    Del {
        /// Review ID.
        id: String,
    },
}

/// Password reset subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ResetCommand {
    /// Send a reset link to an email address.
    Request {
        /// Email address.
        email: String,
    },

    /// Set a new password using a reset token.
    Consume {
        /// Token from the reset link.
        token: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Mail configuration.
    #[serde(default)]
    pub mail: MailConfig,

    /// Catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// How long a statement waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Busy timeout as a duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/reviews.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session lifetime in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// Password reset link lifetime in minutes.
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: u32,

    /// Base64 signing secret for reset tokens.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
            reset_token_minutes: default_reset_token_minutes(),
            secret_key: None,
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    3
}

fn default_reset_token_minutes() -> u32 {
    10
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }

    /// Decoded signing secret.
    ///
    /// Without a configured key a random one is generated; tokens issued with
    /// it stop verifying once the process exits.
    pub fn secret(&self) -> crate::error::Result<Vec<u8>> {
        match &self.secret_key {
            Some(encoded) => {
                let secret = STANDARD.decode(encoded.trim()).map_err(|e| {
                    crate::error::AppError::Config(format!("Invalid auth.secret_key: {}", e))
                })?;
                if secret.len() < 16 {
                    return Err(crate::error::AppError::Config(
                        "auth.secret_key must decode to at least 16 bytes".to_string(),
                    ));
                }
                Ok(secret)
            }
            None => {
                tracing::warn!("No auth.secret_key configured, using an ephemeral key");
                Ok(generate_secret())
            }
        }
    }
}

/// Random 32-byte secret.
pub fn generate_secret() -> Vec<u8> {
    use argon2::password_hash::rand_core::{OsRng, RngCore};

    let mut bytes = vec![0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address.
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Public base URL used in emailed links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            base_url: default_base_url(),
        }
    }
}

fn default_sender() -> String {
    "no-reply@localhost".to_string()
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

/// Catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Items per listing page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

fn default_per_page() -> u32 {
    20
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Write the default config to `path`, creating parent directories.
    ///
    /// An existing file is left alone unless `force` is set. Returns whether
    /// the file was written.
    pub fn write_default(path: &Path, force: bool) -> crate::error::Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_default())?;
        Ok(true)
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("book-reviews.toml"),
            dirs::config_dir()
                .map(|p| p.join("book-reviews").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/book-reviews/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content with a fresh signing secret.
    pub fn generate_default() -> String {
        let secret = STANDARD.encode(generate_secret());
        format!(
            r#"# book-reviews configuration

[database]
# path = "/var/lib/book-reviews/reviews.db"
busy_timeout_ms = 5000

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session lifetime in days
session_days = 3
# Password reset link lifetime in minutes
reset_token_minutes = 10
# Signing secret for reset links (base64)
secret_key = "{secret}"

[mail]
sender = "no-reply@localhost"
# Public URL the reset link points at
base_url = "http://localhost:5000"

[catalog]
per_page = 20
"#
        )
    }
}
