//! book-reviews command-line entry point.

use book_reviews::{
    auth::{AuthService, RegisterForm, SessionContext},
    config::{BookCommand, Cli, Command, Config, ResetCommand, ReviewCommand, UserCommand},
    db::{Book, Database, Review, Role},
    mail::LogMailer,
    repository::{BookRepository, Page, ReviewRepository, UserRepository},
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_reviews=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Command::Init { force } => cmd_init(force, cli.config),
        Command::User { action } => cmd_user(action, &load_config(cli.config)?),
        Command::Book { action } => cmd_book(action, &load_config(cli.config)?),
        Command::Review { action } => cmd_review(action, &load_config(cli.config)?),
        Command::Reset { action } => cmd_reset(action, &load_config(cli.config)?),
    }
}

/// Find or load config.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path.or_else(Config::find_config_file) {
        Some(path) => Ok(Config::load(&path)?),
        None => Ok(Config::default()),
    }
}

fn open_db(config: &Config) -> anyhow::Result<Database> {
    Ok(Database::open_with_timeout(
        &config.database.path,
        config.database.busy_timeout(),
    )?)
}

fn auth_service(db: Database, config: &Config) -> anyhow::Result<AuthService> {
    Ok(AuthService::new(
        db,
        &config.auth,
        &config.auth.secret()?,
        Arc::new(LogMailer),
        config.mail.sender.clone(),
        config.mail.base_url.clone(),
    ))
}

/// Initialize config and database.
///
/// An existing config is kept unless `force` is set; the database is created
/// at the path the resulting config names.
fn cmd_init(force: bool, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.toml"));

    if Config::write_default(&config_path, force)? {
        println!("Created config file: {}", config_path.display());
    } else {
        println!(
            "Config file already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    // Initialize database
    let config = Config::load(&config_path)?;
    let _db = open_db(&config)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit {} to configure the site.", config_path.display());
    println!("Then run: book-reviews user add <username> <email> --role admin");

    Ok(())
}

/// User management commands.
fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = open_db(config)?;
    let auth = auth_service(db.clone(), config)?;
    let users = UserRepository::new(db);

    match action {
        UserCommand::Add {
            username,
            email,
            password,
            role,
        } => {
            let role: Role = role.parse()?;
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let form = RegisterForm {
                username,
                email,
                confirm_password: password.clone(),
                password,
            };
            let user = auth.create_user(&form, role)?;
            println!(
                "Created user: {} <{}> (role: {}, id: {})",
                user.username, user.email, user.role, user.id
            );
        }

        UserCommand::Del { username } => match users.find_by_username(&username)? {
            Some(user) if users.delete(&user.id)? => println!("Deleted user: {}", username),
            _ => println!("User not found: {}", username),
        },

        UserCommand::List { page, per_page } => {
            let Page { items, pagination } =
                users.list_paginated(page, per_page.unwrap_or(config.catalog.per_page))?;
            if items.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<30} {:<8} {:<36}", "USERNAME", "EMAIL", "ROLE", "ID");
                println!("{}", "-".repeat(96));
                for user in items {
                    println!(
                        "{:<20} {:<30} {:<8} {:<36}",
                        user.username, user.email, user.role, user.id
                    );
                }
            }
            println!(
                "\nPage {}/{} ({} users)",
                pagination.page,
                pagination.total_pages(),
                pagination.total_items
            );
        }

        UserCommand::Passwd { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.set_password(&username, &password)? {
                println!("Password changed for: {}", username);
            } else {
                println!("User not found: {}", username);
            }
        }

        UserCommand::Role { username, role } => {
            let role: Role = role.parse()?;
            match users.find_by_username(&username)? {
                Some(mut user) => {
                    user.role = role;
                    users.update(&user)?;
                    println!("Role of {} set to {}", username, role);
                }
                None => println!("User not found: {}", username),
            }
        }

        UserCommand::Login {
            identifier,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let mut session = SessionContext::anonymous();
            auth.login(&mut session, &identifier, &password)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
    }

    Ok(())
}

/// Book catalog commands.
fn cmd_book(action: BookCommand, config: &Config) -> anyhow::Result<()> {
    let books = BookRepository::new(open_db(config)?);

    match action {
        BookCommand::Add {
            upc,
            title,
            author,
            category,
            description,
            img_link,
        } => {
            if books.upc_exists(&upc)? {
                anyhow::bail!("A book with UPC '{}' already exists", upc);
            }

            let mut book = Book::new(upc, title, author);
            book.category = category;
            book.description = description;
            book.img_link = img_link;

            books.create(&book)?;
            println!("Added book: {} ({}, id: {})", book.title, book.upc, book.id);
        }

        BookCommand::List { page, per_page } => {
            let Page { items, pagination } =
                books.list_paginated(page, per_page.unwrap_or(config.catalog.per_page))?;
            if items.is_empty() {
                println!("No books found.");
            } else {
                print_books(&items);
            }
            println!(
                "\nPage {}/{} ({} books)",
                pagination.page,
                pagination.total_pages(),
                pagination.total_items
            );
        }

        BookCommand::Find { field, value } => {
            let found = books.get_by_field(&field, &value)?.into_vec();
            if found.is_empty() {
                println!("No books found.");
            } else {
                print_books(&found);
            }
        }

        BookCommand::Categories => {
            for category in books.list_distinct_categories()? {
                println!("{}", category);
            }
        }

        BookCommand::Del { id } => {
            if books.delete(&id)? {
                println!("Deleted book: {}", id);
            } else {
                println!("Book not found: {}", id);
            }
        }
    }

    Ok(())
}

fn print_books(books: &[Book]) {
    println!("{:<14} {:<40} {:<24} {:<16} ID", "UPC", "TITLE", "AUTHOR", "CATEGORY");
    println!("{}", "-".repeat(132));
    for book in books {
        println!(
            "{:<14} {:<40} {:<24} {:<16} {}",
            book.upc,
            book.title,
            book.author,
            book.category.as_deref().unwrap_or("-"),
            book.id
        );
    }
}

/// Review commands.
fn cmd_review(action: ReviewCommand, config: &Config) -> anyhow::Result<()> {
    let db = open_db(config)?;
    let books = BookRepository::new(db.clone());
    let users = UserRepository::new(db.clone());
    let reviews = ReviewRepository::new(db);

    match action {
        ReviewCommand::Add {
            username,
            upc,
            rating,
            comment,
        } => {
            let user = users
                .find_by_username(&username)?
                .ok_or_else(|| anyhow::anyhow!("User not found: {}", username))?;
            let book = books
                .get_by_field("upc", &upc)?
                .into_vec()
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Book not found: {}", upc))?;

            let review = Review::new(user.id, book.id, rating, comment)?;
            reviews.create(&review)?;
            println!("Added review: {}", review.id);
        }

        ReviewCommand::List { upc } => {
            let book = books
                .get_by_field("upc", &upc)?
                .into_vec()
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Book not found: {}", upc))?;

            let details = reviews.list_for_book_with_details(&book.id)?;
            if details.is_empty() {
                println!("No reviews for {}.", book.title);
                return Ok(());
            }

            if let Some(avg) = reviews.average_rating(&book.id)? {
                println!("{} - average rating {:.1} ({} reviews)\n", book.title, avg, details.len());
            }
            for d in details {
                println!(
                    "[{}] {} ({}/5) {}: {}",
                    d.review.created_at.format("%Y-%m-%d %H:%M"),
                    d.user.username,
                    d.review.rating,
                    d.review.id,
                    d.review.comment
                );
            }
        }

        ReviewCommand::Del { id } => {
            if reviews.delete(&id)? {
                println!("Deleted review: {}", id);
            } else {
                println!("Review not found: {}", id);
            }
        }
    }

    Ok(())
}

/// Password reset commands.
fn cmd_reset(action: ResetCommand, config: &Config) -> anyhow::Result<()> {
    let auth = auth_service(open_db(config)?, config)?;

    match action {
        ResetCommand::Request { email } => {
            println!("{}", auth.request_password_reset(&email));
        }

        ResetCommand::Consume { token, password } => {
            let (password, confirm) = match password {
                Some(p) => (p.clone(), p),
                None => (
                    prompt_password("New password: ")?,
                    prompt_password("Confirm password: ")?,
                ),
            };

            auth.consume_password_reset(&token, &password, &confirm)?;
            println!("Password updated. You can now log in.");
        }
    }

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
