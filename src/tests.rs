use crate::auth::{
    AccountUpdate, AuthService, RESET_REQUEST_MESSAGE, RegisterForm, SessionContext, hash_password,
};
use crate::config::AuthConfig;
use crate::db::{Book, Database, Review, Role, User};
use crate::error::{AppError, Result};
use crate::mail::{Mailer, OutgoingEmail};
use crate::repository::{BookRepository, Lookup, ReviewRepository, UserRepository};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn auth_with(db: &Database, config: &AuthConfig) -> (AuthService, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let auth = AuthService::new(
        db.clone(),
        config,
        b"0123456789abcdef-test",
        mailer.clone(),
        "no-reply@books.test",
        "http://books.test/",
    );
    (auth, mailer)
}

fn test_auth(db: &Database) -> (AuthService, Arc<RecordingMailer>) {
    auth_with(db, &AuthConfig::default())
}

fn form(username: &str, email: &str, password: &str) -> RegisterForm {
    RegisterForm {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        confirm_password: password.to_string(),
    }
}

fn reset_token(email: &OutgoingEmail) -> String {
    let (_, rest) = email
        .text_body
        .split_once("/reset_password/")
        .expect("reset link in body");
    rest.split_whitespace().next().unwrap().to_string()
}

#[test]
fn book_create_get_update_delete() {
    let db = test_db();
    let books = BookRepository::new(db);

    let book = Book::new("UPC100", "Dune", "Frank Herbert")
        .with_category("Science Fiction")
        .with_description("Spice")
        .with_img_link("covers/dune.jpg");
    books.create(&book).unwrap();

    let stored = books.get(&book.id).unwrap().unwrap();
    assert_eq!(stored, book);

    let mut changed = stored.clone();
    changed.title = "Dune Messiah".to_string();
    assert!(books.update(&changed).unwrap());

    let stored = books.get(&book.id).unwrap().unwrap();
    assert_eq!(stored.title, "Dune Messiah");
    assert_eq!(stored.created_at, book.created_at);
    assert!(stored.updated_at >= book.updated_at);

    assert!(books.delete(&book.id).unwrap());
    assert!(books.get(&book.id).unwrap().is_none());
}

#[test]
fn missing_ids_report_false() {
    let db = test_db();
    let books = BookRepository::new(db.clone());
    let reviews = ReviewRepository::new(db);

    assert!(!books.delete("no-such-id").unwrap());
    assert!(!reviews.delete("no-such-id").unwrap());
    assert!(!books.update(&Book::new("UPC404", "Ghost", "Nobody")).unwrap());
}

#[test]
fn lookup_cardinality_follows_field() {
    let db = test_db();
    let books = BookRepository::new(db);

    books
        .create(&Book::new("UPC1", "A", "Author").with_category("Poetry"))
        .unwrap();
    books
        .create(&Book::new("UPC2", "B", "Author").with_category("Poetry"))
        .unwrap();

    match books.get_by_field("upc", "UPC2").unwrap() {
        Lookup::One(Some(book)) => assert_eq!(book.title, "B"),
        other => panic!("expected one book, got {:?}", other),
    }
    assert_eq!(books.get_by_field("upc", "UPC9").unwrap(), Lookup::One(None));

    let poetry = books.get_by_field("category", "Poetry").unwrap().into_vec();
    let titles: Vec<_> = poetry.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["A", "B"]);

    assert!(books.get_by_field("author", "Someone Else").unwrap().is_empty());
}

#[test]
fn disallowed_fields_rejected_for_every_entity() {
    let db = test_db();

    let err = BookRepository::new(db.clone())
        .get_by_field("description", "x")
        .unwrap_err();
    assert!(matches!(err, AppError::DisallowedField { entity: "book", .. }));

    let err = UserRepository::new(db.clone())
        .get_by_field("password_hash", "x")
        .unwrap_err();
    assert!(matches!(err, AppError::DisallowedField { entity: "user", .. }));

    let err = ReviewRepository::new(db)
        .get_by_field("id; DROP TABLE reviews", "x")
        .unwrap_err();
    assert!(matches!(err, AppError::DisallowedField { entity: "review", .. }));
}

#[test]
fn categories_are_distinct_and_sorted() {
    let db = test_db();
    let books = BookRepository::new(db);

    books.create(&Book::new("U1", "A", "X").with_category("Travel")).unwrap();
    books.create(&Book::new("U2", "B", "X").with_category("Art")).unwrap();
    books.create(&Book::new("U3", "C", "X").with_category("Travel")).unwrap();
    books.create(&Book::new("U4", "D", "X")).unwrap();

    assert_eq!(books.list_distinct_categories().unwrap(), ["Art", "Travel"]);
}

#[test]
fn reviews_join_author_and_book() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let books = BookRepository::new(db.clone());
    let reviews = ReviewRepository::new(db);

    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let bob = auth.register(&form("bob", "bob@x.com", "Secret2!")).unwrap();
    let book = Book::new("UPC7", "Emma", "Jane Austen");
    books.create(&book).unwrap();

    assert_eq!(reviews.average_rating(&book.id).unwrap(), None);

    reviews
        .create(&Review::new(&alice.id, &book.id, 5, "Loved it").unwrap())
        .unwrap();
    reviews
        .create(&Review::new(&bob.id, &book.id, 2, "Slow").unwrap())
        .unwrap();

    let details = reviews.list_for_book_with_details(&book.id).unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].user.username, "alice");
    assert_eq!(details[0].book.title, "Emma");
    assert_eq!(details[1].review.comment, "Slow");

    assert_eq!(reviews.average_rating(&book.id).unwrap(), Some(3.5));

    let by_book = reviews.get_by_field("book_id", &book.id).unwrap();
    assert_eq!(by_book.into_vec().len(), 2);
}

#[test]
fn review_rating_bounds_enforced() {
    assert!(matches!(
        Review::new("u", "b", 0, "meh"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        Review::new("u", "b", 6, "wow"),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn review_for_missing_book_is_rejected() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let reviews = ReviewRepository::new(db);

    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let review = Review::new(&alice.id, "missing-book", 4, "?").unwrap();
    assert!(reviews.create(&review).is_err());
    assert_eq!(reviews.count().unwrap(), 0);
}

#[test]
fn deleting_book_removes_its_reviews() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let books = BookRepository::new(db.clone());
    let reviews = ReviewRepository::new(db);

    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let book = Book::new("UPC8", "Persuasion", "Jane Austen");
    books.create(&book).unwrap();
    reviews
        .create(&Review::new(&alice.id, &book.id, 4, "Good").unwrap())
        .unwrap();

    assert!(books.delete(&book.id).unwrap());
    assert_eq!(reviews.count().unwrap(), 0);
}

// Scenario: register, then log in by username and by email.
#[test]
fn register_then_login_by_username_or_email() {
    let db = test_db();
    let (auth, _) = test_auth(&db);

    let user = auth
        .register(&form("alice", "alice@x.com", "Secret1!"))
        .unwrap();
    assert_eq!(user.role, Role::User);

    let stored = auth.users().find_by_username("alice").unwrap().unwrap();
    assert_ne!(stored.password_hash, "Secret1!");

    let mut session = SessionContext::anonymous();
    let identity = auth.login(&mut session, "alice", "Secret1!").unwrap();
    assert_eq!(identity.username, "alice");
    assert_eq!(identity.role, Role::User);
    assert!(session.is_authenticated());
    assert!(session.is_permanent());

    auth.logout(&mut session);
    assert_eq!(session, SessionContext::anonymous());

    let identity = auth.login(&mut session, "alice@x.com", "Secret1!").unwrap();
    assert_eq!(identity.id, user.id);
}

#[test]
fn login_failures_share_one_message() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let mut session = SessionContext::anonymous();
    let wrong_password = auth.login(&mut session, "alice", "nope").unwrap_err();
    let unknown_user = auth.login(&mut session, "mallory", "nope").unwrap_err();

    assert!(matches!(wrong_password, AppError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert!(!session.is_authenticated());
}

#[test]
fn login_prefers_email_match() {
    let db = test_db();
    let (auth, _) = test_auth(&db);

    let dave = auth.register(&form("dave", "dave@x.com", "Secret1!")).unwrap();
    // A username that looks like another account's email.
    let lookalike = User::new("dave@x.com", "other@x.com", hash_password("Other1!").unwrap(), Role::User);
    auth.users().create(&lookalike).unwrap();

    let mut session = SessionContext::anonymous();
    let identity = auth.login(&mut session, "dave@x.com", "Secret1!").unwrap();
    assert_eq!(identity.id, dave.id);

    assert!(matches!(
        auth.login(&mut session, "dave@x.com", "Other1!"),
        Err(AppError::InvalidCredentials)
    ));
}

#[test]
fn session_expires_after_lifetime() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let now = Utc::now();
    let mut session = SessionContext::anonymous();
    auth.login_at(&mut session, "alice", "Secret1!", now).unwrap();

    assert_eq!(session.expires_at(), Some(now + Duration::days(3)));
    assert!(session.current_identity_at(now + Duration::days(2)).is_some());
    assert!(session.current_identity_at(now + Duration::days(3)).is_none());
}

#[test]
fn duplicate_registration_rejected() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    assert!(matches!(
        auth.register(&form("alice", "new@x.com", "Secret1!")),
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        auth.register(&form("alice2", "alice@x.com", "Secret1!")),
        Err(AppError::Conflict(_))
    ));

    let mut mismatch = form("carol", "carol@x.com", "Secret1!");
    mismatch.confirm_password = "Secret2!".to_string();
    assert!(matches!(auth.register(&mismatch), Err(AppError::Validation(_))));

    assert!(matches!(
        auth.register(&form("", "x@x.com", "Secret1!")),
        Err(AppError::Validation(_))
    ));
    assert_eq!(auth.users().count().unwrap(), 1);
}

#[test]
fn registration_can_be_disabled() {
    let db = test_db();
    let config = AuthConfig {
        registration: "disabled".to_string(),
        ..AuthConfig::default()
    };
    let (auth, _) = auth_with(&db, &config);

    assert!(matches!(
        auth.register(&form("alice", "alice@x.com", "Secret1!")),
        Err(AppError::Forbidden(_))
    ));

    let admin = auth
        .create_user(&form("root", "root@x.com", "Secret1!"), Role::Admin)
        .unwrap();
    assert!(admin.is_admin());
}

// Scenario: a second book with an existing UPC is rejected.
#[test]
fn duplicate_upc_rejected() {
    let db = test_db();
    let books = BookRepository::new(db);

    books.create(&Book::new("UPC001", "First", "A")).unwrap();

    assert!(books.upc_exists("UPC001").unwrap());

    let err = books.create(&Book::new("UPC001", "Second", "B")).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(books.count().unwrap(), 1);
    let only = books.get_by_field("upc", "UPC001").unwrap().into_vec();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0].title, "First");
}

// Scenario: a reset request for an unknown email sends nothing.
#[test]
fn reset_request_for_unknown_email_is_silent() {
    let db = test_db();
    let (auth, mailer) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let message = auth.request_password_reset("unknown@x.com");
    assert_eq!(message, RESET_REQUEST_MESSAGE);
    assert!(mailer.sent().is_empty());

    let message = auth.request_password_reset("alice@x.com");
    assert_eq!(message, RESET_REQUEST_MESSAGE);
    assert_eq!(mailer.sent().len(), 1);
}

#[test]
fn reset_link_sets_new_password() {
    let db = test_db();
    let (auth, mailer) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    auth.request_password_reset("alice@x.com");
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "alice@x.com");
    assert_eq!(sent[0].sender, "no-reply@books.test");
    assert!(sent[0].text_body.contains("http://books.test/reset_password/"));
    assert!(sent[0].html_body.contains("http://books.test/reset_password/"));

    let token = reset_token(&sent[0]);

    assert!(matches!(
        auth.consume_password_reset(&token, "NewSecret1!", "Different1!"),
        Err(AppError::Validation(_))
    ));

    auth.consume_password_reset(&token, "NewSecret1!", "NewSecret1!")
        .unwrap();

    let mut session = SessionContext::anonymous();
    assert!(matches!(
        auth.login(&mut session, "alice", "Secret1!"),
        Err(AppError::InvalidCredentials)
    ));
    auth.login(&mut session, "alice", "NewSecret1!").unwrap();
}

// Scenario: page 1 and page 3 of 45 books at 20 per page.
#[test]
fn paginated_listing_of_45_books() {
    let db = test_db();
    let books = BookRepository::new(db);

    for i in 0..45 {
        books
            .create(&Book::new(format!("UPC{:03}", i), format!("Book {:02}", i), "Author"))
            .unwrap();
    }

    let first = books.list_paginated(1, 20).unwrap();
    assert_eq!(first.items.len(), 20);
    assert_eq!(first.items[0].title, "Book 00");
    assert_eq!(first.pagination.total_items, 45);
    assert_eq!(first.pagination.total_pages(), 3);
    assert!(first.pagination.has_next());
    assert!(!first.pagination.has_prev());

    let last = books.list_paginated(3, 20).unwrap();
    assert_eq!(last.items.len(), 5);
    assert_eq!(last.items[0].title, "Book 40");
    assert!(!last.pagination.has_next());
    assert!(last.pagination.has_prev());

    let beyond = books.list_paginated(4, 20).unwrap();
    assert!(beyond.items.is_empty());

    assert!(matches!(
        books.list_paginated(0, 20),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        books.list_paginated(1, 0),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn empty_listing_has_no_pages() {
    let db = test_db();
    let page = UserRepository::new(db).list_paginated(1, 20).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.total_pages(), 0);
    assert!(!page.pagination.has_next());
}

// Scenario: an expired reset token leaves the password unchanged.
#[test]
fn expired_reset_token_rejected() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let issued = Utc::now() - Duration::minutes(11);
    let token = auth.reset_signer().issue_at("alice@x.com", issued).unwrap();

    let err = auth
        .consume_password_reset(&token, "NewSecret1!", "NewSecret1!")
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidResetToken));

    let mut session = SessionContext::anonymous();
    auth.login(&mut session, "alice", "Secret1!").unwrap();
}

#[test]
fn reset_token_for_deleted_account_rejected() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let token = auth.reset_signer().issue("alice@x.com").unwrap();
    assert!(auth.users().delete(&alice.id).unwrap());

    assert!(matches!(
        auth.consume_password_reset(&token, "NewSecret1!", "NewSecret1!"),
        Err(AppError::InvalidResetToken)
    ));
}

#[test]
fn account_updates_respect_roles() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let admin = auth
        .create_user(&form("root", "root@x.com", "Secret1!"), Role::Admin)
        .unwrap();
    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let bob = auth.register(&form("bob", "bob@x.com", "Secret1!")).unwrap();

    let mut session = SessionContext::anonymous();
    auth.login(&mut session, "alice", "Secret1!").unwrap();

    // Self edit is allowed.
    let renamed = auth
        .update_account(
            &session,
            &alice.id,
            &AccountUpdate {
                username: Some("alicia".to_string()),
                ..AccountUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.username, "alicia");
    assert!(renamed.updated_at >= alice.updated_at);

    // Taking another account's email is a conflict.
    assert!(matches!(
        auth.update_account(
            &session,
            &alice.id,
            &AccountUpdate {
                email: Some("bob@x.com".to_string()),
                ..AccountUpdate::default()
            },
        ),
        Err(AppError::Conflict(_))
    ));

    // Editing someone else or promoting oneself needs admin.
    assert!(matches!(
        auth.update_account(&session, &bob.id, &AccountUpdate::default()),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        auth.update_account(
            &session,
            &alice.id,
            &AccountUpdate {
                role: Some(Role::Admin),
                ..AccountUpdate::default()
            },
        ),
        Err(AppError::Forbidden(_))
    ));

    let mut admin_session = SessionContext::anonymous();
    auth.login(&mut admin_session, "root", "Secret1!").unwrap();
    let promoted = auth
        .update_account(
            &admin_session,
            &bob.id,
            &AccountUpdate {
                role: Some(Role::Admin),
                ..AccountUpdate::default()
            },
        )
        .unwrap();
    assert!(promoted.is_admin());
    assert_eq!(admin.role, Role::Admin);

    assert!(matches!(
        auth.list_users(&session, 1, 20),
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(auth.list_users(&admin_session, 1, 20).unwrap().items.len(), 3);
}

#[test]
fn account_deletion_rules() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.create_user(&form("root", "root@x.com", "Secret1!"), Role::Admin)
        .unwrap();
    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let bob = auth.register(&form("bob", "bob@x.com", "Secret1!")).unwrap();

    let mut anonymous = SessionContext::anonymous();
    assert!(matches!(
        auth.delete_account(&mut anonymous, &bob.id),
        Err(AppError::Forbidden(_))
    ));

    let mut alice_session = SessionContext::anonymous();
    auth.login(&mut alice_session, "alice", "Secret1!").unwrap();
    assert!(matches!(
        auth.delete_account(&mut alice_session, &bob.id),
        Err(AppError::Forbidden(_))
    ));

    let mut admin_session = SessionContext::anonymous();
    auth.login(&mut admin_session, "root", "Secret1!").unwrap();
    assert!(auth.delete_account(&mut admin_session, &bob.id).unwrap());
    assert!(!auth.delete_account(&mut admin_session, &bob.id).unwrap());
    assert!(admin_session.is_authenticated());

    assert!(auth.delete_account(&mut alice_session, &alice.id).unwrap());
    assert!(!alice_session.is_authenticated());
    assert!(auth.users().get(&alice.id).unwrap().is_none());
}

#[test]
fn file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("reviews.db");

    let book = Book::new("UPC500", "Middlemarch", "George Eliot");
    {
        let db = Database::open(&path).unwrap();
        BookRepository::new(db).create(&book).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let stored = BookRepository::new(db).get(&book.id).unwrap().unwrap();
    assert_eq!(stored, book);
}

#[test]
fn expired_session_cannot_delete_or_edit() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.create_user(&form("root", "root@x.com", "Secret1!"), Role::Admin)
        .unwrap();
    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();
    let bob = auth.register(&form("bob", "bob@x.com", "Secret1!")).unwrap();

    let logged_in = Utc::now() - Duration::days(30);

    let mut alice_session = SessionContext::anonymous();
    auth.login_at(&mut alice_session, "alice", "Secret1!", logged_in)
        .unwrap();
    assert!(alice_session.current_identity().is_none());

    let mut admin_session = SessionContext::anonymous();
    auth.login_at(&mut admin_session, "root", "Secret1!", logged_in)
        .unwrap();

    assert!(matches!(
        auth.delete_account(&mut alice_session, &alice.id),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        auth.delete_account(&mut admin_session, &bob.id),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        auth.update_account(
            &alice_session,
            &alice.id,
            &AccountUpdate {
                username: Some("alicia".to_string()),
                ..AccountUpdate::default()
            },
        ),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        auth.list_users(&admin_session, 1, 20),
        Err(AppError::Forbidden(_))
    ));

    assert!(auth.users().get(&alice.id).unwrap().is_some());
    assert!(auth.users().get(&bob.id).unwrap().is_some());
    assert_eq!(
        auth.users().get(&alice.id).unwrap().unwrap().username,
        "alice"
    );
}

#[test]
fn session_valid_until_expiry_for_account_changes() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let alice = auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    let now = Utc::now();
    let mut session = SessionContext::anonymous();
    auth.login_at(&mut session, "alice", "Secret1!", now).unwrap();

    let rename = AccountUpdate {
        username: Some("alicia".to_string()),
        ..AccountUpdate::default()
    };
    assert!(matches!(
        auth.update_account_at(&session, &alice.id, &rename, now + Duration::days(3)),
        Err(AppError::Forbidden(_))
    ));
    let renamed = auth
        .update_account_at(&session, &alice.id, &rename, now + Duration::days(2))
        .unwrap();
    assert_eq!(renamed.username, "alicia");

    assert!(matches!(
        auth.delete_account_at(&mut session, &alice.id, now + Duration::days(3)),
        Err(AppError::Forbidden(_))
    ));
    assert!(
        auth.delete_account_at(&mut session, &alice.id, now + Duration::days(2))
            .unwrap()
    );
    assert!(!session.is_authenticated());
}

#[test]
fn unreadable_stored_hash_is_a_plain_login_failure() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    let broken = User::new("eve", "eve@x.com", "not-a-hash", Role::User);
    auth.users().create(&broken).unwrap();

    let mut session = SessionContext::anonymous();
    let err = auth.login(&mut session, "eve", "anything").unwrap_err();
    let unknown = auth.login(&mut session, "nobody", "anything").unwrap_err();

    assert!(matches!(err, AppError::InvalidCredentials));
    assert_eq!(err.to_string(), unknown.to_string());
    assert!(!session.is_authenticated());
}

#[test]
fn listing_failure_is_an_error_not_an_empty_page() {
    let db = test_db();
    let books = BookRepository::new(db.clone());
    books
        .create(&Book::new("UPC1", "A", "X").with_category("Art"))
        .unwrap();

    db.with_transaction(|tx| {
        tx.execute_batch("DROP TABLE reviews; DROP TABLE books;")?;
        Ok(())
    })
    .unwrap();

    assert!(matches!(
        books.list_paginated(1, 20),
        Err(AppError::Database(_))
    ));
    assert!(matches!(
        books.list_distinct_categories(),
        Err(AppError::Database(_))
    ));
}

#[test]
fn operator_password_change_rejects_empty() {
    let db = test_db();
    let (auth, _) = test_auth(&db);
    auth.register(&form("alice", "alice@x.com", "Secret1!")).unwrap();

    assert!(matches!(
        auth.set_password("alice", ""),
        Err(AppError::Validation(_))
    ));
    assert!(!auth.set_password("nobody", "Secret2!").unwrap());
    assert!(auth.set_password("alice", "Secret2!").unwrap());

    let mut session = SessionContext::anonymous();
    assert!(matches!(
        auth.login(&mut session, "alice", "Secret1!"),
        Err(AppError::InvalidCredentials)
    ));
    auth.login(&mut session, "alice", "Secret2!").unwrap();
}
