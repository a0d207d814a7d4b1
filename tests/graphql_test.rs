use std::sync::Arc;

use lostfound::auth::profile::load_session_user;
use lostfound::auth::SessionUser;
use lostfound::chat::SqliteChatChannel;
use lostfound::claims::SqliteClaimWorkflow;
use lostfound::db::{self, models::Role};
use lostfound::graphql::{build_schema, LostFoundSchema};
use lostfound::items::SqliteItemRepository;
use lostfound::state::DbPool;
use lostfound::store::ChangeFeed;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;

struct Harness {
    schema: LostFoundSchema,
    pool: DbPool,
    _temp_dir: TempDir,
}

fn setup() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("graphql.db"))
        .expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let feed = ChangeFeed::default();
    let schema = build_schema(
        Arc::new(SqliteItemRepository::new(pool.clone(), feed.clone())),
        Arc::new(SqliteClaimWorkflow::new(pool.clone(), feed.clone())),
        Arc::new(SqliteChatChannel::new(pool.clone(), feed, 50)),
    );

    Harness {
        schema,
        pool,
        _temp_dir: temp_dir,
    }
}

fn add_user(pool: &DbPool, email: &str, name: &str, role: Role) -> SessionUser {
    let id = uuid::Uuid::now_v7().to_string();
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO users (id, email, password_hash, name, role) VALUES (?1, ?2, 'x', ?3, ?4)",
        params![id, email, name, role],
    )
    .unwrap();
    load_session_user(&conn, &id).unwrap()
}

async fn run(harness: &Harness, user: &SessionUser, query: &str) -> async_graphql::Response {
    let request = async_graphql::Request::new(query).data(user.clone());
    harness.schema.execute(request).await
}

async fn run_ok(harness: &Harness, user: &SessionUser, query: &str) -> Value {
    let response = run(harness, user, query).await;
    assert!(
        response.errors.is_empty(),
        "Expected no errors, got: {:?}",
        response.errors
    );
    response.data.into_json().unwrap()
}

fn error_code(response: &async_graphql::Response) -> Option<String> {
    let extensions = response.errors.first()?.extensions.as_ref()?;
    match extensions.get("code")? {
        async_graphql::Value::String(code) => Some(code.clone()),
        _ => None,
    }
}

const REPORT_WALLET: &str = r#"mutation {
    createItem(input: {
        title: "Red Wallet",
        description: "Found near the library steps",
        category: WALLET_PURSE,
        itemType: FOUND,
        secretQuestion: "How much cash is inside?",
        secretAnswer: "5 dollars"
    }) { id status reporterName secretAnswer }
}"#;

#[tokio::test]
async fn me_reflects_stored_profile() {
    let harness = setup();
    let admin = add_user(&harness.pool, "admin@klu.ac.in", "Admin", Role::Admin);

    let data = run_ok(&harness, &admin, "{ me { email displayName role isAdmin } }").await;
    assert_eq!(data["me"]["email"], "admin@klu.ac.in");
    assert_eq!(data["me"]["role"], "ADMIN");
    assert_eq!(data["me"]["isAdmin"], true);
}

#[tokio::test]
async fn missing_session_is_unauthorized() {
    let harness = setup();
    let response = harness.schema.execute("{ me { id } }").await;
    assert_eq!(error_code(&response).as_deref(), Some("unauthorized"));
}

#[tokio::test]
async fn claim_flow_through_graphql() {
    let harness = setup();
    let finder = add_user(&harness.pool, "finder@klu.ac.in", "Finder", Role::User);
    let owner = add_user(&harness.pool, "owner@klu.ac.in", "Owner", Role::User);

    let data = run_ok(&harness, &finder, REPORT_WALLET).await;
    let item = &data["createItem"];
    assert_eq!(item["status"], "ACTIVE");
    assert_eq!(item["reporterName"], "Finder");
    assert_eq!(item["secretAnswer"], "5 dollars");
    let item_id = item["id"].as_str().unwrap().to_string();

    // Other users never see the stored answer
    let data = run_ok(
        &harness,
        &owner,
        &format!(r#"{{ item(id: "{}") {{ secretQuestion secretAnswer }} }}"#, item_id),
    )
    .await;
    assert_eq!(data["item"]["secretQuestion"], "How much cash is inside?");
    assert_eq!(data["item"]["secretAnswer"], Value::Null);

    let data = run_ok(
        &harness,
        &owner,
        &format!(r#"mutation {{ createClaim(itemId: "{}") {{ id status itemTitle }} }}"#, item_id),
    )
    .await;
    assert_eq!(data["createClaim"]["status"], "PENDING");
    assert_eq!(data["createClaim"]["itemTitle"], "Red Wallet");
    let claim_id = data["createClaim"]["id"].as_str().unwrap().to_string();

    run_ok(
        &harness,
        &owner,
        &format!(
            r#"mutation {{ submitAnswer(claimId: "{}", answer: "5 Dollars") {{ status }} }}"#,
            claim_id
        ),
    )
    .await;

    let data = run_ok(
        &harness,
        &finder,
        &format!(
            r#"{{ claim(id: "{}") {{ viewerRole secretAnswer answerMatches claim {{ answerAttempt }} }} }}"#,
            claim_id
        ),
    )
    .await;
    assert_eq!(data["claim"]["viewerRole"], "FINDER");
    assert_eq!(data["claim"]["answerMatches"], true);
    assert_eq!(data["claim"]["claim"]["answerAttempt"], "5 Dollars");

    let data = run_ok(
        &harness,
        &finder,
        &format!(
            r#"mutation {{ resolveClaim(claimId: "{}", decision: APPROVED) {{ status }} }}"#,
            claim_id
        ),
    )
    .await;
    assert_eq!(data["resolveClaim"]["status"], "APPROVED");

    let data = run_ok(
        &harness,
        &owner,
        &format!(r#"{{ item(id: "{}") {{ status }} }}"#, item_id),
    )
    .await;
    assert_eq!(data["item"]["status"], "RETURNED");

    let data = run_ok(&harness, &owner, "{ myClaims { id status } }").await;
    assert_eq!(data["myClaims"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn errors_carry_their_kind() {
    let harness = setup();
    let finder = add_user(&harness.pool, "finder@klu.ac.in", "Finder", Role::User);
    let data = run_ok(&harness, &finder, REPORT_WALLET).await;
    let item_id = data["createItem"]["id"].as_str().unwrap().to_string();

    // Claiming your own report is not allowed
    let response = run(
        &harness,
        &finder,
        &format!(r#"mutation {{ createClaim(itemId: "{}") {{ id }} }}"#, item_id),
    )
    .await;
    assert_eq!(error_code(&response).as_deref(), Some("authorization"));

    let response = run(&harness, &finder, r#"{ item(id: "nope") { id } }"#).await;
    assert_eq!(error_code(&response).as_deref(), Some("not_found"));

    let response = run(
        &harness,
        &finder,
        r#"mutation { sendMessage(scope: "global", text: "hi", imageUrl: "http://x/y.png") { id } }"#,
    )
    .await;
    assert_eq!(error_code(&response).as_deref(), Some("validation"));
}

#[tokio::test]
async fn item_location_needs_both_coordinates() {
    let harness = setup();
    let finder = add_user(&harness.pool, "finder@klu.ac.in", "Finder", Role::User);
    let report = |coordinates: &str| {
        format!(
            r#"mutation {{
                createItem(input: {{
                    title: "Umbrella",
                    description: "Black, left at the canteen",
                    category: OTHER,
                    itemType: LOST,
                    {}
                }}) {{ id location {{ lat lng }} }}
            }}"#,
            coordinates
        )
    };

    let response = run(&harness, &finder, &report("latitude: 9.57")).await;
    assert_eq!(error_code(&response).as_deref(), Some("validation"));
    let response = run(&harness, &finder, &report("longitude: 77.68")).await;
    assert_eq!(error_code(&response).as_deref(), Some("validation"));

    let count: i64 = harness
        .pool
        .get()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);

    let data = run_ok(&harness, &finder, &report("latitude: 9.57, longitude: 77.68")).await;
    assert_eq!(data["createItem"]["location"]["lat"], 9.57);
    assert_eq!(data["createItem"]["location"]["lng"], 77.68);

    let data = run_ok(&harness, &finder, &report("")).await;
    assert!(data["createItem"]["location"].is_null());
}

#[tokio::test]
async fn global_chat_round_trip() {
    let harness = setup();
    let user = add_user(&harness.pool, "student@klu.ac.in", "", Role::User);

    let data = run_ok(
        &harness,
        &user,
        r#"mutation { sendMessage(scope: "global", text: "Anyone lose a blue bottle?") { userName text imageUrl } }"#,
    )
    .await;
    // Empty profile name falls back to the e-mail local part
    assert_eq!(data["sendMessage"]["userName"], "student");
    assert_eq!(data["sendMessage"]["imageUrl"], Value::Null);

    let data = run_ok(&harness, &user, r#"{ messages(scope: "global") { text } }"#).await;
    assert_eq!(data["messages"][0]["text"], "Anyone lose a blue bottle?");
}

#[tokio::test]
async fn admin_items_requires_admin_role() {
    let harness = setup();
    let user = add_user(&harness.pool, "student@klu.ac.in", "Student", Role::User);
    let admin = add_user(&harness.pool, "admin@klu.ac.in", "Admin", Role::Admin);
    run_ok(&harness, &user, REPORT_WALLET).await;

    let response = run(&harness, &user, "{ adminItems { id } }").await;
    assert_eq!(error_code(&response).as_deref(), Some("authorization"));

    let data = run_ok(&harness, &admin, "{ adminItems { reporterName secretAnswer } }").await;
    assert_eq!(data["adminItems"][0]["reporterName"], "Student");
    assert_eq!(data["adminItems"][0]["secretAnswer"], Value::Null);
}
