/// End-to-end: the Red Wallet scenario against a real server on an
/// ephemeral port, one cookie-keeping client per student.
use lostfound::config::Config;
use lostfound::db;
use lostfound::routes;
use lostfound::state::AppState;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

async fn spawn_server() -> Result<(String, TempDir), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    config.server.port = addr.port();

    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    let app = routes::app(AppState::new(pool, config)?);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{}", addr), temp_dir))
}

async fn student(base: &str, email: &str, name: &str) -> Result<Client, Box<dyn std::error::Error>> {
    let client = Client::builder().cookie_store(true).build()?;
    let response = client
        .post(format!("{}/auth/register", base))
        .json(&json!({ "email": email, "password": "hunter22", "name": name }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(client)
}

#[tokio::test]
async fn red_wallet_goes_home() -> Result<(), Box<dyn std::error::Error>> {
    let (base, _temp_dir) = spawn_server().await?;
    let bob = student(&base, "bob@klu.ac.in", "Bob").await?;
    let alice = student(&base, "alice@klu.ac.in", "Alice").await?;

    // Bob found a wallet
    let item: Value = bob
        .post(format!("{}/api/items", base))
        .json(&json!({
            "title": "Red Wallet",
            "description": "Found on a bench outside the library",
            "category": "Wallet/Purse",
            "itemType": "found",
            "secretQuestion": "How much cash is inside?",
            "secretAnswer": "5 dollars"
        }))
        .send()
        .await?
        .json()
        .await?;
    let item_id = item["id"].as_str().unwrap().to_string();

    // Alice lost one and links her report to Bob's
    let lost: Value = alice
        .post(format!("{}/api/items", base))
        .json(&json!({
            "title": "My wallet",
            "description": "Red, lost near the library",
            "category": "Wallet/Purse",
            "itemType": "lost"
        }))
        .send()
        .await?
        .json()
        .await?;
    let response = alice
        .put(format!("{}/api/items/{}/match", base, lost["id"].as_str().unwrap()))
        .json(&json!({ "foundItemId": item_id }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let banner: Value = alice
        .get(format!("{}/api/items/match", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(banner["match"]["id"], item_id.as_str());

    // Alice claims and answers
    let claim: Value = alice
        .post(format!("{}/api/items/{}/claims", base, item_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(claim["status"], "pending");
    let claim_id = claim["id"].as_str().unwrap().to_string();

    let detail: Value = alice
        .get(format!("{}/api/claims/{}", base, claim_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["viewerRole"], "claimer");
    assert_eq!(detail["secretQuestion"], "How much cash is inside?");
    assert!(detail.get("secretAnswer").is_none());

    let response = alice
        .post(format!("{}/api/claims/{}/answer", base, claim_id))
        .json(&json!({ "answer": "5 Dollars" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Bob sees the hint and approves
    let detail: Value = bob
        .get(format!("{}/api/claims/{}", base, claim_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["viewerRole"], "finder");
    assert_eq!(detail["answerAttempt"], "5 Dollars");
    assert_eq!(detail["answerMatches"], true);

    let response = bob
        .post(format!("{}/api/claims/{}/resolve", base, claim_id))
        .json(&json!({ "decision": "approved" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let item: Value = alice
        .get(format!("{}/api/items/{}", base, item_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(item["status"], "returned");

    // Both parties list the claim; a second decision is refused
    for client in [&alice, &bob] {
        let claims: Value = client
            .get(format!("{}/api/my-claims", base))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(claims.as_array().unwrap().len(), 1);
        assert_eq!(claims[0]["status"], "approved");
    }
    let response = bob
        .post(format!("{}/api/claims/{}/resolve", base, claim_id))
        .json(&json!({ "decision": "rejected" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn global_chat_stream_delivers_snapshots() -> Result<(), Box<dyn std::error::Error>> {
    let (base, _temp_dir) = spawn_server().await?;
    let client = student(&base, "student@klu.ac.in", "Student").await?;

    let response = client
        .post(format!("{}/api/chat/global/messages", base))
        .json(&json!({ "text": "Found a water bottle in LH-3" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut stream = client
        .get(format!("{}/api/chat/global/stream", base))
        .send()
        .await?;
    assert_eq!(stream.status(), StatusCode::OK);
    assert!(stream.headers()["content-type"]
        .to_str()?
        .starts_with("text/event-stream"));

    // The first delivery is the current history
    let mut received = String::new();
    while !received.contains("\n\n") {
        let Some(chunk) = stream.chunk().await? else {
            break;
        };
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: snapshot"));
    assert!(received.contains("Found a water bottle in LH-3"));

    Ok(())
}
