use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::Response,
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait};
use stacks_app::library::{
    models::{book, Action, Book, Transaction},
    service::{self, NewBook},
};
use stacks_app::Application;
use stacks_http::flash::{IncomingFlash, Level};
use stacks_kernel::settings::{DatabaseSettings, Settings};
use tower::util::ServiceExt; // for `oneshot`

// Helper to create an application backed by an in-memory database
async fn setup_test_app() -> Application {
    let db = stacks_db::connect(&DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..DatabaseSettings::default()
    })
    .await
    .expect("Failed to open DB");

    Application::with_connection(Settings::default(), db)
        .await
        .expect("Failed to build application")
}

// Helper to create an application backed by a scratch database file, so the
// pool holds several connections that contend for SQLite's write lock
async fn setup_file_app() -> (Application, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("stacks-http-{}.db", uuid::Uuid::new_v4()));
    let db = stacks_db::connect(&DatabaseSettings {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 5,
        ..DatabaseSettings::default()
    })
    .await
    .expect("Failed to open DB");

    let app = Application::with_connection(Settings::default(), db)
        .await
        .expect("Failed to build application");
    (app, path)
}

// Helper to create a test book
async fn create_test_book(db: &DatabaseConnection, title: &str, in_stock: bool) -> book::Model {
    service::create_book(
        db,
        NewBook {
            title: title.to_string(),
            author: "Nate".to_string(),
            genre: "Computers".to_string(),
            description: "It's a good book. You should read it".to_string(),
            published: Utc::now(),
            in_stock,
        },
    )
    .await
    .expect("Failed to create book")
}

async fn send(app: &Application, request: Request<Body>) -> Response {
    app.router().oneshot(request).await.unwrap()
}

async fn post(app: &Application, uri: &str) -> Response {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn get(app: &Application, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `flash` cookie a browser would send back after this response
fn flash_cookie(response: &Response) -> HeaderValue {
    let set_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("flash="))
        .expect("response should set the flash cookie");
    let pair = set_cookie.split(';').next().unwrap();
    HeaderValue::from_str(pair).unwrap()
}

fn flashed(response: &Response) -> Vec<(Level, String)> {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, flash_cookie(response));
    IncomingFlash::from_headers(&headers)
        .notifications()
        .iter()
        .map(|n| (n.level, n.text.clone()))
        .collect()
}

async fn reload(db: &DatabaseConnection, id: i32) -> book::Model {
    Book::find_by_id(id).one(db).await.unwrap().unwrap()
}

async fn actions_for(db: &DatabaseConnection, id: i32) -> Vec<Action> {
    Transaction::find()
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.book_id == id)
        .map(|t| t.action)
        .collect()
}

fn assert_redirects_home(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_home_page_shows_all_books() {
    let app = setup_test_app().await;
    let mut books = Vec::new();
    for i in 0..3 {
        books.push(create_test_book(app.db(), &format!("Super Good Book #{i}"), true).await);
    }

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    for book in books {
        assert!(body.contains(&book.title), "missing {}", book.title);
    }
}

#[tokio::test]
async fn test_home_page_with_empty_catalog() {
    let app = setup_test_app().await;

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("No books in the catalog."));
}

#[tokio::test]
async fn test_borrowing_a_book_makes_it_unavailable() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    post(&app, &format!("/books/{}/borrow", book.id)).await;

    assert!(
        !reload(app.db(), book.id).await.in_stock,
        "Borrowing a book should mark the book as out of stock in the DB"
    );
}

#[tokio::test]
async fn test_borrowing_a_book_flashes_a_success_message() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    let response = post(&app, &format!("/books/{}/borrow", book.id)).await;

    assert_eq!(
        flashed(&response),
        vec![(Level::Success, "Borrowed Super Good Book by Nate".to_string())]
    );
}

#[tokio::test]
async fn test_borrowing_a_book_that_is_unavailable_flashes_an_error_message() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", false).await;

    let response = post(&app, &format!("/books/{}/borrow", book.id)).await;

    assert_eq!(
        flashed(&response),
        vec![(Level::Error, "Super Good Book by Nate is unavailable".to_string())]
    );
    assert!(!reload(app.db(), book.id).await.in_stock);
    assert!(actions_for(app.db(), book.id).await.is_empty());
}

#[tokio::test]
async fn test_borrow_redirects_to_home() {
    let app = setup_test_app().await;
    let available = create_test_book(app.db(), "Super Good Book", true).await;
    let borrowed = create_test_book(app.db(), "Another Good Book", false).await;

    assert_redirects_home(&post(&app, &format!("/books/{}/borrow", available.id)).await);
    assert_redirects_home(&post(&app, &format!("/books/{}/borrow", borrowed.id)).await);
}

#[tokio::test]
async fn test_borrowing_a_book_creates_a_transaction() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    post(&app, &format!("/books/{}/borrow", book.id)).await;

    assert_eq!(actions_for(app.db(), book.id).await, vec![Action::Checkout]);
}

#[tokio::test]
async fn test_returning_a_book_makes_it_available() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", false).await;

    post(&app, &format!("/books/{}/return", book.id)).await;

    assert!(
        reload(app.db(), book.id).await.in_stock,
        "Returning a book should mark the book as in stock in the DB"
    );
}

#[tokio::test]
async fn test_returning_a_book_flashes_a_success_message() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", false).await;

    let response = post(&app, &format!("/books/{}/return", book.id)).await;

    assert_eq!(
        flashed(&response),
        vec![(Level::Success, "Returned Super Good Book by Nate".to_string())]
    );
}

#[tokio::test]
async fn test_returning_a_book_that_is_available_flashes_an_error_message() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    let response = post(&app, &format!("/books/{}/return", book.id)).await;

    assert_eq!(
        flashed(&response),
        vec![(Level::Error, "Super Good Book by Nate is already here".to_string())]
    );
    assert!(reload(app.db(), book.id).await.in_stock);
    assert!(actions_for(app.db(), book.id).await.is_empty());
}

#[tokio::test]
async fn test_return_redirects_to_home() {
    let app = setup_test_app().await;
    let available = create_test_book(app.db(), "Super Good Book", true).await;
    let borrowed = create_test_book(app.db(), "Another Good Book", false).await;

    assert_redirects_home(&post(&app, &format!("/books/{}/return", available.id)).await);
    assert_redirects_home(&post(&app, &format!("/books/{}/return", borrowed.id)).await);
}

#[tokio::test]
async fn test_returning_a_book_creates_a_transaction() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", false).await;

    post(&app, &format!("/books/{}/return", book.id)).await;

    assert_eq!(actions_for(app.db(), book.id).await, vec![Action::Checkin]);
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let app = setup_test_app().await;

    for uri in ["/books/999/borrow", "/books/999/return"] {
        let response = post(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }

    assert!(Transaction::find().all(app.db()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_book_ids_are_not_found() {
    let app = setup_test_app().await;

    for uri in [
        "/books/abc/borrow",
        "/books/3000000000/return",
        "/books/1.5/borrow",
    ] {
        let response = post(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }

    let response = get(&app, "/books/abc/transactions").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_borrows_all_redirect_home() {
    let (app, path) = setup_file_app().await;
    let mut books = Vec::new();
    for i in 0..10 {
        books.push(create_test_book(app.db(), &format!("Super Good Book #{i}"), true).await);
    }

    let router = app.router();
    let requests: Vec<_> = books
        .iter()
        .flat_map(|book| std::iter::repeat(book.id).take(5))
        .map(|id| {
            let router = router.clone();
            tokio::spawn(async move {
                let request = Request::builder()
                    .method("POST")
                    .uri(format!("/books/{id}/borrow"))
                    .body(Body::empty())
                    .unwrap();
                router.oneshot(request).await.unwrap()
            })
        })
        .collect();

    for request in requests {
        let response = request.await.unwrap();
        assert_redirects_home(&response);
    }

    for book in &books {
        assert!(!reload(app.db(), book.id).await.in_stock);
        assert_eq!(actions_for(app.db(), book.id).await, vec![Action::Checkout]);
    }

    app.db().clone().close().await.unwrap();
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_flash_is_shown_once_on_the_next_page() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    let response = post(&app, &format!("/books/{}/borrow", book.id)).await;
    let cookie = flash_cookie(&response);

    let page = send(
        &app,
        Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let clear = page
        .headers()
        .get(header::SET_COOKIE)
        .expect("listing should clear the flash cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(clear.starts_with("flash=;"));
    assert!(clear.contains("Max-Age=0"));

    let body = body_string(page).await;
    assert!(body.contains("<li class=\"success\">Borrowed Super Good Book by Nate</li>"));
}

#[tokio::test]
async fn test_unread_notifications_accumulate() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    let first = post(&app, &format!("/books/{}/borrow", book.id)).await;
    let second = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/books/{}/borrow", book.id))
            .header(header::COOKIE, flash_cookie(&first))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(
        flashed(&second),
        vec![
            (Level::Success, "Borrowed Super Good Book by Nate".to_string()),
            (Level::Error, "Super Good Book by Nate is unavailable".to_string()),
        ]
    );
    assert_eq!(actions_for(app.db(), book.id).await, vec![Action::Checkout]);
}

#[tokio::test]
async fn test_book_json_listing_and_history() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;
    post(&app, &format!("/books/{}/borrow", book.id)).await;
    post(&app, &format!("/books/{}/return", book.id)).await;

    let response = get(&app, "/books").await;
    assert_eq!(response.status(), StatusCode::OK);
    let books: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(books[0]["title"], "Super Good Book");
    assert_eq!(books[0]["in_stock"], true);

    let response = get(&app, &format!("/books/{}/transactions", book.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let history: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["CHECKOUT", "CHECKIN"]);

    let response = get(&app, "/books/999/transactions").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_super_good_book_scenario() {
    let app = setup_test_app().await;
    let book = create_test_book(app.db(), "Super Good Book", true).await;

    let response = post(&app, &format!("/books/{}/borrow", book.id)).await;

    assert_redirects_home(&response);
    assert_eq!(
        flashed(&response),
        vec![(Level::Success, "Borrowed Super Good Book by Nate".to_string())]
    );
    assert!(!reload(app.db(), book.id).await.in_stock);
    assert_eq!(actions_for(app.db(), book.id).await, vec![Action::Checkout]);
}

#[tokio::test]
async fn test_health_routes() {
    let app = setup_test_app().await;

    let response = get(&app, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");

    let response = get(&app, "/health").await;
    assert_eq!(body_string(response).await, "library module is healthy");
}

#[tokio::test]
async fn test_openapi_lists_library_routes() {
    let app = setup_test_app().await;

    let response = get(&app, "/docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let spec: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(spec["paths"]["/books/{id}/borrow"]["post"].is_object());
    assert!(spec["components"]["schemas"]["Transaction"].is_object());
}

