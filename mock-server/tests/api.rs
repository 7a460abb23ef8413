use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Event, Media, Token, Trip};
use tower::{Service, ServiceExt};

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

async fn call(
    app: &mut axum::routing::RouterIntoService<String>,
    request: Request<String>,
) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(request).await.unwrap()
}

// --- auth ---

#[tokio::test]
async fn list_trips_without_token_returns_401() {
    let resp = app()
        .oneshot(empty_request("GET", "/trips", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_trips_with_unknown_token_returns_401() {
    let resp = app()
        .oneshot(empty_request("GET", "/trips", Some("nope")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login_with_form() {
    let mut app = app().into_service();

    let resp = call(
        &mut app,
        json_request("POST", "/register", None, r#"{"username":"a b","password":"p+w"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Token = body_json(resp).await;
    assert_eq!(token.token_type, "bearer");

    let resp = call(
        &mut app,
        form_request("/token", "grant_type=&username=a%20b&password=p%2Bw"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let login: Token = body_json(resp).await;
    assert_ne!(login.access_token, token.access_token);

    let resp = call(
        &mut app,
        form_request("/token", "grant_type=&username=a%20b&password=wrong"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_duplicate_returns_400() {
    let mut app = app().into_service();
    let body = r#"{"username":"ana","password":"pw"}"#;
    let resp = call(&mut app, json_request("POST", "/register", None, body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = call(&mut app, json_request("POST", "/register", None, body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full lifecycle ---

#[tokio::test]
async fn trip_event_media_lifecycle() {
    let mut app = app().into_service();

    let resp = call(
        &mut app,
        json_request("POST", "/register", None, r#"{"username":"ana","password":"pw"}"#),
    )
    .await;
    let token: Token = body_json(resp).await;
    let tok = Some(token.access_token.as_str());

    // create trip
    let resp = call(
        &mut app,
        json_request(
            "POST",
            "/trips",
            tok,
            r#"{"name":"Lisbon","start_date":"2025-05-01T00:00:00Z","end_date":"2025-05-08T00:00:00Z"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let trip: Trip = body_json(resp).await;
    assert_eq!(trip.name, "Lisbon");
    assert!(trip.events.is_empty());

    // create event
    let resp = call(
        &mut app,
        json_request(
            "POST",
            "/events",
            tok,
            &format!(
                r#"{{"trip_id":{},"name":"Tram 28","date":"2025-05-02T09:00:00Z","location":{{"latitude":38.71,"longitude":-9.13}}}}"#,
                trip.id
            ),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let event: Event = body_json(resp).await;
    assert_eq!(event.name, "Tram 28");
    assert!(event.location.as_ref().unwrap().address.is_none());

    // create media
    let resp = call(
        &mut app,
        json_request(
            "POST",
            "/media",
            tok,
            &format!(r#"{{"event_id":{},"base64_data":"aGVsbG8="}}"#, event.id),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let media: Media = body_json(resp).await;

    // get trip shows nesting
    let resp = call(&mut app, empty_request("GET", &format!("/trips/{}", trip.id), tok)).await;
    let fetched: Trip = body_json(resp).await;
    assert_eq!(fetched.events.len(), 1);
    assert_eq!(fetched.events[0].medias, vec![media.clone()]);

    // update event
    let resp = call(
        &mut app,
        json_request(
            "PUT",
            &format!("/events/{}", event.id),
            tok,
            r#"{"name":"Tram 28","note":"Crowded","date":"2025-05-02T09:00:00Z"}"#,
        ),
    )
    .await;
    let updated: Event = body_json(resp).await;
    assert_eq!(updated.note.as_deref(), Some("Crowded"));
    assert!(updated.location.is_none());
    assert_eq!(updated.medias.len(), 1);

    // delete media
    let resp = call(&mut app, empty_request("DELETE", &format!("/media/{}", media.id), tok)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // delete trip cascades
    let resp = call(&mut app, empty_request("DELETE", &format!("/trips/{}", trip.id), tok)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = call(&mut app, empty_request("DELETE", &format!("/events/{}", event.id), tok)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&mut app, empty_request("GET", "/trips", tok)).await;
    let trips: Vec<Trip> = body_json(resp).await;
    assert!(trips.is_empty());
}

#[tokio::test]
async fn trips_are_scoped_to_their_owner() {
    let mut app = app().into_service();

    let resp = call(
        &mut app,
        json_request("POST", "/register", None, r#"{"username":"ana","password":"pw"}"#),
    )
    .await;
    let ana: Token = body_json(resp).await;
    let resp = call(
        &mut app,
        json_request("POST", "/register", None, r#"{"username":"bob","password":"pw"}"#),
    )
    .await;
    let bob: Token = body_json(resp).await;

    let resp = call(
        &mut app,
        json_request(
            "POST",
            "/trips",
            Some(&ana.access_token),
            r#"{"name":"Private","start_date":"2025-05-01T00:00:00Z","end_date":"2025-05-02T00:00:00Z"}"#,
        ),
    )
    .await;
    let trip: Trip = body_json(resp).await;

    let resp = call(
        &mut app,
        empty_request("GET", &format!("/trips/{}", trip.id), Some(&bob.access_token)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&mut app, empty_request("GET", "/trips", Some(&bob.access_token))).await;
    let trips: Vec<Trip> = body_json(resp).await;
    assert!(trips.is_empty());
}

#[tokio::test]
async fn get_trip_bad_id_returns_400() {
    let mut app = app().into_service();
    let resp = call(
        &mut app,
        json_request("POST", "/register", None, r#"{"username":"ana","password":"pw"}"#),
    )
    .await;
    let token: Token = body_json(resp).await;

    let resp = call(
        &mut app,
        empty_request("GET", "/trips/not-a-number", Some(&token.access_token)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
