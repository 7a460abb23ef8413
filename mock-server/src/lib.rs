use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<Location>,
    pub transition_from_previous: Option<String>,
    pub medias: Vec<Media>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub events: Vec<Event>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `/token` form body. `grant_type` is accepted and ignored.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub grant_type: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct TripInput {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct EventCreate {
    pub trip_id: i64,
    #[serde(flatten)]
    pub fields: EventInput,
}

#[derive(Deserialize)]
pub struct EventInput {
    pub name: String,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<Location>,
    pub transition_from_previous: Option<String>,
}

#[derive(Deserialize)]
pub struct MediaCreate {
    pub event_id: i64,
    pub base64_data: String,
}

struct TripRow {
    owner: String,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

struct EventRow {
    trip_id: i64,
    fields: EventInput,
}

struct MediaRow {
    event_id: i64,
}

#[derive(Default)]
pub struct Store {
    users: HashMap<String, String>,
    sessions: HashMap<String, String>,
    next_id: i64,
    trips: BTreeMap<i64, TripRow>,
    events: BTreeMap<i64, EventRow>,
    media: BTreeMap<i64, MediaRow>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, username: &str) -> Token {
        let access_token = Uuid::new_v4().to_string();
        self.sessions.insert(access_token.clone(), username.to_string());
        Token {
            access_token,
            token_type: "bearer".to_string(),
        }
    }

    fn owns_trip(&self, user: &str, trip_id: i64) -> bool {
        self.trips.get(&trip_id).is_some_and(|t| t.owner == user)
    }

    fn owns_event(&self, user: &str, event_id: i64) -> bool {
        self.events
            .get(&event_id)
            .is_some_and(|e| self.owns_trip(user, e.trip_id))
    }

    fn owns_media(&self, user: &str, media_id: i64) -> bool {
        self.media
            .get(&media_id)
            .is_some_and(|m| self.owns_event(user, m.event_id))
    }

    fn media_view(id: i64) -> Media {
        Media {
            id,
            url: Some(format!("/media/{id}")),
        }
    }

    fn event_view(&self, id: i64) -> Option<Event> {
        let row = self.events.get(&id)?;
        let medias = self
            .media
            .iter()
            .filter(|(_, m)| m.event_id == id)
            .map(|(mid, _)| Self::media_view(*mid))
            .collect();
        Some(Event {
            id,
            name: row.fields.name.clone(),
            note: row.fields.note.clone(),
            date: row.fields.date,
            location: row.fields.location.clone(),
            transition_from_previous: row.fields.transition_from_previous.clone(),
            medias,
        })
    }

    fn trip_view(&self, id: i64) -> Option<Trip> {
        let row = self.trips.get(&id)?;
        let events = self
            .events
            .iter()
            .filter(|(_, e)| e.trip_id == id)
            .filter_map(|(eid, _)| self.event_view(*eid))
            .collect();
        Some(Trip {
            id,
            name: row.name.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
            events,
        })
    }

    fn remove_event(&mut self, id: i64) {
        self.events.remove(&id);
        self.media.retain(|_, m| m.event_id != id);
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}", get(get_trip).put(update_trip).delete(delete_trip))
        .route("/events", post(create_event))
        .route("/events/{id}", put(update_event).delete(delete_event))
        .route("/media", post(create_media))
        .route("/media/{id}", delete(delete_media))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Resolve the bearer token in `headers` to a username.
fn authenticate(headers: &HeaderMap, store: &Store) -> Result<String, StatusCode> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let (scheme, token) = value.split_once(' ').ok_or(StatusCode::UNAUTHORIZED)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    store
        .sessions
        .get(token.trim())
        .cloned()
        .ok_or(StatusCode::UNAUTHORIZED)
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<Token>, StatusCode> {
    let mut store = db.write().await;
    if input.username.is_empty() || store.users.contains_key(&input.username) {
        return Err(StatusCode::BAD_REQUEST);
    }
    store.users.insert(input.username.clone(), input.password);
    tracing::info!(username = %input.username, "registered user");
    Ok(Json(store.issue_token(&input.username)))
}

async fn login(
    State(db): State<Db>,
    Form(input): Form<LoginForm>,
) -> Result<Json<Token>, StatusCode> {
    let mut store = db.write().await;
    let valid = store
        .users
        .get(&input.username)
        .is_some_and(|password| *password == input.password);
    if !valid {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(store.issue_token(&input.username)))
}

async fn list_trips(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Trip>>, StatusCode> {
    let store = db.read().await;
    let user = authenticate(&headers, &store)?;
    let trips = store
        .trips
        .iter()
        .filter(|(_, t)| t.owner == user)
        .filter_map(|(id, _)| store.trip_view(*id))
        .collect();
    Ok(Json(trips))
}

async fn create_trip(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<TripInput>,
) -> Result<Json<Trip>, StatusCode> {
    let mut store = db.write().await;
    let owner = authenticate(&headers, &store)?;
    let id = store.next_id();
    store.trips.insert(
        id,
        TripRow {
            owner,
            name: input.name,
            start_date: input.start_date,
            end_date: input.end_date,
        },
    );
    store.trip_view(id).map(Json).ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_trip(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Trip>, StatusCode> {
    let store = db.read().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_trip(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.trip_view(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_trip(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<TripInput>,
) -> Result<Json<Trip>, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_trip(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let trip = store.trips.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    trip.name = input.name;
    trip.start_date = input.start_date;
    trip.end_date = input.end_date;
    store.trip_view(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_trip(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_trip(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.trips.remove(&id);
    let event_ids: Vec<i64> = store
        .events
        .iter()
        .filter(|(_, e)| e.trip_id == id)
        .map(|(eid, _)| *eid)
        .collect();
    for event_id in event_ids {
        store.remove_event(event_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_event(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<EventCreate>,
) -> Result<Json<Event>, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_trip(&user, input.trip_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let id = store.next_id();
    store.events.insert(
        id,
        EventRow {
            trip_id: input.trip_id,
            fields: input.fields,
        },
    );
    store.event_view(id).map(Json).ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn update_event(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<EventInput>,
) -> Result<Json<Event>, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_event(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let event = store.events.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    event.fields = input;
    store.event_view(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_event(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_event(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.remove_event(id);
    Ok(StatusCode::NO_CONTENT)
}

async fn create_media(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<MediaCreate>,
) -> Result<Json<Media>, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_event(&user, input.event_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    if input.base64_data.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let id = store.next_id();
    store.media.insert(
        id,
        MediaRow {
            event_id: input.event_id,
        },
    );
    Ok(Json(Store::media_view(id)))
}

async fn delete_media(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    let user = authenticate(&headers, &store)?;
    if !store.owns_media(&user, id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.media.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}
