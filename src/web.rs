use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use crate::date_key::{DateKey, DayRef};
use crate::error::{Result, RosterError};
use crate::parser::read_rankings;
use crate::roster::{Roster, StoreMode};
use crate::stats::SeasonQuery;
use crate::store::{NewSpecialEvent, SeasonKey, SeasonWeights, SpecialEventPatch, VipSelection};

pub struct AppState {
    pub roster: Mutex<Roster>,
    pub admin_password: String,
    pub default_weights: SeasonWeights,
}

impl AppState {
    pub fn new(roster: Roster, admin_password: String, default_weights: SeasonWeights) -> Self {
        AppState {
            roster: Mutex::new(roster),
            admin_password,
            default_weights,
        }
    }

    /// Locks the roster. Mutations swap state in whole, so a handler that
    /// panicked mid-request cannot have left it half-written.
    fn roster(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(|poisoned| {
            warn!("recovering roster lock after a panicked request");
            poisoned.into_inner()
        })
    }

    fn is_admin(&self, req: &HttpRequest) -> bool {
        let password = req
            .headers()
            .get("X-Admin-Password")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        password == self.admin_password
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"}))
}

fn ok(value: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"success": true, "data": value}))
}

fn today() -> DateKey {
    DateKey::new(Utc::now().date_naive())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
struct StatusResponse {
    mode: StoreMode,
    backend: String,
}

#[derive(Deserialize)]
pub struct WeeklyParams {
    week: Option<DateKey>,
    #[serde(default)]
    events: bool,
}

#[derive(Deserialize)]
pub struct DateParams {
    date: Option<DateKey>,
    time: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
}

#[derive(Deserialize)]
pub struct PlayerRequest {
    player_name: String,
}

#[derive(Deserialize)]
pub struct ReorderRequest {
    order: Vec<String>,
}

#[derive(Deserialize)]
pub struct KudosRequest {
    player_name: String,
    date: Option<DateKey>,
    value: u8,
}

#[derive(Deserialize)]
pub struct RemovePlayerRequest {
    player_name: String,
    removed_on: Option<DateKey>,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
pub struct AliasRequest {
    primary_name: String,
    alias_name: String,
    #[serde(default)]
    created_by: String,
}

#[derive(Deserialize)]
pub struct SeasonRequest {
    season_name: String,
    start_date: DateKey,
    end_date: DateKey,
    weights: Option<SeasonWeights>,
}

#[derive(Deserialize)]
pub struct SeasonRange {
    start_date: DateKey,
    end_date: DateKey,
}

#[derive(Serialize)]
struct PlayerNames {
    primary: String,
    is_alias: bool,
    variations: Vec<String>,
}

#[derive(Serialize)]
struct ConductorResponse<'a> {
    date: DateKey,
    conductor: Option<&'a str>,
    next_due: Option<&'a str>,
}

// Admin login endpoint
async fn admin_login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> HttpResponse {
    if req.password == state.admin_password {
        HttpResponse::Ok().json(serde_json::json!({"success": true}))
    } else {
        HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Invalid password"}))
    }
}

async fn get_status(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    Ok(ok(StatusResponse {
        mode: roster.mode(),
        backend: roster.backend_description(),
    }))
}

async fn reload(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.refresh()?;
    Ok(ok(StatusResponse {
        mode: roster.mode(),
        backend: roster.backend_description(),
    }))
}

async fn go_offline(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.engage_offline();
    Ok(ok(StatusResponse {
        mode: roster.mode(),
        backend: roster.backend_description(),
    }))
}

// Rankings

async fn upload_rankings(
    req: HttpRequest,
    day: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let day = DayRef::try_from(day.into_inner())?;
    let records = read_rankings(body.as_ref(), &day)?;
    let count = state.roster().import_rankings(day, records)?;
    Ok(ok(serde_json::json!({ "imported": count })))
}

async fn get_rankings(day: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let day = DayRef::try_from(day.into_inner())?;
    let roster = state.roster();
    Ok(ok(roster.data().rankings.for_day(&day)))
}

async fn clear_rankings(req: HttpRequest, day: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let day = DayRef::try_from(day.into_inner())?;
    let count = state.roster().clear_day(&day)?;
    Ok(ok(serde_json::json!({ "deleted": count })))
}

async fn get_weekly(params: web::Query<WeeklyParams>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let week = params.week.unwrap_or_else(today);
    let roster = state.roster();
    Ok(ok(roster.weekly_report(week, params.events)))
}

// Special events

async fn list_events(params: web::Query<DateParams>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    let events = match params.date {
        Some(date) => roster.data().events.on_date(date),
        None => roster.data().events.list(),
    };
    Ok(ok(events))
}

async fn create_event(
    req: HttpRequest,
    body: web::Json<NewSpecialEvent>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let event = state.roster().create_event(body.into_inner())?;
    Ok(ok(event))
}

async fn update_event(
    req: HttpRequest,
    key: web::Path<String>,
    body: web::Json<SpecialEventPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let event = state.roster().update_event(&key, body.into_inner())?;
    Ok(ok(event))
}

async fn delete_event(req: HttpRequest, key: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let (event, rows) = state.roster().delete_event(&key)?;
    Ok(ok(serde_json::json!({ "event": event, "rankings_deleted": rows })))
}

// Leaders and rotation

async fn list_leaders(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    Ok(ok(roster.data().leaders.list()))
}

async fn add_leader(req: HttpRequest, body: web::Json<PlayerRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let leader = state.roster().add_leader(&body.player_name)?;
    Ok(ok(leader))
}

async fn remove_leader(req: HttpRequest, name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    state.roster().remove_leader(&name)?;
    Ok(ok(serde_json::json!({ "removed": name.into_inner() })))
}

async fn get_rotation(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    Ok(ok(roster.rotation()))
}

async fn get_conductor(params: web::Query<DateParams>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let date = params.date.unwrap_or_else(today);
    let roster = state.roster();
    Ok(ok(ConductorResponse {
        date,
        conductor: roster.current_conductor(date).map(|e| e.player_name.as_str()),
        next_due: roster.next_leader_due().map(|e| e.player_name.as_str()),
    }))
}

async fn advance_rotation(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.advance_rotation()?;
    Ok(ok(roster.rotation()))
}

async fn move_up(req: HttpRequest, index: web::Path<usize>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.move_up(index.into_inner())?;
    Ok(ok(roster.rotation()))
}

async fn move_down(req: HttpRequest, index: web::Path<usize>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.move_down(index.into_inner())?;
    Ok(ok(roster.rotation()))
}

async fn remove_from_rotation(
    req: HttpRequest,
    index: web::Path<usize>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.remove_from_rotation(index.into_inner())?;
    Ok(ok(roster.rotation()))
}

async fn reorder_rotation(
    req: HttpRequest,
    body: web::Json<ReorderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.reorder_rotation(&body.order)?;
    Ok(ok(roster.rotation()))
}

// VIP trains

async fn get_vips(date: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let date = DateKey::parse(&date)?;
    let roster = state.roster();
    Ok(ok(roster.data().vip.for_date(date)))
}

async fn set_vip(req: HttpRequest, body: web::Json<VipSelection>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let saved = state.roster().set_vip_for_date(body.into_inner())?;
    Ok(ok(saved))
}

async fn confirm_train(
    req: HttpRequest,
    body: web::Json<VipSelection>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let saved = state.roster().confirm_train(body.into_inner())?;
    Ok(ok(saved))
}

async fn conductor_counts(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    let data = roster.data();
    Ok(ok(data.vip.conductor_counts(&data.aliases)))
}

async fn delete_vips(
    req: HttpRequest,
    date: web::Path<String>,
    params: web::Query<DateParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let date = DateKey::parse(&date)?;
    let mut roster = state.roster();
    let deleted = match &params.time {
        Some(time) => {
            roster.delete_vip(date, time)?;
            1
        }
        None => roster.delete_vips_for_date(date)?,
    };
    Ok(ok(serde_json::json!({ "deleted": deleted })))
}

// Players

async fn award_kudos(req: HttpRequest, body: web::Json<KudosRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let date = body.date.unwrap_or_else(today);
    let award = state.roster().award_kudos(&body.player_name, date, body.value)?;
    Ok(ok(award))
}

async fn remove_player(
    req: HttpRequest,
    body: web::Json<RemovePlayerRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let removed_on = body.removed_on.unwrap_or_else(today);
    let removed = state.roster().remove_player(&body.player_name, removed_on, &body.reason)?;
    Ok(ok(removed))
}

async fn restore_player(req: HttpRequest, name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let restored = state.roster().restore_player(&name)?;
    Ok(ok(restored))
}

async fn add_alias(req: HttpRequest, body: web::Json<AliasRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let alias = state
        .roster()
        .add_alias(&body.primary_name, &body.alias_name, &body.created_by)?;
    Ok(ok(alias))
}

async fn refresh_aliases(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let mut roster = state.roster();
    roster.refresh_aliases()?;
    Ok(ok(roster.data().aliases.aliases()))
}

async fn deactivate_alias(req: HttpRequest, alias: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    state.roster().deactivate_alias(&alias)?;
    Ok(ok(serde_json::json!({ "deactivated": alias.into_inner() })))
}

async fn player_names(name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    let aliases = &roster.data().aliases;
    Ok(ok(PlayerNames {
        primary: aliases.resolve(&name),
        is_alias: aliases.is_alias(&name),
        variations: aliases.variations_of(&name).into_iter().collect(),
    }))
}

async fn player_history(name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    let data = roster.data();
    Ok(ok(data.vip.history_for(&data.aliases, &name)))
}

async fn search_players(params: web::Query<SearchParams>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    Ok(ok(roster.search_players(&params.q)))
}

// Seasons

async fn generate_season(
    req: HttpRequest,
    body: web::Json<SeasonRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.is_admin(&req) {
        return Ok(unauthorized());
    }
    let body = body.into_inner();
    let query = SeasonQuery {
        season_name: body.season_name,
        start_date: body.start_date,
        end_date: body.end_date,
        weights: body.weights.unwrap_or(state.default_weights),
    };
    let snapshot = state.roster().generate_season(query)?;
    Ok(ok(snapshot))
}

async fn list_seasons(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = state.roster();
    let seasons: Vec<_> = roster.data().seasons.all().collect();
    Ok(ok(seasons))
}

async fn get_season(
    name: web::Path<String>,
    params: web::Query<SeasonRange>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let key = SeasonKey {
        season_name: name.into_inner(),
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let roster = state.roster();
    match roster.season(&key) {
        Some(snapshot) => Ok(ok(snapshot)),
        None => RosterError::not_found(format!("season '{}'", key.season_name)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(admin_login))
        .route("/api/status", web::get().to(get_status))
        .route("/api/reload", web::post().to(reload))
        .route("/api/offline", web::post().to(go_offline))
        .route("/api/weekly", web::get().to(get_weekly))
        .service(
            web::resource("/api/rankings/{day}")
                .route(web::get().to(get_rankings))
                .route(web::post().to(upload_rankings))
                .route(web::delete().to(clear_rankings)),
        )
        .service(
            web::resource("/api/events")
                .route(web::get().to(list_events))
                .route(web::post().to(create_event)),
        )
        .service(
            web::resource("/api/events/{key}")
                .route(web::patch().to(update_event))
                .route(web::delete().to(delete_event)),
        )
        .service(
            web::resource("/api/leaders")
                .route(web::get().to(list_leaders))
                .route(web::post().to(add_leader)),
        )
        .route("/api/leaders/{name}", web::delete().to(remove_leader))
        .service(
            web::resource("/api/rotation")
                .route(web::get().to(get_rotation))
                .route(web::put().to(reorder_rotation)),
        )
        .route("/api/rotation/conductor", web::get().to(get_conductor))
        .route("/api/rotation/advance", web::post().to(advance_rotation))
        .route("/api/rotation/{index}/up", web::post().to(move_up))
        .route("/api/rotation/{index}/down", web::post().to(move_down))
        .route("/api/rotation/{index}", web::delete().to(remove_from_rotation))
        .route("/api/vip", web::post().to(set_vip))
        .route("/api/vip/confirm", web::post().to(confirm_train))
        .route("/api/vip/conductors", web::get().to(conductor_counts))
        .service(
            web::resource("/api/vip/{date}")
                .route(web::get().to(get_vips))
                .route(web::delete().to(delete_vips)),
        )
        .route("/api/kudos", web::post().to(award_kudos))
        .route("/api/players/search", web::get().to(search_players))
        .route("/api/players/{name}/aliases", web::get().to(player_names))
        .route("/api/players/{name}/history", web::get().to(player_history))
        .route("/api/players/removed", web::post().to(remove_player))
        .route("/api/players/removed/{name}", web::delete().to(restore_player))
        .route("/api/aliases", web::post().to(add_alias))
        .route("/api/aliases/refresh", web::post().to(refresh_aliases))
        .route("/api/aliases/{alias}", web::delete().to(deactivate_alias))
        .service(
            web::resource("/api/seasons")
                .route(web::get().to(list_seasons))
                .route(web::post().to(generate_season)),
        )
        .route("/api/seasons/{name}", web::get().to(get_season));
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);
    info!("starting web server on port {port}");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
