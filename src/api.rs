//! WakaTime-compatible HTTP endpoints.

use crate::date::format_time;
use crate::db::HeartbeatRepository;
use crate::error::Error;
use crate::model::RawHeartbeat;
use crate::service::HeartbeatService;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{json, with_status, Json, WithStatus};
use warp::{Filter, Rejection, Reply};

type Response = WithStatus<Json>;

const MAX_HEARTBEAT_BYTES: u64 = 64 * 1024;
const MAX_BULK_BYTES: u64 = 4 * 1024 * 1024;

fn inject<T>(t: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Send + Sync + Clone,
{
    warp::any().map(move || t.clone())
}

#[derive(Debug)]
struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Passes only requests carrying `key` in the `Authorization` header.
fn authorized(key: &'static str) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |auth: Option<String>| async move {
            match auth {
                Some(k) if k == key => Ok(()),
                _ => Err(warp::reject::custom(Unauthorized)),
            }
        })
        .untuple_one()
}

/// All routes. `key` is the full expected `Authorization` header value.
pub fn routes<R>(
    service: Arc<HeartbeatService<R>>,
    key: &'static str,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    R: HeartbeatRepository + 'static,
{
    let heartbeat = warp::post()
        .and(warp::path!("api" / "v1" / "users" / "current" / "heartbeats"))
        .and(warp::body::content_length_limit(MAX_HEARTBEAT_BYTES))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("user-agent"))
        .and(warp::header::optional::<String>("x-machine-name"))
        .and(inject(service.clone()))
        .and_then(on_heartbeat::<R>);

    let bulk = warp::post()
        .and(warp::path!("api" / "v1" / "users" / "current" / "heartbeats.bulk"))
        .and(warp::body::content_length_limit(MAX_BULK_BYTES))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("user-agent"))
        .and(warp::header::optional::<String>("x-machine-name"))
        .and(inject(service.clone()))
        .and_then(on_heartbeats::<R>);

    let summaries = warp::get()
        .and(warp::path!("api" / "v1" / "users" / "current" / "summaries"))
        .and(warp::query::<RangeQuery>())
        .and(inject(service.clone()))
        .and_then(on_summaries::<R>);

    let today = warp::get()
        .and(warp::path!("api" / "v1" / "users" / "current" / "statusbar" / "today"))
        .and(inject(service.clone()))
        .and_then(on_today::<R>);

    let config = warp::put()
        .and(warp::path!("api" / "v1" / "config"))
        .and(warp::body::content_length_limit(MAX_HEARTBEAT_BYTES))
        .and(warp::body::json())
        .and(inject(service))
        .and_then(on_config::<R>);

    authorized(key)
        .and(heartbeat.or(bulk).or(summaries).or(today).or(config))
        .recover(recover)
        .with(warp::filters::trace::request())
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatJson {
    pub entity: Option<String>,
    pub project: Option<String>,
    pub language: Option<String>,
    pub branch: Option<String>,
    /// Seconds since the Unix epoch, with fractional part.
    pub time: Option<f64>,
    pub user_agent: Option<String>,
    pub machine_name: Option<String>,
}

impl HeartbeatJson {
    fn into_raw(self, user_agent: Option<&str>, machine: Option<&str>) -> RawHeartbeat {
        RawHeartbeat {
            entity: self.entity,
            project: self.project,
            language: self.language,
            branch: self.branch,
            user_agent: self.user_agent.or_else(|| user_agent.map(str::to_owned)),
            time: self
                .time
                .filter(|t| t.is_finite())
                .map(|t| (t * 1000.0).round() as i64),
            machine_name: machine.map(str::to_owned).or(self.machine_name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigJson {
    pub timeout: u32,
}

#[derive(Serialize)]
struct Data<T> {
    data: T,
}

#[derive(Serialize)]
struct Created {
    id: String,
}

#[derive(Serialize)]
struct Message<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct Today {
    grand_total: GrandTotal,
    total_msec: i64,
}

#[derive(Serialize)]
struct GrandTotal {
    total_seconds: f64,
    text: String,
}

fn failure(e: Error) -> Response {
    match e {
        Error::InvalidInput(msg) => {
            tracing::warn!("Rejected: {}", msg);
            with_status(json(&Message { error: &msg }), StatusCode::BAD_REQUEST)
        }
        Error::Store(e) => {
            tracing::error!("DB Error: {:#?}", e);
            with_status(
                json(&Message {
                    error: "Internal Server Error",
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

async fn on_heartbeat<R: HeartbeatRepository>(
    msg: HeartbeatJson,
    user_agent: Option<String>,
    machine: Option<String>,
    service: Arc<HeartbeatService<R>>,
) -> Result<Response, Infallible> {
    let raw = msg.into_raw(user_agent.as_deref(), machine.as_deref());

    Ok(match service.save(raw).await {
        Ok(id) => with_status(json(&Data { data: Created { id } }), StatusCode::CREATED),
        Err(e) => failure(e),
    })
}

async fn on_heartbeats<R: HeartbeatRepository>(
    msg: Vec<HeartbeatJson>,
    user_agent: Option<String>,
    machine: Option<String>,
    service: Arc<HeartbeatService<R>>,
) -> Result<Response, Infallible> {
    let raws = msg
        .into_iter()
        .map(|x| x.into_raw(user_agent.as_deref(), machine.as_deref()))
        .collect();

    Ok(match service.save_all(raws).await {
        Ok(ids) => {
            let data: Vec<_> = ids.into_iter().map(|id| Created { id }).collect();
            with_status(json(&Data { data }), StatusCode::CREATED)
        }
        Err(e) => failure(e),
    })
}

async fn on_summaries<R: HeartbeatRepository>(
    query: RangeQuery,
    service: Arc<HeartbeatService<R>>,
) -> Result<Response, Infallible> {
    Ok(match service.summarize(query.start, query.end).await {
        Ok(summary) => with_status(json(&summary), StatusCode::OK),
        Err(e) => failure(e),
    })
}

async fn on_today<R: HeartbeatRepository>(
    service: Arc<HeartbeatService<R>>,
) -> Result<Response, Infallible> {
    Ok(match service.today().await {
        Ok(msec) => {
            let today = Today {
                grand_total: GrandTotal {
                    total_seconds: msec as f64 / 1000.0,
                    text: format_time(service.settings().time_format(), msec),
                },
                total_msec: msec,
            };
            with_status(json(&Data { data: today }), StatusCode::OK)
        }
        Err(e) => failure(e),
    })
}

async fn on_config<R: HeartbeatRepository>(
    msg: ConfigJson,
    service: Arc<HeartbeatService<R>>,
) -> Result<Response, Infallible> {
    if msg.timeout == 0 {
        return Ok(failure(Error::invalid("timeout must be positive")));
    }

    service.settings().set_timeout(msg.timeout);
    tracing::info!("timeout set to {}s", msg.timeout);

    Ok(with_status(
        json(&ConfigJson {
            timeout: service.settings().timeout(),
        }),
        StatusCode::OK,
    ))
}

async fn recover(err: Rejection) -> Result<Response, Infallible> {
    let (status, msg) = if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "Unauthorized")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        // Body and query errors are checked before method errors: the other routes reject with those too.
        (StatusCode::BAD_REQUEST, "Bad Request")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length Required")
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };

    Ok(with_status(json(&Message { error: msg }), status))
}
