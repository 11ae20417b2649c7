use hyper::Method;

use crate::http::{Request, RequestUri, Response, Result};
use crate::method;
use crate::model::{CategoryId, MatchId, ResultRequest, TournamentId};
use crate::{service, Error, StatusCodeError};

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    let id: TournamentId = match uri.take() {
        Some(part) => part.parse()?,
        None => return Err(Error::NotFound),
    };

    match uri.take_str() {
        Some("categories") => {
            let category: CategoryId = match uri.take() {
                Some(part) => part.parse()?,
                None => return Err(Error::NotFound),
            };

            match uri.take_str() {
                Some("draw") if uri.take_str().is_none() => method!(req, {
                    Method::POST => draw(req, id, category).await,
                }),
                Some("publish") if uri.take_str().is_none() => method!(req, {
                    Method::POST => publish(req, id, category).await,
                }),
                _ => Err(Error::NotFound),
            }
        }
        Some("fixture") if uri.take_str().is_none() => method!(req, {
            Method::GET => fixture(req, id).await,
        }),
        Some("schedule") if uri.take_str().is_none() => method!(req, {
            Method::POST => schedule(req, id).await,
        }),
        Some("matches") => {
            let m: MatchId = match uri.take() {
                Some(part) => part.parse()?,
                None => return Err(Error::NotFound),
            };

            match uri.take_str() {
                Some("result") if uri.take_str().is_none() => method!(req, {
                    Method::POST => result(req, id, m).await,
                }),
                _ => Err(Error::NotFound),
            }
        }
        _ => Err(Error::NotFound),
    }
}

async fn draw(req: Request, id: TournamentId, category: CategoryId) -> Result {
    let fixture = service::draw_category(req.state(), id, category).await?;

    Ok(Response::ok().json(&fixture))
}

async fn publish(req: Request, id: TournamentId, category: CategoryId) -> Result {
    let publication = service::publish_category(req.state(), id, category).await?;

    Ok(Response::ok().json(&publication))
}

async fn fixture(req: Request, id: TournamentId) -> Result {
    let category = match req.query("category") {
        Some(value) => Some(value.parse::<CategoryId>().map_err(|_| {
            StatusCodeError::bad_request().message("Invalid category id")
        })?),
        None => None,
    };

    let fixture = service::get_fixture(req.state(), id, category).await?;

    Ok(Response::ok().json(&fixture))
}

async fn schedule(req: Request, id: TournamentId) -> Result {
    let schedule = service::schedule_tournament(req.state(), id).await?;

    Ok(Response::ok().json(&schedule))
}

async fn result(mut req: Request, id: TournamentId, m: MatchId) -> Result {
    let body: ResultRequest = req.json().await?;

    let result = service::record_result(req.state(), id, m, body).await?;

    Ok(Response::ok().json(&result))
}
