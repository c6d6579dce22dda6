/*!
`/api/users`: staff accounts in the registry spreadsheet.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{Method, StatusCode},
    response::Response,
};
use serde_json::json;

use crate::config::Glob;
use crate::sheets::Sheets;
use crate::user::User;
use super::*;

pub async fn api<S: Sheets>(
    method: Method,
    Query(params): Query<Params>,
    Extension(glob): Extension<Arc<Glob<S>>>,
    body: String,
) -> Response {
    log::trace!(
        "users::api( {}, {:?}, [ {} bytes ] ) called.",
        &method, &params, body.len()
    );

    let res = match method {
        Method::GET => list_users(&glob).await,
        Method::POST => add_user(&body, &glob).await,
        Method::PUT => update_user(&body, &glob).await,
        Method::DELETE => delete_user(&params, &glob).await,
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

async fn list_users<S: Sheets>(glob: &Glob<S>) -> Reply {
    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    let users: Vec<User> = store.list(&sid).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &users))
}

async fn add_user<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let mut u: User = json_body(body)?;
    require(&u.first_name, "firstName")?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    store.insert(&sid, &mut u).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::CREATED, &u))
}

async fn update_user<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let u: User = json_body(body)?;
    require(&u.id, "id")?;
    require(&u.first_name, "firstName")?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    let stored = store.update_user(&sid, &u).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &stored))
}

async fn delete_user<S: Sheets>(params: &Params, glob: &Glob<S>) -> Reply {
    let id = params.require_id()?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    store.delete::<User>(&sid, id).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &json!({ "deleted": id })))
}
