/*!
`/api/groups`: cohorts in the registry spreadsheet.

`GET /api/groups?resolve=true` also looks up each group's teacher and
time slot by name.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{Method, StatusCode},
    response::Response,
};
use serde_json::json;

use crate::config::Glob;
use crate::group::Group;
use crate::sheets::Sheets;
use super::*;

pub async fn api<S: Sheets>(
    method: Method,
    Query(params): Query<Params>,
    Extension(glob): Extension<Arc<Glob<S>>>,
    body: String,
) -> Response {
    log::trace!(
        "groups::api( {}, {:?}, [ {} bytes ] ) called.",
        &method, &params, body.len()
    );

    let res = match method {
        Method::GET => list_groups(&params, &glob).await,
        Method::POST => add_group(&body, &glob).await,
        Method::PUT => update_group(&body, &glob).await,
        Method::DELETE => delete_group(&params, &glob).await,
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

async fn list_groups<S: Sheets>(params: &Params, glob: &Glob<S>) -> Reply {
    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    if params.resolve() {
        let slots_id = glob.timeslots_id().await.map_err(fail(glob, None))?;
        let groups = store.get_groups_resolved(&sid, &slots_id).await
            .map_err(fail(glob, Some(sid.as_str())))?;
        return Ok(respond_json(StatusCode::OK, &groups));
    }

    let groups: Vec<Group> = store.list(&sid).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &groups))
}

async fn add_group<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let mut g: Group = json_body(body)?;
    require(&g.name, "name")?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    store.insert(&sid, &mut g).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::CREATED, &g))
}

async fn update_group<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let g: Group = json_body(body)?;
    require(&g.id, "id")?;
    require(&g.name, "name")?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    store.update(&sid, &g).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &g))
}

async fn delete_group<S: Sheets>(params: &Params, glob: &Glob<S>) -> Reply {
    let id = params.require_id()?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.registry_id().await.map_err(fail(glob, None))?;

    store.delete::<Group>(&sid, id).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &json!({ "deleted": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::tests::{call, registry_sheets, test_app};

    #[tokio::test]
    async fn group_crud_and_resolution() {
        let app = test_app(registry_sheets());

        let (_, teacher) = call(&app, "POST", "/api/users", r#"{
            "firstName": "Irfan", "lastName": "Khan", "role": "teacher"
        }"#).await;
        let (_, slot) = call(&app, "POST", "/api/timeslots", r#"{ "name": "14:00" }"#).await;

        let (status, g) = call(&app, "POST", "/api/groups", &json!({
            "name": "Algebra I",
            "scheduleType": "TTS",
            "teacherId": teacher["id"],
            "timeSlotId": slot["id"],
        }).to_string()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(g["scheduleType"], "TTS");
        let id = g["id"].as_str().unwrap().to_owned();

        let (status, body) = call(&app, "GET", "/api/groups?resolve=true", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], id.as_str());
        assert_eq!(body[0]["teacherName"], "Irfan Khan");
        assert_eq!(body[0]["timeSlotName"], "14:00");

        let (status, body) = call(&app, "PUT", "/api/groups", &json!({
            "id": &id, "name": "Algebra II",
        }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheduleType"], "MWF");

        let (_, body) = call(&app, "GET", "/api/groups", "").await;
        assert_eq!(body[0]["name"], "Algebra II");
        assert!(body[0].get("teacherName").is_none());

        let (status, _) = call(&app, "DELETE", &format!("/api/groups?id={}", &id), "").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "DELETE", &format!("/api/groups?id={}", &id), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resolve_flag_is_loose() {
        let app = test_app(registry_sheets());
        let (_, teacher) = call(&app, "POST", "/api/users", r#"{
            "firstName": "Irfan", "lastName": "Khan", "role": "teacher"
        }"#).await;
        call(&app, "POST", "/api/groups", &json!({
            "name": " Algebra I ", "teacherId": teacher["id"],
        }).to_string()).await;

        for uri in ["/api/groups?resolve=1", "/api/groups?resolve", "/api/groups?resolve=TRUE"] {
            let (status, body) = call(&app, "GET", uri, "").await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(body[0]["teacherName"], "Irfan Khan", "{}", uri);
            assert_eq!(body[0]["name"], "Algebra I", "{}", uri);
        }
        for uri in ["/api/groups?resolve=0", "/api/groups?resolve=no"] {
            let (status, body) = call(&app, "GET", uri, "").await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert!(body[0].get("teacherName").is_none(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn group_needs_name() {
        let app = test_app(registry_sheets());
        let (status, body) = call(&app, "POST", "/api/groups", r#"{ "description": "x" }"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "name is required.");
    }
}
