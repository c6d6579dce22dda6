/*!
`/api/timeslots`. Slots can be added and removed but not edited.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{Method, StatusCode},
    response::Response,
};
use serde_json::json;

use crate::config::Glob;
use crate::group::TimeSlot;
use crate::sheets::Sheets;
use super::*;

pub async fn api<S: Sheets>(
    method: Method,
    Query(params): Query<Params>,
    Extension(glob): Extension<Arc<Glob<S>>>,
    body: String,
) -> Response {
    log::trace!(
        "slots::api( {}, {:?}, [ {} bytes ] ) called.",
        &method, &params, body.len()
    );

    let res = match method {
        Method::GET => list_slots(&glob).await,
        Method::POST => add_slot(&body, &glob).await,
        Method::DELETE => delete_slot(&params, &glob).await,
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

async fn list_slots<S: Sheets>(glob: &Glob<S>) -> Reply {
    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.timeslots_id().await.map_err(fail(glob, None))?;

    let slots: Vec<TimeSlot> = store.list(&sid).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &slots))
}

async fn add_slot<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let mut slot: TimeSlot = json_body(body)?;
    require(&slot.name, "name")?;
    // A slot is a group with no parent.
    slot.parent_id = None;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.timeslots_id().await.map_err(fail(glob, None))?;

    store.insert(&sid, &mut slot).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::CREATED, &slot))
}

async fn delete_slot<S: Sheets>(params: &Params, glob: &Glob<S>) -> Reply {
    let id = params.require_id()?;

    let store = glob.store().map_err(fail(glob, None))?;
    let sid = glob.timeslots_id().await.map_err(fail(glob, None))?;

    store.delete::<TimeSlot>(&sid, id).await
        .map_err(fail(glob, Some(sid.as_str())))?;
    Ok(respond_json(StatusCode::OK, &json!({ "deleted": id })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Glob;
    use crate::inter::tests::{call, test_cfg};
    use crate::sheets::MemorySheets;
    use crate::store::tests::REGISTRY;
    use crate::tests::ensure_logging;

    #[tokio::test]
    async fn slots_live_in_their_own_spreadsheet() {
        ensure_logging();
        let sheets = Arc::new(
            MemorySheets::new()
                .with_spreadsheet(REGISTRY, "School REG")
                .with_spreadsheet("slots", "Timetable")
        );
        let mut cfg = test_cfg();
        cfg.timeslots_spreadsheet_id = Some("slots".to_owned());
        let app = crate::router(Arc::new(Glob::new(cfg, Some(sheets.clone()))));

        let (status, body) = call(&app, "POST", "/api/timeslots", r#"{
            "name": "14:00", "parentId": "g9"
        }"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["parentId"], serde_json::Value::Null);
        let id = body["id"].as_str().unwrap().to_owned();

        assert_eq!(sheets.tab_count(REGISTRY), 0);
        assert_eq!(sheets.rows("slots", "TimeSlots").unwrap().len(), 2);

        let (status, _) = call(&app, "PUT", "/api/timeslots", &body.to_string()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = call(&app, "DELETE", &format!("/api/timeslots?id={}", &id), "").await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/api/timeslots", "").await;
        assert_eq!(body, json!([]));
    }
}
