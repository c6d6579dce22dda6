/*!
`/api/students` and `/api/students/import`.

Reads gather students from every configured student spreadsheet; new
students always go into the primary one. Edits must say which spreadsheet
the student lives in, since that's where its row is.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{Method, StatusCode},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

use crate::config::Glob;
use crate::sheets::Sheets;
use crate::student::Student;
use super::*;

/// Body of a multi-student DELETE.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkDelete {
    #[serde(default)]
    spreadsheet_id: String,
    #[serde(default)]
    ids: Vec<String>,
}

pub async fn api<S: Sheets>(
    method: Method,
    Query(params): Query<Params>,
    Extension(glob): Extension<Arc<Glob<S>>>,
    body: String,
) -> Response {
    log::trace!(
        "students::api( {}, {:?}, [ {} bytes ] ) called.",
        &method, &params, body.len()
    );

    let res = match method {
        Method::GET => list_students(&glob).await,
        Method::POST => add_student(&body, &glob).await,
        Method::PUT => update_student(&body, &glob).await,
        Method::DELETE => match params.id {
            Some(_) => delete_student(&params, &glob).await,
            None if !body.trim().is_empty() => delete_students(&body, &glob).await,
            None => Err(respond_bad_request("id is required.".to_owned())),
        },
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

/// Bulk upload of students from a CSV body.
pub async fn import<S: Sheets>(
    method: Method,
    Extension(glob): Extension<Arc<Glob<S>>>,
    body: String,
) -> Response {
    log::trace!("students::import( {}, [ {} bytes ] ) called.", &method, body.len());

    let res = match method {
        Method::POST => upload_students(&body, &glob).await,
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

async fn list_students<S: Sheets>(glob: &Glob<S>) -> Reply {
    let store = glob.store().map_err(fail(glob, None))?;
    let primary = glob.students_id().await.map_err(fail(glob, None))?;

    let studs = store.get_students_across(&primary, &glob.cfg.student_spreadsheet_ids).await
        .map_err(fail(glob, Some(primary.as_str())))?;
    Ok(respond_json(StatusCode::OK, &studs))
}

async fn add_student<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let mut stud: Student = json_body(body)?;
    require(&stud.name, "name")?;

    let store = glob.store().map_err(fail(glob, None))?;
    let primary = glob.students_id().await.map_err(fail(glob, None))?;

    store.insert(&primary, &mut stud).await
        .map_err(fail(glob, Some(primary.as_str())))?;
    stud.spreadsheet_id = Some(primary);
    Ok(respond_json(StatusCode::CREATED, &stud))
}

async fn update_student<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let stud: Student = json_body(body)?;
    require(&stud.id, "id")?;
    require(&stud.name, "name")?;
    let sid = match stud.spreadsheet_id.as_deref() {
        Some(sid) if !sid.trim().is_empty() => sid.trim(),
        _ => { return Err(respond_bad_request("spreadsheetId is required.".to_owned())); },
    };

    let store = glob.store().map_err(fail(glob, None))?;
    store.update(sid, &stud).await
        .map_err(fail(glob, Some(sid)))?;
    Ok(respond_json(StatusCode::OK, &stud))
}

async fn delete_student<S: Sheets>(params: &Params, glob: &Glob<S>) -> Reply {
    let id = params.require_id()?;
    let sid = match params.spreadsheet_id.as_deref().map(|s| s.trim()) {
        Some(sid) if !sid.is_empty() => sid,
        _ => { return Err(respond_bad_request("spreadsheetId is required.".to_owned())); },
    };

    let store = glob.store().map_err(fail(glob, None))?;
    store.delete::<Student>(sid, id).await
        .map_err(fail(glob, Some(sid)))?;
    Ok(respond_json(StatusCode::OK, &json!({ "deleted": id })))
}

async fn delete_students<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let req: BulkDelete = json_body(body)?;
    require(&req.spreadsheet_id, "spreadsheetId")?;
    if req.ids.is_empty() {
        return Err(respond_bad_request("ids must not be empty.".to_owned()));
    }

    let store = glob.store().map_err(fail(glob, None))?;
    let outcome = store.delete_students(req.spreadsheet_id.trim(), &req.ids).await;
    Ok(respond_json(StatusCode::OK, &outcome))
}

async fn upload_students<S: Sheets>(body: &str, glob: &Glob<S>) -> Reply {
    let mut studs = Student::vec_from_csv_reader(body.as_bytes())
        .map_err(respond_bad_request)?;
    if studs.is_empty() {
        return Err(respond_bad_request("No students found in upload.".to_owned()));
    }

    let store = glob.store().map_err(fail(glob, None))?;
    let primary = glob.students_id().await.map_err(fail(glob, None))?;

    let n = store.insert_many(&primary, &mut studs).await
        .map_err(fail(glob, Some(primary.as_str())))?;
    log::info!("Imported {} students into {:?}.", n, &primary);

    for s in studs.iter_mut() {
        s.spreadsheet_id = Some(primary.clone());
    }
    Ok(respond_json(StatusCode::CREATED, &studs))
}
