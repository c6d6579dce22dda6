/*!
`/api/payroll`: the salary and fines report, read-only.

The report is costly to build (every tab of every payroll workbook), so it
is marked cacheable by shared caches for a short while.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, Method, StatusCode},
    http::header::HeaderValue,
    response::Response,
};

use crate::config::Glob;
use crate::payroll;
use crate::sheets::Sheets;
use super::*;
use super::AddHeaders;

pub async fn api<S: Sheets>(
    method: Method,
    Extension(glob): Extension<Arc<Glob<S>>>,
) -> Response {
    log::trace!("payroll::api( {} ) called.", &method);

    let res = match method {
        Method::GET => payroll_report(&glob).await,
        m => Err(method_not_allowed(&m)),
    };

    match res {
        Ok(r) => r,
        Err(r) => r,
    }
}

async fn payroll_report<S: Sheets>(glob: &Glob<S>) -> Reply {
    let store = glob.store().map_err(fail(glob, None))?;

    let ids = &glob.cfg.payroll_spreadsheet_ids;
    if ids.is_empty() {
        log::warn!("Payroll requested, but no payroll spreadsheets are configured.");
    }
    let report = payroll::aggregate(store.sheets(), ids).await;

    let cache_control = format!(
        "public, s-maxage={}, stale-while-revalidate={}",
        glob.cfg.payroll_max_age, glob.cfg.payroll_stale_while_revalidate
    );
    let headers = match HeaderValue::from_str(&cache_control) {
        Ok(v) => vec![(header::CACHE_CONTROL, v)],
        Err(e) => {
            log::error!("Invalid Cache-Control value {:?}: {}", &cache_control, &e);
            vec![]
        },
    };

    Ok(respond_json(StatusCode::OK, &report).add_headers(headers))
}
