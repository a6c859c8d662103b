use crate::{models::Redirect, util, PersistDatabase};
use rocket::{catch, response, Request, Responder};

const NOT_FOUND: &str = "Not Found";
const GONE: &str = "Gone";

#[derive(Responder)]
pub enum Fallback {
    Moved(response::Redirect),
    #[response(status = 410)]
    Gone(&'static str),
    #[response(status = 404)]
    Missing(&'static str),
}

/// Last stop for unmatched paths: a legacy redirect if one is stored for the
/// path, otherwise a plain 404. Every traversal is counted.
#[catch(404)]
pub async fn legacy_redirect(request: &Request<'_>) -> Fallback {
    let path = util::decoded_path(request.uri().path().as_str());
    let db = match request.guard::<PersistDatabase>().await.succeeded() {
        Some(db) => db,
        None => return Fallback::Missing(NOT_FOUND),
    };

    match db.run(move |c| Redirect::follow(c, &path)).await {
        Ok(Some(redirect)) if redirect.new_path.trim().is_empty() => Fallback::Gone(GONE),
        Ok(Some(redirect)) => {
            log::info!(
                "redirecting {} to {} ({} uses)",
                redirect.old_path,
                redirect.new_path,
                redirect.usage_count
            );
            Fallback::Moved(response::Redirect::permanent(redirect.new_path))
        }
        Ok(None) => Fallback::Missing(NOT_FOUND),
        Err(err) => {
            log::error!("redirect lookup failed: {}", err);
            Fallback::Missing(NOT_FOUND)
        }
    }
}
